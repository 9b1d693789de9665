//! Small fixed-size dense solvers.
//!
//! The per-frame systems are at most 8×8, so they are solved in place on
//! stack-allocated `SMatrix` storage.

use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

/// Smallest pivot magnitude accepted by [`solve_linear_system`].
pub const PIVOT_EPS: f64 = 1e-9;

/// Solve `A x = b` by Gaussian elimination with partial pivoting.
///
/// Returns `None` as soon as a pivot smaller than [`PIVOT_EPS`] in magnitude
/// is encountered.
pub fn solve_linear_system<const N: usize>(
    a: &SMatrix<f64, N, N>,
    b: &SVector<f64, N>,
) -> Option<SVector<f64, N>> {
    let mut m = *a;
    let mut rhs = *b;

    for col in 0..N {
        let mut pivot_row = col;
        let mut pivot_abs = m[(col, col)].abs();
        for row in (col + 1)..N {
            let v = m[(row, col)].abs();
            if v > pivot_abs {
                pivot_abs = v;
                pivot_row = row;
            }
        }
        if pivot_abs < PIVOT_EPS {
            return None;
        }
        if pivot_row != col {
            m.swap_rows(col, pivot_row);
            rhs.swap_rows(col, pivot_row);
        }

        let pivot = m[(col, col)];
        for row in (col + 1)..N {
            let factor = m[(row, col)] / pivot;
            if factor == 0.0 {
                continue;
            }
            for k in col..N {
                m[(row, k)] -= factor * m[(col, k)];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = SVector::<f64, N>::zeros();
    for row in (0..N).rev() {
        let mut acc = rhs[row];
        for k in (row + 1)..N {
            acc -= m[(row, k)] * x[k];
        }
        x[row] = acc / m[(row, row)];
    }
    Some(x)
}

/// Skew-symmetric matrix `[v]×` such that `[v]× u = v × u`.
#[inline]
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -v.z, v.y, //
        v.z, 0.0, -v.x, //
        -v.y, v.x, 0.0,
    )
}
