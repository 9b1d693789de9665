use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};
use zonealign_core::solve_linear_system;

/// Plane-to-plane projective map with `h33 = 1`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        Point2::new(v[0] / v[2], v[1] / v[2])
    }
}

/// Compute H such that `dst ~ H * src` from exactly four correspondences.
///
/// - `src`: marker-plane coordinates (meters),
/// - `dst`: image coordinates (pixels).
///
/// Corner order must be consistent between `src` and `dst`. The 8×8 DLT
/// system is solved directly; `None` when any elimination pivot falls below
/// [`zonealign_core::PIVOT_EPS`].
pub fn homography_from_4pt(src: &[Point2<f64>; 4], dst: &[Point2<f64>; 4]) -> Option<Homography> {
    // Row pair per corner, h = [h11 h12 h13 h21 h22 h23 h31 h32]:
    //   [x y 1 0 0 0 -ux -uy] h = u
    //   [0 0 0 x y 1 -vx -vy] h = v
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut rhs = SVector::<f64, 8>::zeros();

    for (k, (s, d)) in src.iter().zip(dst).enumerate() {
        let (ru, rv) = (2 * k, 2 * k + 1);
        a.fixed_view_mut::<1, 3>(ru, 0).copy_from_slice(&[s.x, s.y, 1.0]);
        a.fixed_view_mut::<1, 3>(rv, 3).copy_from_slice(&[s.x, s.y, 1.0]);
        a.fixed_view_mut::<1, 2>(ru, 6).copy_from_slice(&[-d.x * s.x, -d.x * s.y]);
        a.fixed_view_mut::<1, 2>(rv, 6).copy_from_slice(&[-d.y * s.x, -d.y * s.y]);
        rhs[ru] = d.x;
        rhs[rv] = d.y;
    }

    let x = solve_linear_system(&a, &rhs)?;

    Some(Homography::new(Matrix3::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    )))
}
