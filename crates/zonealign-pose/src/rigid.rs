//! Horn's closed-form absolute orientation.
//!
//! Given matched model and world points, the rotation maximizing their
//! correlation is the dominant eigenvector of Horn's symmetric 4×4 matrix
//! `N`, read as a unit quaternion `(w, x, y, z)`. The eigenvector is found by
//! power iteration on small stack matrices.
//!
//! Reference: B.K.P. Horn, "Closed-form solution of absolute orientation
//! using unit quaternions", JOSA A 4(4), 1987.

use log::debug;
use nalgebra::{Matrix3, Matrix4, Vector3, Vector4};
use serde::{Deserialize, Serialize};
use zonealign_core::{normalized_quaternion, Pose3D};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Power-iteration settings for [`solve_rigid_transform_with`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigidSolverParams {
    pub max_iterations: usize,
    /// Stop once no quaternion component moves by more than this.
    pub convergence_tol: f64,
    /// Fail if an iterate's norm collapses below this.
    pub min_norm: f64,
}

impl Default for RigidSolverParams {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            convergence_tol: 1e-9,
            min_norm: 1e-12,
        }
    }
}

/// Horn solver with fixed parameters.
#[derive(Clone, Copy, Debug, Default)]
pub struct RigidTransformSolver {
    params: RigidSolverParams,
}

impl RigidTransformSolver {
    pub fn new(params: RigidSolverParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &RigidSolverParams {
        &self.params
    }

    pub fn solve(&self, model: &[Vector3<f64>], world: &[Vector3<f64>]) -> Option<Pose3D> {
        solve_rigid_transform_with(model, world, &self.params)
    }
}

/// `T_world_model` such that `world[i] ≈ T * model[i]`, with default settings.
///
/// `None` for fewer than three points, mismatched lengths, a degenerate
/// (e.g. fully coincident) point set or an eigen iteration that does not
/// converge.
pub fn solve_rigid_transform(model: &[Vector3<f64>], world: &[Vector3<f64>]) -> Option<Pose3D> {
    solve_rigid_transform_with(model, world, &RigidSolverParams::default())
}

#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(model, world, params), fields(points = model.len()))
)]
pub fn solve_rigid_transform_with(
    model: &[Vector3<f64>],
    world: &[Vector3<f64>],
    params: &RigidSolverParams,
) -> Option<Pose3D> {
    if model.len() != world.len() || model.len() < 3 {
        debug!(
            "rigid transform needs >= 3 matched points (model={}, world={})",
            model.len(),
            world.len()
        );
        return None;
    }

    let model_centroid = centroid(model);
    let world_centroid = centroid(world);

    let mut m = Matrix3::<f64>::zeros();
    for (pm, pw) in model.iter().zip(world) {
        m += (pw - world_centroid) * (pm - model_centroid).transpose();
    }

    let n = horn_matrix(&m);
    let Some(q) = dominant_eigenvector(&n, params) else {
        debug!("rigid transform: eigen iteration collapsed or did not converge");
        return None;
    };
    let rotation = normalized_quaternion(q[1], q[2], q[3], q[0])?;
    let translation = world_centroid - rotation * model_centroid;

    Some(Pose3D::new(translation, rotation))
}

/// RMS distance between `pose * model[i]` and `world[i]`.
pub fn rms_alignment_error(
    pose: &Pose3D,
    model: &[Vector3<f64>],
    world: &[Vector3<f64>],
) -> Option<f64> {
    if model.is_empty() || model.len() != world.len() {
        return None;
    }
    let sum_sq: f64 = model
        .iter()
        .zip(world)
        .map(|(pm, pw)| (pose.transform_point(pm) - pw).norm_squared())
        .sum();
    Some((sum_sq / model.len() as f64).sqrt())
}

fn centroid(points: &[Vector3<f64>]) -> Vector3<f64> {
    points.iter().sum::<Vector3<f64>>() / points.len() as f64
}

/// Horn's `N` from `M = Σ world ⊗ model` (centered).
fn horn_matrix(m: &Matrix3<f64>) -> Matrix4<f64> {
    // Horn's S_ab = Σ model_a world_b, i.e. the transpose of M.
    let s = |a: usize, b: usize| m[(b, a)];
    let (sxx, sxy, sxz) = (s(0, 0), s(0, 1), s(0, 2));
    let (syx, syy, syz) = (s(1, 0), s(1, 1), s(1, 2));
    let (szx, szy, szz) = (s(2, 0), s(2, 1), s(2, 2));

    Matrix4::new(
        sxx + syy + szz, syz - szy, szx - sxz, sxy - syx, //
        syz - szy, sxx - syy - szz, sxy + syx, szx + sxz, //
        szx - sxz, sxy + syx, -sxx + syy - szz, syz + szy, //
        sxy - syx, szx + sxz, syz + szy, -sxx - syy + szz,
    )
}

/// Eigenvector of the largest eigenvalue of symmetric `n`.
///
/// `n` is shifted by its Frobenius norm first. That leaves the eigenvectors
/// alone but makes every eigenvalue non-negative, so the largest one is also
/// the largest in magnitude. Coplanar point sets give `N` a spectrum
/// symmetric about zero, where the unshifted iteration would oscillate.
///
/// The iterate is multiplied by `A`, `A²`, `A⁴`, ... in turn, so the error
/// ratio of the two leading eigenvalues is squared every step. Thin point
/// sets, whose leading eigenvalues nearly tie, converge in a dozen steps.
/// `None` if the iterate collapses or the tolerance is not met within
/// `max_iterations`.
fn dominant_eigenvector(n: &Matrix4<f64>, params: &RigidSolverParams) -> Option<Vector4<f64>> {
    let mut a = n + Matrix4::identity() * n.norm();

    let mut q = Vector4::new(1.0, 0.0, 0.0, 0.0);
    for _ in 0..params.max_iterations {
        let next = a * q;
        let norm = next.norm();
        if norm < params.min_norm {
            return None;
        }
        let next = next / norm;
        let delta = (next - q).amax();
        q = next;
        if delta < params.convergence_tol {
            return Some(q);
        }

        let squared = a * a;
        let scale = squared.norm();
        if scale < params.min_norm {
            return None;
        }
        a = squared / scale;
    }
    None
}
