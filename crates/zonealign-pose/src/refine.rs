//! Multi-marker zone pose refinement.
//!
//! Every observed marker contributes a small rig of reference points known
//! both in zone coordinates (through its calibration) and in world
//! coordinates (through its estimated pose). One Gauss-Newton step on the
//! 6-DoF correction `[ω, t]` then fuses all markers into a single
//! `T_world_zone`. Marker-derived seeds are already close, so the step is
//! not iterated.

use log::debug;
use nalgebra::{Matrix3, Matrix3x6, Matrix6, Vector3, Vector6};
use serde::{Deserialize, Serialize};
use zonealign_core::{normalized_quaternion, skew, solve_linear_system, MarkerObservation, Pose3D};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Output of [`refine_pose`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RefinedPoseResult {
    /// Refined `T_world_zone`.
    pub world_zone_pose: Pose3D,
    /// RMS point distance after refinement, in millimeters.
    pub residual_error_mm: f64,
    pub used_markers: usize,
}

/// Stateless refiner; see [`refine_pose`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiMarkerPoseRefiner;

impl MultiMarkerPoseRefiner {
    pub fn refine(
        &self,
        camera_pose_world: &Pose3D,
        observations: &[MarkerObservation],
        initial_pose: Option<&Pose3D>,
    ) -> Option<RefinedPoseResult> {
        refine_pose(camera_pose_world, observations, initial_pose)
    }
}

/// Fuse several simultaneously observed markers into one `T_world_zone`.
///
/// Without `initial_pose` the seed is the zone pose implied by the first
/// observation. Returns `None` for an empty observation list or a singular
/// normal-equation system.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(markers = observations.len()))
)]
pub fn refine_pose(
    camera_pose_world: &Pose3D,
    observations: &[MarkerObservation],
    initial_pose: Option<&Pose3D>,
) -> Option<RefinedPoseResult> {
    let Some(first) = observations.first() else {
        debug!("refine: no observations");
        return None;
    };
    let seed = initial_pose.copied().unwrap_or_else(|| {
        camera_pose_world
            .compose(&first.marker_pose_camera)
            .compose(&first.t_marker_zone)
    });

    let r0 = seed.rotation_matrix();
    let mut ata = Matrix6::<f64>::zeros();
    let mut atb = Vector6::<f64>::zeros();
    let mut count = 0usize;

    for (p_zone, p_world) in correspondences(camera_pose_world, observations) {
        let residual = p_world - seed.transform_point(&p_zone);

        let mut j = Matrix3x6::<f64>::zeros();
        j.fixed_view_mut::<3, 3>(0, 0).copy_from(&(-r0 * skew(&p_zone)));
        j.fixed_view_mut::<3, 3>(0, 3).copy_from(&Matrix3::identity());

        ata += j.transpose() * j;
        atb += j.transpose() * residual;
        count += 1;
    }
    if count == 0 {
        return None;
    }

    let Some(delta) = solve_linear_system(&ata, &atb) else {
        debug!("refine: normal equations are singular ({count} points)");
        return None;
    };

    // First-order rotation update q ∘ (ω/2, 1).
    let dq = normalized_quaternion(0.5 * delta[0], 0.5 * delta[1], 0.5 * delta[2], 1.0)?;
    let refined = Pose3D::new(
        seed.position + Vector3::new(delta[3], delta[4], delta[5]),
        seed.rotation * dq,
    );

    let sum_sq: f64 = correspondences(camera_pose_world, observations)
        .map(|(p_zone, p_world)| (refined.transform_point(&p_zone) - p_world).norm_squared())
        .sum();
    let residual_error_mm = (sum_sq / count as f64).sqrt() * 1000.0;

    Some(RefinedPoseResult {
        world_zone_pose: refined,
        residual_error_mm,
        used_markers: observations.len(),
    })
}

/// Marker-local rig: origin plus half-size offsets along each axis.
fn rig_points(marker_size_m: f64) -> [Vector3<f64>; 4] {
    let h = 0.5 * marker_size_m;
    [
        Vector3::zeros(),
        Vector3::new(h, 0.0, 0.0),
        Vector3::new(0.0, h, 0.0),
        Vector3::new(0.0, 0.0, h),
    ]
}

/// `(zone, world)` point pairs over all observations.
fn correspondences<'a>(
    camera_pose_world: &'a Pose3D,
    observations: &'a [MarkerObservation],
) -> impl Iterator<Item = (Vector3<f64>, Vector3<f64>)> + 'a {
    observations.iter().flat_map(move |obs| {
        let zone_from_marker = obs.t_marker_zone.inverse();
        let world_from_marker = camera_pose_world.compose(&obs.marker_pose_camera);
        rig_points(obs.marker_size_m).map(move |p| {
            (
                zone_from_marker.transform_point(&p),
                world_from_marker.transform_point(&p),
            )
        })
    })
}
