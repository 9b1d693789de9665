//! Per-frame zone alignment.
//!
//! [`ZoneAligner`] ties the solvers together for one AR session: every frame
//! the detected markers that have a calibration row are turned into
//! camera-space poses, fused into a single `T_world_zone` and scored by their
//! reprojection error. The score feeds the session's [`DriftMonitor`].

use std::collections::HashMap;

use log::debug;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use zonealign_core::{
    AlignmentQuality, AlignmentSnapshot, AuditError, CameraIntrinsics, DetectedMarker,
    MarkerObservation, Pose3D,
};
use zonealign_pose::{
    estimate_marker_pose_camera, marker_reprojection_error, refine_pose, RefinedPoseResult,
    RigidTransformSolver,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::config::{ConfigError, MarkerCalibration, ZoneAlignConfig};
use crate::drift::{DriftMonitor, DriftState};
use crate::quality::QualityScoreParams;

/// One camera frame as delivered by the AR runtime and the detector.
#[derive(Clone, Copy, Debug)]
pub struct FrameInput<'a> {
    pub camera_pose_world: Pose3D,
    pub intrinsics: CameraIntrinsics,
    pub markers: &'a [DetectedMarker],
}

/// Why a frame did not produce a new zone pose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameSkip {
    /// None of the detected markers is in the calibration table.
    NoKnownMarkers,
    /// Known markers were seen but no zone pose could be solved from them.
    RefinementFailed,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameReport {
    /// Current zone pose, updated or carried over from an earlier frame.
    pub zone_pose: Option<Pose3D>,
    pub updated: bool,
    pub refined: Option<RefinedPoseResult>,
    /// Corner reprojection error of the fused zone pose, pooled over every
    /// marker that contributed to it.
    pub quality: Option<AlignmentQuality>,
    /// `None` when the frame was not scored (no known markers in view).
    pub drift: Option<DriftState>,
    pub skip: Option<FrameSkip>,
}

impl FrameReport {
    #[inline]
    pub fn needs_recalibration(&self) -> bool {
        self.drift.is_some_and(|d| d.needs_recalibration())
    }
}

#[derive(Clone, Debug)]
pub struct ZoneAligner {
    calibrations: HashMap<String, MarkerCalibration>,
    quality: QualityScoreParams,
    seed_from_previous: bool,
    rigid: RigidTransformSolver,
    drift: DriftMonitor,
    zone_pose: Option<Pose3D>,
}

impl ZoneAligner {
    pub fn new(config: ZoneAlignConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let drift = DriftMonitor::new(config.drift)?;
        let calibrations = config
            .markers
            .into_iter()
            .map(|mut m| {
                let t = m.t_marker_zone;
                m.t_marker_zone = Pose3D::new(t.position, t.rotation);
                (m.id.clone(), m)
            })
            .collect::<HashMap<_, _>>();

        debug!("zone aligner: {} calibrated markers", calibrations.len());
        Ok(Self {
            calibrations,
            quality: config.quality,
            seed_from_previous: config.seed_from_previous,
            rigid: RigidTransformSolver::new(config.rigid),
            drift,
            zone_pose: None,
        })
    }

    #[inline]
    pub fn zone_pose(&self) -> Option<&Pose3D> {
        self.zone_pose.as_ref()
    }

    #[inline]
    pub fn drift(&self) -> &DriftMonitor {
        &self.drift
    }

    pub fn calibration(&self, marker_id: &str) -> Option<&MarkerCalibration> {
        self.calibrations.get(marker_id)
    }

    /// Align one frame.
    ///
    /// A frame that fails keeps the previous zone pose and counts as a zero
    /// score for drift. A frame with no calibrated markers in view is not
    /// scored at all.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(markers = frame.markers.len()))
    )]
    pub fn process_frame(&mut self, frame: &FrameInput<'_>) -> FrameReport {
        let mut observations = Vec::with_capacity(frame.markers.len());
        let mut estimated = Vec::with_capacity(frame.markers.len());
        let mut known = 0usize;

        for marker in frame.markers {
            let Some(calib) = self.calibrations.get(&marker.id) else {
                debug!("marker {}: not in calibration table", marker.id);
                continue;
            };
            known += 1;

            let Some(pose_camera) =
                estimate_marker_pose_camera(&frame.intrinsics, marker, calib.size_m)
            else {
                debug!("marker {}: pose estimate failed", marker.id);
                continue;
            };
            observations.push(MarkerObservation {
                marker_id: marker.id.clone(),
                marker_pose_camera: pose_camera,
                marker_size_m: calib.size_m,
                t_marker_zone: calib.t_marker_zone,
            });
            estimated.push((marker, calib));
        }

        if known == 0 {
            return FrameReport {
                zone_pose: self.zone_pose,
                updated: false,
                refined: None,
                quality: None,
                drift: None,
                skip: Some(FrameSkip::NoKnownMarkers),
            };
        }

        let seed = self.zone_pose.filter(|_| self.seed_from_previous);
        match refine_pose(&frame.camera_pose_world, &observations, seed.as_ref()) {
            Some(refined) => {
                self.zone_pose = Some(refined.world_zone_pose);
                let quality = zone_reprojection_quality(
                    &frame.intrinsics,
                    &frame.camera_pose_world,
                    &refined.world_zone_pose,
                    &estimated,
                );
                let score = quality.map_or(0.0, |q| self.quality.score(&q));
                let drift = self.drift.update(score);
                FrameReport {
                    zone_pose: self.zone_pose,
                    updated: true,
                    refined: Some(refined),
                    quality,
                    drift: Some(drift),
                    skip: None,
                }
            }
            None => {
                debug!(
                    "frame skipped: {} of {known} known markers estimated",
                    observations.len()
                );
                let drift = self.drift.update(0.0);
                FrameReport {
                    zone_pose: self.zone_pose,
                    updated: false,
                    refined: None,
                    quality: None,
                    drift: Some(drift),
                    skip: Some(FrameSkip::RefinementFailed),
                }
            }
        }
    }

    /// Align from surveyed zone points and their tapped world positions.
    ///
    /// On success the result becomes the zone pose and drift history starts
    /// over.
    pub fn align_manual(
        &mut self,
        model: &[Vector3<f64>],
        world: &[Vector3<f64>],
    ) -> Option<Pose3D> {
        let pose = self.rigid.solve(model, world)?;
        self.zone_pose = Some(pose);
        self.drift.reset();
        Some(pose)
    }

    /// Audit record for `report`. A frame without reprojection statistics
    /// records zero samples.
    pub fn snapshot(
        &self,
        report: &FrameReport,
        intrinsics_hash: impl Into<String>,
        gravity: Vector3<f64>,
    ) -> Result<AlignmentSnapshot, AuditError> {
        let quality = match report.quality {
            Some(q) => q,
            None => AlignmentQuality::new(0.0, 0.0, 0)?,
        };
        AlignmentSnapshot::new(intrinsics_hash, quality, gravity)
    }

    /// Drop the zone pose and drift history, keeping the calibration.
    pub fn reset(&mut self) {
        self.zone_pose = None;
        self.drift.reset();
    }
}

/// Reproject each marker's corners through `T_world_zone` and its
/// calibration, so markers that disagree with the fused pose show up as
/// pixel error.
fn zone_reprojection_quality(
    intrinsics: &CameraIntrinsics,
    camera_pose_world: &Pose3D,
    world_zone_pose: &Pose3D,
    markers: &[(&DetectedMarker, &MarkerCalibration)],
) -> Option<AlignmentQuality> {
    let camera_zone = camera_pose_world.inverse().compose(world_zone_pose);
    markers
        .iter()
        .filter_map(|(marker, calib)| {
            let camera_marker = camera_zone.compose(&calib.t_marker_zone.inverse());
            marker_reprojection_error(intrinsics, marker, calib.size_m, &camera_marker)
        })
        .reduce(|acc, q| acc.merge(&q))
}
