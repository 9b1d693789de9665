//! Single-marker pose from four image corners.
//!
//! The marker is a square of known edge length lying on `z = 0` in its own
//! frame. The plane-to-image homography is solved from the four corners and
//! decomposed into `T_camera_marker` using the camera intrinsics.

use log::debug;
use nalgebra::{Matrix3, Point2};
use zonealign_core::{canonical_marker_corners, CameraIntrinsics, DetectedMarker, Pose3D};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::homography::{homography_from_4pt, Homography};

const MIN_K_DET: f64 = 1e-9;
const MIN_COLUMN_NORM: f64 = 1e-12;

/// Stateless estimator; the free functions in this module do the work.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkerPoseEstimator;

impl MarkerPoseEstimator {
    /// `T_world_marker`, see [`estimate_marker_pose`].
    pub fn estimate(
        &self,
        intrinsics: &CameraIntrinsics,
        marker: &DetectedMarker,
        marker_size_m: f64,
        camera_pose_world: &Pose3D,
    ) -> Option<Pose3D> {
        estimate_marker_pose(intrinsics, marker, marker_size_m, camera_pose_world)
    }

    /// `T_camera_marker`, see [`estimate_marker_pose_camera`].
    pub fn estimate_in_camera(
        &self,
        intrinsics: &CameraIntrinsics,
        marker: &DetectedMarker,
        marker_size_m: f64,
    ) -> Option<Pose3D> {
        estimate_marker_pose_camera(intrinsics, marker, marker_size_m)
    }
}

/// Estimate `T_world_marker` from the marker's corners.
///
/// `camera_pose_world` is the tracking provider's `T_world_camera` for the
/// frame the corners were detected in.
pub fn estimate_marker_pose(
    intrinsics: &CameraIntrinsics,
    marker: &DetectedMarker,
    marker_size_m: f64,
    camera_pose_world: &Pose3D,
) -> Option<Pose3D> {
    let t_camera_marker = estimate_marker_pose_camera(intrinsics, marker, marker_size_m)?;
    Some(camera_pose_world.compose(&t_camera_marker))
}

/// Estimate `T_camera_marker` from the marker's corners.
///
/// Returns `None` with fewer than four corners, a non-positive marker size,
/// a singular DLT system or a non-invertible intrinsics matrix.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(intrinsics, marker), fields(marker = %marker.id))
)]
pub fn estimate_marker_pose_camera(
    intrinsics: &CameraIntrinsics,
    marker: &DetectedMarker,
    marker_size_m: f64,
) -> Option<Pose3D> {
    let Some(image_pts) = marker.quad() else {
        debug!(
            "marker {}: need 4 corners, got {}",
            marker.id,
            marker.corners.len()
        );
        return None;
    };
    if !(marker_size_m.is_finite() && marker_size_m > 0.0) {
        debug!("marker {}: invalid size {marker_size_m}", marker.id);
        return None;
    }

    let object_pts = canonical_marker_corners(marker_size_m).map(|p| Point2::new(p.x, p.y));

    let Some(h) = homography_from_4pt(&object_pts, &image_pts) else {
        debug!("marker {}: homography system is singular", marker.id);
        return None;
    };

    let pose = decompose_homography(intrinsics, &h);
    if pose.is_none() {
        debug!("marker {}: homography decomposition failed", marker.id);
    }
    pose
}

/// Decompose a marker-plane homography into `T_camera_marker`.
///
/// `B = K⁻¹H` holds `λ[r1 r2 t]`. The scale comes from the first column,
/// the second column is Gram-Schmidt orthogonalized against it and the third
/// is their cross product.
pub fn decompose_homography(intrinsics: &CameraIntrinsics, h: &Homography) -> Option<Pose3D> {
    let k = intrinsics.matrix();
    if k.determinant().abs() < MIN_K_DET {
        return None;
    }
    let k_inv = k.try_inverse()?;

    let b = k_inv * h.h;
    let c1 = b.column(0).into_owned();
    let c2 = b.column(1).into_owned();
    let c3 = b.column(2).into_owned();

    let n1 = c1.norm();
    if n1 < MIN_COLUMN_NORM {
        return None;
    }
    let scale = 1.0 / n1;
    let r1 = c1 * scale;

    // Near-parallel columns (grazing views) leave almost nothing after the
    // projection; only the fully collapsed case is rejected.
    let ortho = c2 - r1 * c2.dot(&r1);
    let n2 = ortho.norm();
    if n2 < MIN_COLUMN_NORM {
        return None;
    }
    let r2 = ortho / n2;
    let r3 = r1.cross(&r2);

    let mut r = Matrix3::from_columns(&[r1, r2, r3]);
    if r.determinant() < 0.0 {
        r = -r;
    }

    Some(Pose3D::from_rotation_matrix(&r, c3 * scale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{UnitQuaternion, Vector3};

    fn intrinsics() -> CameraIntrinsics {
        CameraIntrinsics::new(1000.0, 1000.0, 320.0, 240.0, 640, 480)
    }

    fn project_marker(k: &CameraIntrinsics, t_camera_marker: &Pose3D, size: f64) -> DetectedMarker {
        let corners = canonical_marker_corners(size)
            .iter()
            .map(|p| {
                k.project(&t_camera_marker.transform_point(p))
                    .expect("corner in front of camera")
            })
            .collect();
        DetectedMarker::new("M7", corners, 0.0)
    }

    #[test]
    fn fronto_parallel_marker_at_one_meter() {
        let k = intrinsics();
        let truth = Pose3D::from_translation(Vector3::new(0.0, 0.0, 1.0));
        let marker = project_marker(&k, &truth, 0.1);

        // TL corner lands up and left of the principal point.
        assert_relative_eq!(marker.corners[0].x, 270.0, epsilon = 1e-9);
        assert_relative_eq!(marker.corners[0].y, 190.0, epsilon = 1e-9);

        let pose = estimate_marker_pose(&k, &marker, 0.1, &Pose3D::identity()).expect("pose");
        assert_relative_eq!(pose.position, Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-4);
        assert!(pose.rotation.angle() < 1e-6);
    }

    #[test]
    fn tilted_marker_round_trips_through_world() {
        let k = intrinsics();
        let t_camera_marker = Pose3D::new(
            Vector3::new(0.05, -0.02, 0.8),
            UnitQuaternion::from_euler_angles(0.3, -0.2, 0.1),
        );
        let camera_pose_world = Pose3D::new(
            Vector3::new(1.5, 0.2, -3.0),
            UnitQuaternion::from_euler_angles(0.0, 0.7, 0.05),
        );
        let marker = project_marker(&k, &t_camera_marker, 0.15);

        let pose = estimate_marker_pose(&k, &marker, 0.15, &camera_pose_world).expect("pose");
        let expected = camera_pose_world.compose(&t_camera_marker);
        assert_relative_eq!(pose.position, expected.position, epsilon = 1e-6);
        assert!(pose.angle_to(&expected) < 1e-6);
        assert_relative_eq!(pose.rotation.into_inner().norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn estimates_are_bit_identical() {
        let k = intrinsics();
        let marker = DetectedMarker::new(
            "M1",
            vec![
                Point2::new(251.3, 180.9),
                Point2::new(372.2, 176.4),
                Point2::new(380.7, 301.1),
                Point2::new(247.9, 296.5),
            ],
            1.25,
        );
        let a = estimate_marker_pose(&k, &marker, 0.1, &Pose3D::identity()).expect("pose");
        let b = estimate_marker_pose(&k, &marker, 0.1, &Pose3D::identity()).expect("pose");
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_short_corner_lists() {
        let k = intrinsics();
        let marker = DetectedMarker::new(
            "M1",
            vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(1.0, 1.0)],
            0.0,
        );
        assert!(estimate_marker_pose(&k, &marker, 0.1, &Pose3D::identity()).is_none());
    }

    #[test]
    fn rejects_singular_intrinsics() {
        let k = CameraIntrinsics::new(0.0, 1000.0, 320.0, 240.0, 640, 480);
        let truth = Pose3D::from_translation(Vector3::new(0.0, 0.0, 1.0));
        let marker = project_marker(&intrinsics(), &truth, 0.1);
        assert!(estimate_marker_pose_camera(&k, &marker, 0.1).is_none());
    }

    #[test]
    fn rejects_degenerate_corners() {
        let k = intrinsics();
        let marker = DetectedMarker::new("M1", vec![Point2::new(320.0, 240.0); 4], 0.0);
        assert!(estimate_marker_pose_camera(&k, &marker, 0.1).is_none());
        let truth = Pose3D::from_translation(Vector3::new(0.0, 0.0, 1.0));
        let marker = project_marker(&k, &truth, 0.1);
        assert!(estimate_marker_pose_camera(&k, &marker, 0.0).is_none());
    }
}
