use nalgebra::distance;
use zonealign_core::{
    canonical_marker_corners, AlignmentQuality, CameraIntrinsics, DetectedMarker, Pose3D,
};

/// Pixel reprojection error of a marker pose against its detected corners.
///
/// `marker_pose_camera` is `T_camera_marker`. Returns `None` if the marker
/// has fewer than four corners or a corner projects behind the camera.
pub fn marker_reprojection_error(
    intrinsics: &CameraIntrinsics,
    marker: &DetectedMarker,
    marker_size_m: f64,
    marker_pose_camera: &Pose3D,
) -> Option<AlignmentQuality> {
    let observed = marker.quad()?;
    let model = canonical_marker_corners(marker_size_m);

    let mut errors = [0.0_f64; 4];
    for (err, (p, obs)) in errors.iter_mut().zip(model.iter().zip(observed.iter())) {
        let px = intrinsics.project(&marker_pose_camera.transform_point(p))?;
        *err = distance(&px, obs);
    }
    AlignmentQuality::from_errors(&errors).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Point2, Vector3};

    fn intrinsics() -> CameraIntrinsics {
        CameraIntrinsics::new(1000.0, 1000.0, 320.0, 240.0, 640, 480)
    }

    #[test]
    fn exact_pose_has_zero_error() {
        let pose = Pose3D::from_translation(Vector3::new(0.0, 0.0, 1.0));
        let marker = DetectedMarker::new(
            "M1",
            vec![
                Point2::new(270.0, 190.0),
                Point2::new(370.0, 190.0),
                Point2::new(370.0, 290.0),
                Point2::new(270.0, 290.0),
            ],
            0.0,
        );
        let q = marker_reprojection_error(&intrinsics(), &marker, 0.1, &pose).expect("quality");
        assert_relative_eq!(q.mean_px(), 0.0, epsilon = 1e-9);
        assert_eq!(q.samples(), 4);
    }

    #[test]
    fn shifted_corner_is_reported() {
        let pose = Pose3D::from_translation(Vector3::new(0.0, 0.0, 1.0));
        let marker = DetectedMarker::new(
            "M1",
            vec![
                Point2::new(270.0, 190.0),
                Point2::new(370.0, 190.0),
                Point2::new(373.0, 294.0),
                Point2::new(270.0, 290.0),
            ],
            0.0,
        );
        let q = marker_reprojection_error(&intrinsics(), &marker, 0.1, &pose).expect("quality");
        assert_relative_eq!(q.max_px(), 5.0, epsilon = 1e-9);
        assert_relative_eq!(q.mean_px(), 1.25, epsilon = 1e-9);
    }

    #[test]
    fn marker_behind_camera_has_no_quality() {
        let pose = Pose3D::from_translation(Vector3::new(0.0, 0.0, -1.0));
        let marker = DetectedMarker::new("M1", vec![Point2::new(0.0, 0.0); 4], 0.0);
        assert!(marker_reprojection_error(&intrinsics(), &marker, 0.1, &pose).is_none());
    }
}
