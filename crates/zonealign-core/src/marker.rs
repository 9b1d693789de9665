use nalgebra::{Point2, Vector3};
use serde::{Deserialize, Serialize};

use crate::Pose3D;

/// Marker corners as reported by the detector.
///
/// Corners are in pixels, ordered top-left, top-right, bottom-right,
/// bottom-left. Only the first four are used.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedMarker {
    pub id: String,
    pub corners: Vec<Point2<f64>>,
    /// Capture time in seconds, as stamped by the detector.
    pub timestamp: f64,
}

impl DetectedMarker {
    pub fn new(id: impl Into<String>, corners: Vec<Point2<f64>>, timestamp: f64) -> Self {
        Self {
            id: id.into(),
            corners,
            timestamp,
        }
    }

    /// The four ordered corners, if the detector provided at least four.
    pub fn quad(&self) -> Option<[Point2<f64>; 4]> {
        match self.corners.as_slice() {
            [a, b, c, d, ..] => Some([*a, *b, *c, *d]),
            _ => None,
        }
    }
}

/// One marker's contribution to a multi-marker refinement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerObservation {
    pub marker_id: String,
    /// `T_camera_marker` for this frame.
    pub marker_pose_camera: Pose3D,
    /// Physical edge length in meters.
    pub marker_size_m: f64,
    /// Static calibration `T_marker_zone`.
    pub t_marker_zone: Pose3D,
}

/// Marker-plane corners of a square marker of side `size_m`, centered at the
/// origin on `z = 0`, in the detector's TL, TR, BR, BL order (Y down).
pub fn canonical_marker_corners(size_m: f64) -> [Vector3<f64>; 4] {
    let h = 0.5 * size_m;
    [
        Vector3::new(-h, -h, 0.0),
        Vector3::new(h, -h, 0.0),
        Vector3::new(h, h, 0.0),
        Vector3::new(-h, h, 0.0),
    ]
}
