use nalgebra::{Matrix3, Point2, Vector3};
use serde::{Deserialize, Serialize};

/// Pinhole camera model as reported by the AR tracking provider.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub width: u32,
    pub height: u32,
}

impl CameraIntrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64, width: u32, height: u32) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            width,
            height,
        }
    }

    /// Intrinsics matrix `K`.
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Project a camera-space point to pixels.
    ///
    /// Returns `None` for points on or behind the image plane.
    #[inline]
    pub fn project(&self, p_cam: &Vector3<f64>) -> Option<Point2<f64>> {
        if p_cam.z <= 1e-12 {
            return None;
        }
        Some(Point2::new(
            self.fx * p_cam.x / p_cam.z + self.cx,
            self.fy * p_cam.y / p_cam.z + self.cy,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn projects_principal_axis_to_center() {
        let k = CameraIntrinsics::new(1000.0, 1000.0, 320.0, 240.0, 640, 480);
        let px = k.project(&Vector3::new(0.0, 0.0, 2.0)).expect("in front");
        assert_relative_eq!(px.x, 320.0);
        assert_relative_eq!(px.y, 240.0);
        assert!(k.project(&Vector3::new(0.0, 0.0, -1.0)).is_none());
    }

    #[test]
    fn matrix_matches_projection() {
        let k = CameraIntrinsics::new(800.0, 780.0, 640.0, 360.0, 1280, 720);
        let p = Vector3::new(0.2, -0.1, 1.5);
        let h = k.matrix() * p;
        let px = k.project(&p).expect("in front");
        assert_relative_eq!(h.x / h.z, px.x, epsilon = 1e-9);
        assert_relative_eq!(h.y / h.z, px.y, epsilon = 1e-9);
    }
}
