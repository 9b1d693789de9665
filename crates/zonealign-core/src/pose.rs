//! Rigid-pose algebra.
//!
//! Frames are chained with the `T_a_b` convention: `T_a_b` maps coordinates
//! expressed in frame `b` into frame `a`, and `T_a_b.compose(T_b_c) = T_a_c`.

use nalgebra::{Matrix3, Quaternion, Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Build a unit quaternion from raw `(x, y, z, w)` components.
///
/// Returns `None` when the components have (numerically) zero norm.
pub fn normalized_quaternion(x: f64, y: f64, z: f64, w: f64) -> Option<UnitQuaternion<f64>> {
    UnitQuaternion::try_new(Quaternion::new(w, x, y, z), 1e-12)
}

#[inline]
fn renormalize(q: UnitQuaternion<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::new_normalize(q.into_inner())
}

/// Rigid transform: rotation followed by translation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose3D {
    pub position: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
}

impl Default for Pose3D {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose3D {
    /// Build a pose; the rotation is renormalized on the way in.
    pub fn new(position: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self {
            position,
            rotation: renormalize(rotation),
        }
    }

    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }

    pub fn from_translation(position: Vector3<f64>) -> Self {
        Self {
            position,
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Build a pose from a 3×3 matrix that is already (close to) a rotation.
    pub fn from_rotation_matrix(rotation: &Matrix3<f64>, position: Vector3<f64>) -> Self {
        let rot = Rotation3::from_matrix_unchecked(*rotation);
        Self::new(position, UnitQuaternion::from_rotation_matrix(&rot))
    }

    /// `self ∘ other`: apply `other` first, then `self`.
    pub fn compose(&self, other: &Pose3D) -> Pose3D {
        Pose3D {
            position: self.position + self.rotation * other.position,
            rotation: renormalize(self.rotation * other.rotation),
        }
    }

    pub fn inverse(&self) -> Pose3D {
        let inv = renormalize(self.rotation.inverse());
        Pose3D {
            position: -(inv * self.position),
            rotation: inv,
        }
    }

    /// Rotate a direction (no translation).
    #[inline]
    pub fn rotate(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * v
    }

    /// Map a point from the source frame into the target frame.
    #[inline]
    pub fn transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.position
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.rotation.to_rotation_matrix().into_inner()
    }

    /// Angle in radians between the two rotations.
    pub fn angle_to(&self, other: &Pose3D) -> f64 {
        self.rotation.angle_to(&other.rotation)
    }
}
