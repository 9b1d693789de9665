//! Pose solvers for AR zone alignment.
//!
//! - [`estimate_marker_pose`]: single square marker from its four image
//!   corners (planar homography + decomposition),
//! - [`solve_rigid_transform`]: Horn's closed-form absolute orientation for
//!   manual multi-point alignment,
//! - [`refine_pose`]: one linearized least-squares step fusing several
//!   markers into a zone pose.
//!
//! All solvers are pure and report numeric failure (too few inputs, singular
//! systems) as `None`, so a bad frame can simply be skipped.

mod homography;
mod marker_pose;
mod refine;
mod reprojection;
mod rigid;

pub use homography::{homography_from_4pt, Homography};
pub use marker_pose::{
    decompose_homography, estimate_marker_pose, estimate_marker_pose_camera, MarkerPoseEstimator,
};
pub use refine::{refine_pose, MultiMarkerPoseRefiner, RefinedPoseResult};
pub use reprojection::marker_reprojection_error;
pub use rigid::{
    rms_alignment_error, solve_rigid_transform, solve_rigid_transform_with, RigidSolverParams,
    RigidTransformSolver,
};
