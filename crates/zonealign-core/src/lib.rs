//! Core types and utilities for AR zone alignment.
//!
//! This crate is intentionally small and purely geometric. It holds the
//! rigid-pose algebra, the pinhole camera model, the marker and observation
//! records exchanged with the detector and the calibration table, the audit
//! schema handed to event logging, and the tiny dense solver shared by the
//! pose estimators. It does *not* depend on any detector or AR runtime.

mod audit;
mod camera;
mod linalg;
mod logger;
mod marker;
mod pose;

pub use audit::{AlignmentQuality, AlignmentSnapshot, AuditError, SNAPSHOT_SCHEMA_VERSION};
pub use camera::CameraIntrinsics;
pub use linalg::{skew, solve_linear_system, PIVOT_EPS};
pub use marker::{canonical_marker_corners, DetectedMarker, MarkerObservation};
pub use pose::{normalized_quaternion, Pose3D};

pub use nalgebra::{Point2, UnitQuaternion, Vector3};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
