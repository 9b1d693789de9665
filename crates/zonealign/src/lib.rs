//! Per-frame AR zone alignment.
//!
//! Aligns a physical zone (a rack, a bay, a room) with its digital model from
//! fiducial markers seen by an AR camera, and keeps an eye on how well that
//! alignment holds over time.
//!
//! ```no_run
//! use zonealign::{FrameInput, ZoneAlignConfig, ZoneAligner};
//! # fn frame() -> FrameInput<'static> { unimplemented!() }
//!
//! let config = ZoneAlignConfig::load_json("zone.json")?;
//! let mut aligner = ZoneAligner::new(config)?;
//!
//! let report = aligner.process_frame(&frame());
//! if report.needs_recalibration() {
//!     println!("alignment degraded, ask for recalibration");
//! }
//! # Ok::<(), zonealign::ConfigError>(())
//! ```
//!
//! The solvers live in [`pose`], the shared types in [`core`].

pub use zonealign_core as core;
pub use zonealign_pose as pose;

mod config;
mod drift;
mod pipeline;
mod quality;

pub use config::{ConfigError, MarkerCalibration, ZoneAlignConfig};
pub use drift::{DriftConfigError, DriftMonitor, DriftParams, DriftState};
pub use pipeline::{FrameInput, FrameReport, FrameSkip, ZoneAligner};
pub use quality::QualityScoreParams;

pub use zonealign_core::{
    AlignmentQuality, AlignmentSnapshot, CameraIntrinsics, DetectedMarker, Pose3D,
};
pub use zonealign_pose::{RefinedPoseResult, RigidSolverParams};

#[cfg(feature = "tracing")]
pub use zonealign_core::init_tracing;
pub use zonealign_core::init_with_level;
