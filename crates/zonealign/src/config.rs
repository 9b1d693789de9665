//! JSON configuration: marker calibration table and tuning.

use std::collections::HashSet;
use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use zonealign_core::Pose3D;
use zonealign_pose::RigidSolverParams;

use crate::drift::{DriftConfigError, DriftParams};
use crate::quality::QualityScoreParams;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Drift(#[from] DriftConfigError),
    #[error("marker {0} is calibrated more than once")]
    DuplicateMarker(String),
    #[error("marker {id}: edge length must be positive (got {size_m})")]
    MarkerSize { id: String, size_m: f64 },
    #[error("marker {0}: calibration rotation has zero norm")]
    MarkerRotation(String),
    #[error("quality score needs 0 <= good_px < bad_px (got {good_px} / {bad_px})")]
    QualityRange { good_px: f64, bad_px: f64 },
}

/// Static calibration of one physical marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerCalibration {
    pub id: String,
    /// Printed edge length in meters.
    pub size_m: f64,
    /// `T_marker_zone`: zone coordinates into marker coordinates.
    pub t_marker_zone: Pose3D,
}

/// Everything a [`crate::ZoneAligner`] needs besides per-frame input.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneAlignConfig {
    #[serde(default)]
    pub markers: Vec<MarkerCalibration>,
    #[serde(default)]
    pub drift: DriftParams,
    #[serde(default)]
    pub quality: QualityScoreParams,
    /// Power iteration settings for manual alignment.
    #[serde(default)]
    pub rigid: RigidSolverParams,
    /// Seed refinement from the previous frame's zone pose instead of the
    /// first visible marker.
    #[serde(default)]
    pub seed_from_previous: bool,
}

impl ZoneAlignConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Check the whole config without building anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.drift.validate()?;
        let q = &self.quality;
        if !(q.good_px >= 0.0 && q.good_px < q.bad_px) {
            return Err(ConfigError::QualityRange {
                good_px: q.good_px,
                bad_px: q.bad_px,
            });
        }

        let mut seen = HashSet::new();
        for m in &self.markers {
            if !seen.insert(m.id.as_str()) {
                return Err(ConfigError::DuplicateMarker(m.id.clone()));
            }
            if !(m.size_m.is_finite() && m.size_m > 0.0) {
                return Err(ConfigError::MarkerSize {
                    id: m.id.clone(),
                    size_m: m.size_m,
                });
            }
            if m.t_marker_zone.rotation.as_ref().norm() < 1e-12 {
                return Err(ConfigError::MarkerRotation(m.id.clone()));
            }
        }
        Ok(())
    }
}
