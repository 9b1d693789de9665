//! Versioned audit records emitted when an alignment is committed.
//!
//! Both records validate their invariants on construction, including when
//! they are deserialized, so a value of these types is always well formed.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Schema version stamped on every [`AlignmentSnapshot`].
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Invariant violations in audit records.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AuditError {
    #[error("mean reprojection error must be a non-negative number (got {0})")]
    NegativeMean(f64),
    #[error("max reprojection error must be a non-negative number (got {0})")]
    NegativeMax(f64),
    #[error("sample count must be non-negative (got {0})")]
    NegativeSamples(i64),
    #[error("intrinsics hash must not be blank")]
    BlankIntrinsicsHash,
    #[error("unsupported snapshot schema version {0}")]
    SchemaVersion(u32),
}

/// Reprojection-error statistics in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawQuality")]
pub struct AlignmentQuality {
    mean_px: f64,
    max_px: f64,
    samples: u64,
}

#[derive(Deserialize)]
struct RawQuality {
    mean_px: f64,
    max_px: f64,
    samples: i64,
}

impl TryFrom<RawQuality> for AlignmentQuality {
    type Error = AuditError;

    fn try_from(raw: RawQuality) -> Result<Self, Self::Error> {
        if raw.samples < 0 {
            return Err(AuditError::NegativeSamples(raw.samples));
        }
        AlignmentQuality::new(raw.mean_px, raw.max_px, raw.samples as u64)
    }
}

impl AlignmentQuality {
    pub fn new(mean_px: f64, max_px: f64, samples: u64) -> Result<Self, AuditError> {
        // Written so that NaN fails too.
        if !(mean_px >= 0.0) {
            return Err(AuditError::NegativeMean(mean_px));
        }
        if !(max_px >= 0.0) {
            return Err(AuditError::NegativeMax(max_px));
        }
        Ok(Self {
            mean_px,
            max_px,
            samples,
        })
    }

    /// Statistics over a set of per-sample pixel errors.
    pub fn from_errors(errors: &[f64]) -> Result<Self, AuditError> {
        if errors.is_empty() {
            return Self::new(0.0, 0.0, 0);
        }
        let sum: f64 = errors.iter().sum();
        let max = errors.iter().copied().fold(0.0_f64, f64::max);
        Self::new(sum / errors.len() as f64, max, errors.len() as u64)
    }

    /// Combine two statistics as if their samples had been pooled.
    pub fn merge(&self, other: &AlignmentQuality) -> AlignmentQuality {
        let samples = self.samples + other.samples;
        let mean_px = if samples == 0 {
            0.0
        } else {
            (self.mean_px * self.samples as f64 + other.mean_px * other.samples as f64)
                / samples as f64
        };
        AlignmentQuality {
            mean_px,
            max_px: self.max_px.max(other.max_px),
            samples,
        }
    }

    #[inline]
    pub fn mean_px(&self) -> f64 {
        self.mean_px
    }

    #[inline]
    pub fn max_px(&self) -> f64 {
        self.max_px
    }

    #[inline]
    pub fn samples(&self) -> u64 {
        self.samples
    }
}

/// Immutable record of one committed alignment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSnapshot")]
pub struct AlignmentSnapshot {
    schema_version: u32,
    intrinsics_hash: String,
    reprojection: AlignmentQuality,
    /// Gravity in the device sensor frame, m/s².
    gravity: Vector3<f64>,
}

#[derive(Deserialize)]
struct RawSnapshot {
    schema_version: u32,
    intrinsics_hash: String,
    reprojection: AlignmentQuality,
    gravity: Vector3<f64>,
}

impl TryFrom<RawSnapshot> for AlignmentSnapshot {
    type Error = AuditError;

    fn try_from(raw: RawSnapshot) -> Result<Self, Self::Error> {
        if raw.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(AuditError::SchemaVersion(raw.schema_version));
        }
        AlignmentSnapshot::new(raw.intrinsics_hash, raw.reprojection, raw.gravity)
    }
}

impl AlignmentSnapshot {
    pub fn new(
        intrinsics_hash: impl Into<String>,
        reprojection: AlignmentQuality,
        gravity: Vector3<f64>,
    ) -> Result<Self, AuditError> {
        let intrinsics_hash = intrinsics_hash.into();
        if intrinsics_hash.trim().is_empty() {
            return Err(AuditError::BlankIntrinsicsHash);
        }
        Ok(Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            intrinsics_hash,
            reprojection,
            gravity,
        })
    }

    #[inline]
    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn intrinsics_hash(&self) -> &str {
        &self.intrinsics_hash
    }

    #[inline]
    pub fn reprojection(&self) -> &AlignmentQuality {
        &self.reprojection
    }

    #[inline]
    pub fn gravity(&self) -> &Vector3<f64> {
        &self.gravity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn quality_rejects_negative_fields() {
        assert_eq!(
            AlignmentQuality::new(-0.1, 1.0, 4),
            Err(AuditError::NegativeMean(-0.1))
        );
        assert_eq!(
            AlignmentQuality::new(0.1, -1.0, 4),
            Err(AuditError::NegativeMax(-1.0))
        );
        assert!(AlignmentQuality::new(f64::NAN, 1.0, 4).is_err());
        assert!(AlignmentQuality::new(0.0, 0.0, 0).is_ok());
    }

    #[test]
    fn negative_samples_fail_deserialization() {
        let json = r#"{"mean_px":0.5,"max_px":1.0,"samples":-3}"#;
        let err = serde_json::from_str::<AlignmentQuality>(json).unwrap_err();
        assert!(err.to_string().contains("sample count"));
    }

    #[test]
    fn merge_pools_samples() {
        let a = AlignmentQuality::new(1.0, 2.0, 4).unwrap();
        let b = AlignmentQuality::new(3.0, 5.0, 4).unwrap();
        let m = a.merge(&b);
        assert_relative_eq!(m.mean_px(), 2.0);
        assert_relative_eq!(m.max_px(), 5.0);
        assert_eq!(m.samples(), 8);
    }

    #[test]
    fn from_errors_summarizes() {
        let q = AlignmentQuality::from_errors(&[0.5, 1.5, 1.0]).unwrap();
        assert_relative_eq!(q.mean_px(), 1.0);
        assert_relative_eq!(q.max_px(), 1.5);
        assert_eq!(q.samples(), 3);
    }

    #[test]
    fn snapshot_rejects_blank_hash() {
        let q = AlignmentQuality::new(0.4, 0.9, 8).unwrap();
        let g = Vector3::new(0.0, -9.81, 0.0);
        assert_eq!(
            AlignmentSnapshot::new("  \t", q, g),
            Err(AuditError::BlankIntrinsicsHash)
        );
        let snap = AlignmentSnapshot::new("k:3f9a", q, g).unwrap();
        assert_eq!(snap.schema_version(), 1);
        assert_eq!(snap.intrinsics_hash(), "k:3f9a");
    }

    #[test]
    fn snapshot_json_keeps_version_and_validates() {
        let q = AlignmentQuality::new(0.4, 0.9, 8).unwrap();
        let snap = AlignmentSnapshot::new("k:3f9a", q, Vector3::new(0.0, -9.81, 0.0)).unwrap();
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("\"schema_version\":1"));
        let back: AlignmentSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);

        let bumped = json.replace("\"schema_version\":1", "\"schema_version\":2");
        assert!(serde_json::from_str::<AlignmentSnapshot>(&bumped).is_err());
        let blank = json.replace("k:3f9a", " ");
        assert!(serde_json::from_str::<AlignmentSnapshot>(&blank).is_err());
    }
}
