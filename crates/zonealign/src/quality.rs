use serde::{Deserialize, Serialize};
use zonealign_core::AlignmentQuality;

/// Maps mean reprojection error to a `[0, 1]` score for the drift monitor.
///
/// Errors at or below `good_px` score 1, at or above `bad_px` score 0, with a
/// linear ramp in between.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityScoreParams {
    pub good_px: f64,
    pub bad_px: f64,
}

impl Default for QualityScoreParams {
    fn default() -> Self {
        Self {
            good_px: 1.0,
            bad_px: 8.0,
        }
    }
}

impl QualityScoreParams {
    pub fn score(&self, quality: &AlignmentQuality) -> f32 {
        if quality.samples() == 0 {
            return 0.0;
        }
        let mean = quality.mean_px();
        if mean <= self.good_px {
            return 1.0;
        }
        if mean >= self.bad_px {
            return 0.0;
        }
        (1.0 - (mean - self.good_px) / (self.bad_px - self.good_px)) as f32
    }
}
