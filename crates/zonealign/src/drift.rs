//! Alignment drift detection.
//!
//! A sliding window of per-frame quality scores with asymmetric thresholds:
//! the monitor flips to degraded when the window average falls to
//! `degrade_threshold` and only recovers once it climbs back to
//! `recover_threshold`. Nothing is decided before `min_samples` scores have
//! arrived, so a fresh session does not flap.
//!
//! One monitor belongs to one AR session and is not meant to be shared.

use log::debug;
use serde::{Deserialize, Serialize};

/// Invalid drift monitor parameters.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DriftConfigError {
    #[error("window size must be at least 1")]
    EmptyWindow,
    #[error("min_samples ({min_samples}) must be between 1 and the window size ({window_size})")]
    MinSamples {
        min_samples: usize,
        window_size: usize,
    },
    #[error("degrade threshold {degrade} must not exceed recover threshold {recover}")]
    Thresholds { degrade: f32, recover: f32 },
}

/// Tuning for [`DriftMonitor`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftParams {
    pub window_size: usize,
    pub min_samples: usize,
    /// Healthy → degraded at or below this average.
    pub degrade_threshold: f32,
    /// Degraded → healthy at or above this average.
    pub recover_threshold: f32,
}

impl Default for DriftParams {
    fn default() -> Self {
        Self {
            window_size: 20,
            min_samples: 6,
            degrade_threshold: 0.55,
            recover_threshold: 0.65,
        }
    }
}

impl DriftParams {
    pub fn validate(&self) -> Result<(), DriftConfigError> {
        if self.window_size == 0 {
            return Err(DriftConfigError::EmptyWindow);
        }
        if self.min_samples == 0 || self.min_samples > self.window_size {
            return Err(DriftConfigError::MinSamples {
                min_samples: self.min_samples,
                window_size: self.window_size,
            });
        }
        if !(self.degrade_threshold <= self.recover_threshold) {
            return Err(DriftConfigError::Thresholds {
                degrade: self.degrade_threshold,
                recover: self.recover_threshold,
            });
        }
        Ok(())
    }
}

/// Result of one [`DriftMonitor::update`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DriftState {
    pub is_degraded: bool,
    /// The degraded flag flipped on this update.
    pub changed: bool,
    pub average_score: f32,
}

impl DriftState {
    /// The UI should ask for recalibration.
    #[inline]
    pub fn needs_recalibration(&self) -> bool {
        self.changed && self.is_degraded
    }
}

#[derive(Clone, Debug)]
pub struct DriftMonitor {
    params: DriftParams,
    scores: Vec<f32>,
    /// Slot the next score goes into.
    head: usize,
    len: usize,
    sum: f64,
    degraded: bool,
}

impl Default for DriftMonitor {
    fn default() -> Self {
        Self::with_params(DriftParams::default())
    }
}

impl DriftMonitor {
    pub fn new(params: DriftParams) -> Result<Self, DriftConfigError> {
        params.validate()?;
        Ok(Self::with_params(params))
    }

    fn with_params(params: DriftParams) -> Self {
        Self {
            params,
            scores: vec![0.0; params.window_size],
            head: 0,
            len: 0,
            sum: 0.0,
            degraded: false,
        }
    }

    #[inline]
    pub fn params(&self) -> &DriftParams {
        &self.params
    }

    #[inline]
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Number of scores currently in the window.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Push one quality score and re-evaluate the degraded flag.
    ///
    /// A non-finite score is recorded as `0`, the same as a failed frame.
    pub fn update(&mut self, score: f32) -> DriftState {
        let score = if score.is_finite() {
            score
        } else {
            debug!("drift: non-finite score {score} recorded as 0");
            0.0
        };
        let capacity = self.scores.len();
        if self.len == capacity {
            self.sum -= self.scores[self.head] as f64;
        } else {
            self.len += 1;
        }
        self.scores[self.head] = score;
        self.sum += score as f64;
        self.head = (self.head + 1) % capacity;

        let average = self.sum / self.len as f64;
        let was_degraded = self.degraded;
        if self.len >= self.params.min_samples {
            if !self.degraded && average <= self.params.degrade_threshold as f64 {
                self.degraded = true;
            } else if self.degraded && average >= self.params.recover_threshold as f64 {
                self.degraded = false;
            }
        }

        let changed = was_degraded != self.degraded;
        if changed {
            debug!(
                "alignment {} (window average {average:.3} over {} frames)",
                if self.degraded { "degraded" } else { "recovered" },
                self.len
            );
        }

        DriftState {
            is_degraded: self.degraded,
            changed,
            average_score: average as f32,
        }
    }

    /// Forget all history; call on a new alignment or session.
    pub fn reset(&mut self) {
        self.scores.fill(0.0);
        self.head = 0;
        self.len = 0;
        self.sum = 0.0;
        self.degraded = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn degrades_then_recovers_with_hysteresis() {
        let mut monitor = DriftMonitor::default();

        let mut last = None;
        for i in 0..6 {
            let state = monitor.update(0.5);
            if i < 5 {
                assert!(!state.is_degraded, "no decision before min_samples");
            }
            last = Some(state);
        }
        let state = last.expect("updated");
        assert!(state.is_degraded);
        assert!(state.changed);
        assert!(state.needs_recalibration());
        assert_relative_eq!(state.average_score, 0.5, epsilon = 1e-6);

        for i in 0..6 {
            let state = monitor.update(0.8);
            if i < 5 {
                // Between the thresholds the flag holds.
                assert!(state.is_degraded);
                assert!(!state.changed);
            } else {
                assert!(!state.is_degraded);
                assert!(state.changed);
                assert_relative_eq!(state.average_score, 0.65, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn average_covers_only_the_window() {
        let params = DriftParams {
            window_size: 5,
            min_samples: 1,
            ..DriftParams::default()
        };
        let mut monitor = DriftMonitor::new(params).expect("valid");
        for _ in 0..5 {
            monitor.update(0.0);
        }
        let mut state = monitor.update(1.0);
        assert_relative_eq!(state.average_score, 0.2, epsilon = 1e-6);
        for _ in 0..3 {
            state = monitor.update(1.0);
        }
        assert_relative_eq!(state.average_score, 0.8, epsilon = 1e-6);
        assert_eq!(monitor.len(), 5);
    }

    #[test]
    fn default_window_evicts_oldest() {
        let mut monitor = DriftMonitor::default();
        for _ in 0..20 {
            monitor.update(0.2);
        }
        let mut state = monitor.update(0.9);
        for _ in 0..9 {
            state = monitor.update(0.9);
        }
        // 10 × 0.2 + 10 × 0.9 over the last 20.
        assert_relative_eq!(state.average_score, 0.55, epsilon = 1e-6);
        for _ in 0..10 {
            state = monitor.update(0.9);
        }
        assert_relative_eq!(state.average_score, 0.9, epsilon = 1e-6);
        assert!(!state.is_degraded);
    }

    #[test]
    fn healthy_scores_never_flip() {
        let mut monitor = DriftMonitor::default();
        for _ in 0..50 {
            let state = monitor.update(0.9);
            assert!(!state.is_degraded);
            assert!(!state.changed);
        }
    }

    #[test]
    fn reset_clears_state() {
        let mut monitor = DriftMonitor::default();
        for _ in 0..8 {
            monitor.update(0.1);
        }
        assert!(monitor.is_degraded());
        monitor.reset();
        assert!(!monitor.is_degraded());
        assert!(monitor.is_empty());
        let state = monitor.update(0.9);
        assert_relative_eq!(state.average_score, 0.9, epsilon = 1e-6);
        assert!(!state.changed);
    }

    #[test]
    fn non_finite_scores_count_as_failures() {
        let mut monitor = DriftMonitor::default();
        let state = monitor.update(f32::NAN);
        assert_eq!(state.average_score, 0.0);
        monitor.update(f32::INFINITY);

        let mut state = monitor.update(0.1);
        for _ in 0..40 {
            state = monitor.update(0.1);
        }
        assert!(state.average_score.is_finite());
        assert_relative_eq!(state.average_score, 0.1, epsilon = 1e-6);
        assert!(state.is_degraded);

        for _ in 0..20 {
            state = monitor.update(0.9);
        }
        assert!(!state.is_degraded);
    }

    #[test]
    fn rejects_bad_params() {
        let bad_window = DriftParams {
            window_size: 0,
            ..DriftParams::default()
        };
        assert_eq!(
            DriftMonitor::new(bad_window).unwrap_err(),
            DriftConfigError::EmptyWindow
        );

        let bad_min = DriftParams {
            min_samples: 30,
            ..DriftParams::default()
        };
        assert!(matches!(
            DriftMonitor::new(bad_min),
            Err(DriftConfigError::MinSamples { .. })
        ));

        let inverted = DriftParams {
            degrade_threshold: 0.7,
            recover_threshold: 0.6,
            ..DriftParams::default()
        };
        assert!(matches!(
            DriftMonitor::new(inverted),
            Err(DriftConfigError::Thresholds { .. })
        ));
    }
}
