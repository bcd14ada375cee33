//! Automatic input gain for the limiter
//!
//! The `autovolume` meter inside the limiter segment reports a windowed peak.
//! Whenever that peak leaves the `target ± tolerance` band the limiter's
//! input gain is stepped by one dB towards it.

use crate::config::{AutovolumeConfig, LimiterSettings};

/// Lowest input gain autovolume will set, in dB
pub const AUTOVOLUME_MIN_GAIN: f64 = -20.0;
/// Highest input gain autovolume will set, in dB
pub const AUTOVOLUME_MAX_GAIN: f64 = 20.0;
/// Gain change per measurement, in dB
pub const AUTOVOLUME_STEP: f64 = 1.0;

/// Input gain the limiter is reset to when autovolume is toggled
const RESET_INPUT_GAIN: f64 = -10.0;

/// Autovolume controller state
#[derive(Debug, Clone)]
pub struct Autovolume {
    config: AutovolumeConfig,
}

impl Autovolume {
    pub fn new(config: AutovolumeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AutovolumeConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Check if a measured peak should drive the gain
    pub fn should_track(&self, max_peak: f64) -> bool {
        self.config.enabled && max_peak > self.config.threshold
    }

    /// Gain to apply after measuring `max_peak` with the limiter at `current_gain`
    ///
    /// Returns `None` when the gain stays put: autovolume is off, the peak is
    /// below the threshold or inside the tolerance band, or the step would
    /// leave the allowed gain range.
    pub fn next_gain(&self, max_peak: f64, current_gain: f64) -> Option<f64> {
        if !self.should_track(max_peak) {
            return None;
        }

        let peak = max_peak.trunc();
        let upper = self.config.target + self.config.tolerance;
        let lower = self.config.target - self.config.tolerance;

        if peak > upper {
            let gain = current_gain - AUTOVOLUME_STEP;
            (gain >= AUTOVOLUME_MIN_GAIN).then_some(gain)
        } else if peak < lower {
            let gain = current_gain + AUTOVOLUME_STEP;
            (gain <= AUTOVOLUME_MAX_GAIN).then_some(gain)
        } else {
            None
        }
    }

    /// Limiter settings matching the current autovolume state
    pub fn limiter_settings(&self) -> LimiterSettings {
        if self.config.enabled {
            LimiterSettings {
                input_gain: RESET_INPUT_GAIN,
                limit: self.limit(),
                release_time: self.config.window,
            }
        } else {
            LimiterSettings {
                input_gain: RESET_INPUT_GAIN,
                ..LimiterSettings::default()
            }
        }
    }

    /// Limiter ceiling while autovolume runs
    pub fn limit(&self) -> f64 {
        self.config.target + self.config.tolerance
    }

    /// Measurement interval of the autovolume meter in nanoseconds
    pub fn interval_ns(&self) -> i64 {
        super::segment::seconds_to_ns(self.config.window)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    pub fn set_target(&mut self, target: f64) {
        self.config.target = target;
    }

    pub fn set_tolerance(&mut self, tolerance: f64) {
        self.config.tolerance = tolerance;
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.config.threshold = threshold;
    }

    /// Set the measurement window in seconds
    pub fn set_window(&mut self, window: f64) {
        self.config.window = window;
    }
}
