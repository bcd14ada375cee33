//! Spectrum display
//!
//! The analyzer element reports `n_bands` linearly spaced magnitudes. The
//! display wants a log frequency axis, so the bands below `max_freq` are
//! interpolated with a natural cubic spline, sampled on a log-spaced axis and
//! normalised against the silence threshold.

use log::debug;

use crate::config::SpectrumConfig;
use crate::error::{PulseFxError, Result};

/// Exponent of the lowest display frequency (about 20 Hz)
pub const AXIS_MIN_EXP: f64 = 1.3;
/// Exponent of the highest display frequency (about 20 kHz)
pub const AXIS_MAX_EXP: f64 = 4.3;

/// Natural cubic spline through a set of points
///
/// Evaluation outside the knots extrapolates the first or last polynomial.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    /// Second derivatives at the knots
    m: Vec<f64>,
}

impl CubicSpline {
    /// Fit a spline with zero curvature at both ends
    ///
    /// Needs at least two points with strictly increasing `x`.
    pub fn natural(x: &[f64], y: &[f64]) -> Result<Self> {
        if x.len() != y.len() {
            return Err(PulseFxError::InvalidConfig {
                reason: format!("spline needs as many values ({}) as knots ({})", y.len(), x.len()),
            });
        }
        if x.len() < 2 {
            return Err(PulseFxError::InvalidConfig {
                reason: "spline needs at least two knots".to_string(),
            });
        }
        if x.windows(2).any(|w| w[1] <= w[0]) {
            return Err(PulseFxError::InvalidConfig {
                reason: "spline knots must be strictly increasing".to_string(),
            });
        }

        let n = x.len();
        let mut m = vec![0.0; n];

        if n > 2 {
            // Tridiagonal system for m[1..n-1], solved with the Thomas algorithm
            let size = n - 2;
            let mut diag = vec![0.0; size];
            let mut upper = vec![0.0; size];
            let mut rhs = vec![0.0; size];

            for j in 0..size {
                let i = j + 1;
                let h0 = x[i] - x[i - 1];
                let h1 = x[i + 1] - x[i];
                diag[j] = 2.0 * (h0 + h1);
                upper[j] = h1;
                rhs[j] = 6.0 * ((y[i + 1] - y[i]) / h1 - (y[i] - y[i - 1]) / h0);
            }

            // Forward sweep; the lower diagonal of row j is h0 of row j
            for j in 1..size {
                let lower = x[j + 1] - x[j];
                let w = lower / diag[j - 1];
                diag[j] -= w * upper[j - 1];
                rhs[j] -= w * rhs[j - 1];
            }

            m[size] = rhs[size - 1] / diag[size - 1];
            for j in (0..size - 1).rev() {
                m[j + 1] = (rhs[j] - upper[j] * m[j + 2]) / diag[j];
            }
        }

        Ok(Self {
            x: x.to_vec(),
            y: y.to_vec(),
            m,
        })
    }

    /// Value of the spline at `t`
    pub fn eval(&self, t: f64) -> f64 {
        let last = self.x.len() - 2;
        let i = self.x.partition_point(|&k| k <= t).saturating_sub(1).min(last);

        let h = self.x[i + 1] - self.x[i];
        let a = (self.x[i + 1] - t) / h;
        let b = (t - self.x[i]) / h;

        a * self.y[i]
            + b * self.y[i + 1]
            + ((a * a * a - a) * self.m[i] + (b * b * b - b) * self.m[i + 1]) * h * h / 6.0
    }
}

/// Centre frequencies of the analyzer bands up to `max_freq`
pub fn band_freqs(rate: u32, n_bands: usize, max_freq: f64) -> Vec<f64> {
    let rate = rate as f64;
    let n = n_bands as f64;
    (0..n_bands)
        .map(|i| rate * (0.5 * i as f64 + 0.25) / n)
        .take_while(|f| *f <= max_freq)
        .collect()
}

/// `n_points` frequencies log-spaced over the display range
pub fn log_axis(n_points: usize) -> Vec<f64> {
    match n_points {
        0 => Vec::new(),
        1 => vec![10f64.powf(AXIS_MIN_EXP)],
        _ => {
            let step = (AXIS_MAX_EXP - AXIS_MIN_EXP) / (n_points - 1) as f64;
            (0..n_points)
                .map(|i| 10f64.powf(AXIS_MIN_EXP + step * i as f64))
                .collect()
        }
    }
}

/// Turns analyzer magnitudes into display frames
#[derive(Debug, Clone)]
pub struct SpectrumAnalyzer {
    config: SpectrumConfig,
    rate: u32,
    freqs: Vec<f64>,
    axis: Vec<f64>,
}

impl SpectrumAnalyzer {
    pub fn new(config: SpectrumConfig, rate: u32) -> Self {
        let freqs = band_freqs(rate, config.n_bands, config.max_freq);
        let axis = log_axis(config.n_points);
        Self {
            config,
            rate,
            freqs,
            axis,
        }
    }

    /// Band frequencies fed to the spline
    pub fn freqs(&self) -> &[f64] {
        &self.freqs
    }

    /// Number of bands below the maximum frequency
    pub fn n_freqs(&self) -> usize {
        self.freqs.len()
    }

    /// Frequencies of the display points
    pub fn axis(&self) -> &[f64] {
        &self.axis
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub fn config(&self) -> &SpectrumConfig {
        &self.config
    }

    /// Recompute band frequencies for a newly negotiated rate
    pub fn set_rate(&mut self, rate: u32) {
        self.rate = rate;
        self.freqs = band_freqs(rate, self.config.n_bands, self.config.max_freq);
    }

    /// Change the number of display points
    pub fn set_n_points(&mut self, n_points: usize) {
        self.config.n_points = n_points;
        self.axis = log_axis(n_points);
    }

    /// Build a display frame from one analyzer message
    ///
    /// Values are in `[0, 1]`, 0 being the threshold and 1 being 0 dB.
    /// Returns `None` when the frame is silent or the message is too short.
    pub fn process(&self, magnitudes: &[f32]) -> Option<Vec<f64>> {
        let n = self.freqs.len();
        if magnitudes.len() < n {
            debug!(
                "spectrum message has {} bands, expected at least {}",
                magnitudes.len(),
                n
            );
            return None;
        }

        let values: Vec<f64> = magnitudes[..n].iter().map(|&v| v as f64).collect();
        let spline = match CubicSpline::natural(&self.freqs, &values) {
            Ok(spline) => spline,
            Err(e) => {
                debug!("spectrum interpolation skipped: {}", e);
                return None;
            }
        };

        let resampled: Vec<f64> = self.axis.iter().map(|&f| spline.eval(f)).collect();
        let max = resampled.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let threshold = self.config.threshold;
        if max > threshold {
            Some(
                resampled
                    .into_iter()
                    .map(|m| ((threshold - m) / threshold).clamp(0.0, 1.0))
                    .collect(),
            )
        } else {
            None
        }
    }
}
