//! Host configuration
//!
//! Everything the pipeline host is built from: layout, stream format, device
//! buffering, which segments start enabled and the initial plugin settings.
//! Loaded from JSON; missing fields fall back to defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::effects::{default_bands, ChainLayout, EqBand, SegmentKind, EQ_NUM_BANDS};
use crate::error::{PulseFxError, Result};

/// Limiter plugin settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterSettings {
    /// Input gain in dB
    pub input_gain: f64,
    /// Output ceiling in dB
    pub limit: f64,
    /// Release time in seconds
    pub release_time: f64,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            input_gain: -10.0,
            limit: 0.0,
            release_time: 1.0,
        }
    }
}

/// Highpass/lowpass plugin settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSettings {
    /// Cutoff in Hz
    pub cutoff: i64,
    pub poles: i64,
}

impl FilterSettings {
    pub fn highpass() -> Self {
        Self {
            cutoff: 20,
            poles: 4,
        }
    }

    pub fn lowpass() -> Self {
        Self {
            cutoff: 20000,
            poles: 4,
        }
    }
}

/// Automatic input gain riding on the limiter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutovolumeConfig {
    pub enabled: bool,
    /// Measurement window in seconds
    pub window: f64,
    /// Target peak in dB
    pub target: f64,
    /// Accepted deviation from the target in dB
    pub tolerance: f64,
    /// Peaks below this level (dB) are ignored
    pub threshold: f64,
}

impl Default for AutovolumeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window: 1.0,
            target: -12.0,
            tolerance: 1.0,
            threshold: -50.0,
        }
    }
}

/// Spectrum analyzer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    /// Bands computed by the analyzer element
    pub n_bands: usize,
    /// Points on the display axis
    pub n_points: usize,
    /// Magnitudes at or below this level (dB) count as silence
    pub threshold: f64,
    /// Highest band frequency kept, in Hz
    pub max_freq: f64,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            n_bands: 1600,
            n_points: 250,
            threshold: -120.0,
            max_freq: 20000.0,
        }
    }
}

/// Equalizer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqualizerConfig {
    /// Gain before the bands, in dB
    pub input_gain: f64,
    /// Gain after the bands, in dB
    pub output_gain: f64,
    pub bands: Vec<EqBand>,
}

impl Default for EqualizerConfig {
    fn default() -> Self {
        Self {
            input_gain: 0.0,
            output_gain: 0.0,
            bands: default_bands(),
        }
    }
}

/// Everything a pipeline host is built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub layout: ChainLayout,
    /// Sampling rate in Hz
    pub rate: u32,
    /// Device buffer time in microseconds
    pub buffer_time_us: i64,
    /// Device latency time in microseconds
    pub latency_time_us: i64,
    /// Segments enabled at startup
    pub enabled: Vec<SegmentKind>,
    /// Route every new stream through the effects
    pub switch_on_all_apps: bool,
    pub source_device: Option<String>,
    pub sink_device: Option<String>,
    pub limiter: LimiterSettings,
    pub autovolume: AutovolumeConfig,
    #[serde(default = "FilterSettings::highpass")]
    pub highpass: FilterSettings,
    #[serde(default = "FilterSettings::lowpass")]
    pub lowpass: FilterSettings,
    pub equalizer: EqualizerConfig,
    pub spectrum: SpectrumConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            layout: ChainLayout::SinkInputs,
            rate: 48000,
            buffer_time_us: 100_000,
            latency_time_us: 10_000,
            enabled: vec![SegmentKind::Spectrum],
            switch_on_all_apps: false,
            source_device: None,
            sink_device: None,
            limiter: LimiterSettings::default(),
            autovolume: AutovolumeConfig::default(),
            highpass: FilterSettings::highpass(),
            lowpass: FilterSettings::lowpass(),
            equalizer: EqualizerConfig::default(),
            spectrum: SpectrumConfig::default(),
        }
    }
}

impl HostConfig {
    /// Default configuration for `layout`
    pub fn for_layout(layout: ChainLayout) -> Self {
        Self {
            layout,
            ..Self::default()
        }
    }

    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: HostConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check value ranges and cross-field constraints
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(PulseFxError::InvalidConfig { reason });

        if self.rate == 0 {
            return invalid("rate must be positive".to_string());
        }
        if self.buffer_time_us <= 0 || self.latency_time_us <= 0 {
            return invalid("buffer and latency times must be positive".to_string());
        }
        if let Some(kind) = self.enabled.iter().find(|k| !self.layout.contains(**k)) {
            return invalid(format!("{} is not available in the {} layout", kind, self.layout));
        }
        if self.spectrum.n_bands == 0 {
            return invalid("spectrum needs at least one band".to_string());
        }
        if self.spectrum.n_points < 2 {
            return invalid("spectrum axis needs at least two points".to_string());
        }
        if self.spectrum.threshold >= 0.0 {
            return invalid("spectrum threshold must be below 0 dB".to_string());
        }
        if self.equalizer.bands.len() != EQ_NUM_BANDS {
            return invalid(format!(
                "equalizer needs {} bands, got {}",
                EQ_NUM_BANDS,
                self.equalizer.bands.len()
            ));
        }
        if let Some(band) = self.equalizer.bands.iter().find(|b| b.freq <= 0.0 || b.q <= 0.0) {
            return invalid(format!(
                "equalizer band at {} Hz needs positive frequency and q",
                band.freq
            ));
        }
        if self.autovolume.tolerance < 0.0 || self.autovolume.window <= 0.0 {
            return invalid("autovolume window must be positive and tolerance non-negative".to_string());
        }
        Ok(())
    }

    /// Check if `kind` starts enabled
    pub fn is_enabled(&self, kind: SegmentKind) -> bool {
        self.enabled.contains(&kind)
    }
}
