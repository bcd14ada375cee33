//! Equalizer band settings
//!
//! The equalizer plugin exposes one child object per band. Bands are
//! addressed as `band<i>::<property>` on the plugin element.

use serde::{Deserialize, Serialize};

use crate::meter::db_to_linear;
use crate::pipeline::PropertyValue;

/// Number of bands the equalizer plugin is configured with
pub const EQ_NUM_BANDS: usize = 15;

/// Band type value selecting a peaking filter
pub const BAND_TYPE_PEAK: i64 = 0;

const DEFAULT_FREQS: [f64; EQ_NUM_BANDS] = [
    25.0, 40.0, 63.0, 100.0, 160.0, 250.0, 400.0, 630.0, 1000.0, 1600.0, 2500.0, 4000.0, 6300.0,
    10000.0, 16000.0,
];

/// Q of a 2/3-octave band
const DEFAULT_Q: f64 = 2.145;

/// One equalizer band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqBand {
    /// Centre frequency in Hz
    pub freq: f64,
    /// Quality factor, bandwidth is `freq / q`
    pub q: f64,
    /// Gain in dB
    #[serde(default)]
    pub gain: f64,
}

impl EqBand {
    pub fn bandwidth(&self) -> f64 {
        self.freq / self.q
    }
}

/// The default flat 15-band layout
pub fn default_bands() -> Vec<EqBand> {
    DEFAULT_FREQS
        .iter()
        .map(|&freq| EqBand {
            freq,
            q: DEFAULT_Q,
            gain: 0.0,
        })
        .collect()
}

/// Property path of a band child property
pub fn band_property(index: usize, property: &str) -> String {
    format!("band{}::{}", index, property)
}

/// Properties configuring every band of the plugin
///
/// The outermost bands are forced to peak type; the shelf filters of the
/// plugin attenuate the opposite end of the spectrum when boosted.
pub fn band_properties(bands: &[EqBand]) -> Vec<(String, PropertyValue)> {
    let mut properties = Vec::with_capacity(bands.len() * 3 + 2);
    for (i, band) in bands.iter().enumerate() {
        properties.push((band_property(i, "freq"), PropertyValue::Double(band.freq)));
        properties.push((band_property(i, "bandwidth"), PropertyValue::Double(band.bandwidth())));
        properties.push((band_property(i, "gain"), PropertyValue::Double(band.gain)));
    }
    if !bands.is_empty() {
        properties.push((band_property(0, "type"), PropertyValue::Int(BAND_TYPE_PEAK)));
        properties.push((
            band_property(bands.len() - 1, "type"),
            PropertyValue::Int(BAND_TYPE_PEAK),
        ));
    }
    properties
}

/// Linear volume applied by the equalizer's gain elements
pub fn gain_to_volume(gain_db: f64) -> f64 {
    db_to_linear(gain_db)
}
