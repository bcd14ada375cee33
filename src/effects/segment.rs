//! Effect segments
//!
//! A segment is one splice-able unit: an input level meter, the plugin
//! element(s) and an output level meter, wrapped in a bin named after the
//! segment kind. Segments whose plugins are missing are built empty and stay
//! out of the pipeline.

use log::warn;

use super::equalizer::{band_properties, gain_to_volume, EQ_NUM_BANDS};
use super::kind::SegmentKind;
use super::plugins::{plugin_factory, PluginRegistry, LEVEL_FACTORY, VOLUME_FACTORY};
use crate::config::{FilterSettings, HostConfig};
use crate::pipeline::PropertyValue;

/// Element name of the autovolume meter inside the limiter segment
pub const AUTOVOLUME_ELEMENT: &str = "autovolume";
/// Element name of the equalizer's input gain
pub const EQ_INPUT_GAIN_ELEMENT: &str = "equalizer_input_gain";
/// Element name of the equalizer's output gain
pub const EQ_OUTPUT_GAIN_ELEMENT: &str = "equalizer_output_gain";

/// Blueprint of a single element
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSpec {
    pub name: String,
    pub factory: String,
    /// Properties set right after creation, in order
    pub properties: Vec<(String, PropertyValue)>,
}

impl ElementSpec {
    pub fn new(name: impl Into<String>, factory: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            factory: factory.into(),
            properties: Vec::new(),
        }
    }

    /// Add an initial property
    pub fn with(mut self, property: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.push((property.to_string(), value.into()));
        self
    }

    /// Initial value of `property`, if set
    pub fn property(&self, property: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .rev()
            .find(|(k, _)| k == property)
            .map(|(_, v)| v)
    }
}

/// A splice-able chain of elements
#[derive(Debug, Clone)]
pub struct EffectSegment {
    kind: SegmentKind,
    elements: Vec<ElementSpec>,
    installed: bool,
}

impl EffectSegment {
    /// Build the segment for `kind` from the configuration
    ///
    /// When one of the required factories is not installed the segment is
    /// returned empty and marked as not installed.
    pub fn build(kind: SegmentKind, registry: &dyn PluginRegistry, config: &HostConfig) -> Self {
        let missing = registry.missing_factories(kind);
        if !missing.is_empty() {
            warn!(
                "{} plugin was not found. Disabling it! (missing: {})",
                kind.display_name(),
                missing.join(", ")
            );
            return Self {
                kind,
                elements: Vec::new(),
                installed: false,
            };
        }

        let elements = match kind {
            SegmentKind::Spectrum => vec![Self::spectrum_element(config)],
            _ => Self::metered_elements(kind, config),
        };

        Self {
            kind,
            elements,
            installed: true,
        }
    }

    fn metered_elements(kind: SegmentKind, config: &HostConfig) -> Vec<ElementSpec> {
        let input_level = ElementSpec::new(kind.input_level_name(), LEVEL_FACTORY);
        let output_level = ElementSpec::new(kind.output_level_name(), LEVEL_FACTORY);
        let plugin = Self::plugin_element(kind, config);

        match kind {
            SegmentKind::Limiter => {
                let autovolume = ElementSpec::new(AUTOVOLUME_ELEMENT, LEVEL_FACTORY)
                    .with("interval", seconds_to_ns(config.autovolume.window))
                    .with("post-messages", config.autovolume.enabled);
                vec![input_level, plugin, output_level, autovolume]
            }
            SegmentKind::Equalizer => {
                let input_gain = ElementSpec::new(EQ_INPUT_GAIN_ELEMENT, VOLUME_FACTORY)
                    .with("volume", gain_to_volume(config.equalizer.input_gain));
                let output_gain = ElementSpec::new(EQ_OUTPUT_GAIN_ELEMENT, VOLUME_FACTORY)
                    .with("volume", gain_to_volume(config.equalizer.output_gain));
                vec![input_gain, input_level, plugin, output_gain, output_level]
            }
            _ => vec![input_level, plugin, output_level],
        }
    }

    fn plugin_element(kind: SegmentKind, config: &HostConfig) -> ElementSpec {
        let element = ElementSpec::new(kind.name(), plugin_factory(kind));
        match kind {
            SegmentKind::Limiter => element
                .with("input-gain", config.limiter.input_gain)
                .with("limit", config.limiter.limit)
                .with("release-time", config.limiter.release_time),
            SegmentKind::Panorama => element.with("method", "psychoacoustic"),
            SegmentKind::Highpass => cheby_filter(element, "high-pass", &config.highpass),
            SegmentKind::Lowpass => cheby_filter(element, "low-pass", &config.lowpass),
            SegmentKind::Equalizer => {
                let mut element = element.with("num-bands", EQ_NUM_BANDS as i64);
                element
                    .properties
                    .extend(band_properties(&config.equalizer.bands));
                element
            }
            _ => element,
        }
    }

    fn spectrum_element(config: &HostConfig) -> ElementSpec {
        ElementSpec::new(SegmentKind::Spectrum.name(), plugin_factory(SegmentKind::Spectrum))
            .with("bands", config.spectrum.n_bands as i64)
            .with("threshold", config.spectrum.threshold.round() as i64)
            .with("post-messages", config.is_enabled(SegmentKind::Spectrum))
    }

    pub fn kind(&self) -> SegmentKind {
        self.kind
    }

    pub fn bin_name(&self) -> String {
        self.kind.bin_name()
    }

    /// Name of the plugin element, the target of settings changes
    pub fn plugin_element_name(&self) -> &'static str {
        self.kind.name()
    }

    /// Elements in link order
    pub fn elements(&self) -> &[ElementSpec] {
        &self.elements
    }

    pub fn element(&self, name: &str) -> Option<&ElementSpec> {
        self.elements.iter().find(|e| e.name == name)
    }

    /// Check if every plugin this segment needs was found
    pub fn is_installed(&self) -> bool {
        self.installed
    }
}

fn cheby_filter(element: ElementSpec, mode: &str, settings: &FilterSettings) -> ElementSpec {
    element
        .with("mode", mode)
        .with("type", 1)
        .with("ripple", 0)
        .with("cutoff", settings.cutoff)
        .with("poles", settings.poles)
}

/// Seconds to the nanosecond interval used by meters
pub fn seconds_to_ns(seconds: f64) -> i64 {
    (seconds * 1_000_000_000.0) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::StaticRegistry;

    fn names(segment: &EffectSegment) -> Vec<&str> {
        segment.elements().iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_plain_segment_layout() {
        let segment = EffectSegment::build(
            SegmentKind::Reverb,
            &StaticRegistry::with_all_known(),
            &HostConfig::default(),
        );
        assert!(segment.is_installed());
        assert_eq!(
            names(&segment),
            vec!["reverb_input_level", "reverb", "reverb_output_level"]
        );
        assert_eq!(segment.bin_name(), "reverb_bin");
    }

    #[test]
    fn test_limiter_carries_autovolume_meter() {
        let segment = EffectSegment::build(
            SegmentKind::Limiter,
            &StaticRegistry::with_all_known(),
            &HostConfig::default(),
        );
        assert_eq!(names(&segment).last(), Some(&AUTOVOLUME_ELEMENT));
        let autovolume = segment.element(AUTOVOLUME_ELEMENT).unwrap();
        assert_eq!(autovolume.property("interval"), Some(&PropertyValue::Int(1_000_000_000)));
        assert_eq!(autovolume.property("post-messages"), Some(&PropertyValue::Bool(false)));
    }

    #[test]
    fn test_equalizer_gain_stages() {
        let mut config = HostConfig::default();
        config.equalizer.input_gain = -20.0;
        let segment =
            EffectSegment::build(SegmentKind::Equalizer, &StaticRegistry::with_all_known(), &config);
        assert_eq!(
            names(&segment),
            vec![
                EQ_INPUT_GAIN_ELEMENT,
                "equalizer_input_level",
                "equalizer",
                EQ_OUTPUT_GAIN_ELEMENT,
                "equalizer_output_level"
            ]
        );
        let volume = segment
            .element(EQ_INPUT_GAIN_ELEMENT)
            .and_then(|e| e.property("volume"))
            .and_then(PropertyValue::as_f64)
            .unwrap();
        assert!((volume - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_filters_differ_by_mode() {
        let registry = StaticRegistry::with_all_known();
        let config = HostConfig::default();
        let highpass = EffectSegment::build(SegmentKind::Highpass, &registry, &config);
        let lowpass = EffectSegment::build(SegmentKind::Lowpass, &registry, &config);

        let mode = |s: &EffectSegment| {
            s.element(s.plugin_element_name())
                .and_then(|e| e.property("mode"))
                .cloned()
        };
        assert_eq!(mode(&highpass), Some(PropertyValue::from("high-pass")));
        assert_eq!(mode(&lowpass), Some(PropertyValue::from("low-pass")));
    }

    #[test]
    fn test_spectrum_has_no_meters() {
        let segment = EffectSegment::build(
            SegmentKind::Spectrum,
            &StaticRegistry::with_all_known(),
            &HostConfig::default(),
        );
        assert_eq!(names(&segment), vec!["spectrum"]);
        assert_eq!(
            segment.element("spectrum").and_then(|e| e.property("bands")),
            Some(&PropertyValue::Int(1600))
        );
    }

    #[test]
    fn test_missing_plugin_builds_empty_segment() {
        let registry = StaticRegistry::with_all_known().without("ladspa-sc4-1882-so-sc4");
        let segment = EffectSegment::build(SegmentKind::Compressor, &registry, &HostConfig::default());
        assert!(!segment.is_installed());
        assert!(segment.elements().is_empty());
    }

    #[test]
    fn test_seconds_to_ns() {
        assert_eq!(seconds_to_ns(0.5), 500_000_000);
        assert_eq!(seconds_to_ns(2.0), 2_000_000_000);
    }
}
