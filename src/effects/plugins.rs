//! Plugin factories and availability lookup
//!
//! Effects are opaque third-party elements looked up by factory name. A
//! segment is only built when every factory it needs is available.

use std::collections::HashSet;

use super::kind::SegmentKind;

/// Peak/RMS meter element
pub const LEVEL_FACTORY: &str = "level";
/// Linear gain element
pub const VOLUME_FACTORY: &str = "volume";
/// Sound-server capture element
pub const SOURCE_FACTORY: &str = "pulsesrc";
/// Sound-server playback element
pub const SINK_FACTORY: &str = "pulsesink";
/// Caps filter pinning the stream format
pub const CAPS_FACTORY: &str = "capsfilter";

/// Factory of the plugin element at the heart of a segment
pub fn plugin_factory(kind: SegmentKind) -> &'static str {
    match kind {
        SegmentKind::Limiter => "ladspa-fast-lookahead-limiter-1913-so-fastlookaheadlimiter",
        SegmentKind::Panorama => "audiopanorama",
        SegmentKind::Compressor => "ladspa-sc4-1882-so-sc4",
        SegmentKind::Reverb => "freeverb",
        SegmentKind::Highpass | SegmentKind::Lowpass => "audiocheblimit",
        SegmentKind::Equalizer => "equalizer-nbands",
        SegmentKind::Spectrum => "spectrum",
    }
}

/// Every factory a segment of `kind` is built from
pub fn required_factories(kind: SegmentKind) -> Vec<&'static str> {
    let mut factories = vec![plugin_factory(kind)];
    if kind.has_level_taps() {
        factories.push(LEVEL_FACTORY);
    }
    if kind == SegmentKind::Equalizer {
        factories.push(VOLUME_FACTORY);
    }
    factories
}

/// Lookup of installed element factories
pub trait PluginRegistry {
    fn has_factory(&self, factory: &str) -> bool;

    /// Factories needed by `kind` that are not installed
    fn missing_factories(&self, kind: SegmentKind) -> Vec<&'static str> {
        required_factories(kind)
            .into_iter()
            .filter(|f| !self.has_factory(f))
            .collect()
    }
}

/// Registry backed by a fixed set of factory names
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    factories: HashSet<String>,
}

impl StaticRegistry {
    /// Create a registry knowing exactly `factories`
    pub fn new<I, S>(factories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            factories: factories.into_iter().map(Into::into).collect(),
        }
    }

    /// A registry where every factory this crate uses is installed
    pub fn with_all_known() -> Self {
        let mut factories: Vec<&str> = SegmentKind::ALL.iter().map(|k| plugin_factory(*k)).collect();
        factories.extend([
            LEVEL_FACTORY,
            VOLUME_FACTORY,
            SOURCE_FACTORY,
            SINK_FACTORY,
            CAPS_FACTORY,
        ]);
        Self::new(factories)
    }

    /// Drop `factory` from the registry
    pub fn without(mut self, factory: &str) -> Self {
        self.factories.remove(factory);
        self
    }
}

impl PluginRegistry for StaticRegistry {
    fn has_factory(&self, factory: &str) -> bool {
        self.factories.contains(factory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_known_covers_every_segment() {
        let registry = StaticRegistry::with_all_known();
        for kind in SegmentKind::ALL {
            assert!(registry.missing_factories(kind).is_empty(), "{} incomplete", kind);
        }
    }

    #[test]
    fn test_missing_factory_is_reported() {
        let registry = StaticRegistry::with_all_known().without("freeverb");
        assert_eq!(registry.missing_factories(SegmentKind::Reverb), vec!["freeverb"]);
        assert!(registry.missing_factories(SegmentKind::Limiter).is_empty());
    }

    #[test]
    fn test_shared_factories() {
        let registry = StaticRegistry::with_all_known().without(LEVEL_FACTORY);
        assert!(!registry.missing_factories(SegmentKind::Highpass).is_empty());
        // the analyzer has no level taps
        assert!(registry.missing_factories(SegmentKind::Spectrum).is_empty());
    }

    #[test]
    fn test_equalizer_needs_volume() {
        assert!(required_factories(SegmentKind::Equalizer).contains(&VOLUME_FACTORY));
        assert!(!required_factories(SegmentKind::Compressor).contains(&VOLUME_FACTORY));
    }
}
