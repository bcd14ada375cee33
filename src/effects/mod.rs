//! Effect segments and their plugins
//!
//! Each effect is an opaque plugin element wrapped with level meters into a
//! segment that the pipeline host can splice in and out.

pub mod autovolume;
pub mod equalizer;
pub mod kind;
pub mod plugins;
pub mod segment;

pub use autovolume::{Autovolume, AUTOVOLUME_MAX_GAIN, AUTOVOLUME_MIN_GAIN, AUTOVOLUME_STEP};
pub use equalizer::{
    band_properties, band_property, default_bands, gain_to_volume, EqBand, BAND_TYPE_PEAK,
    EQ_NUM_BANDS,
};
pub use kind::{ChainLayout, SegmentKind, Tap};
pub use plugins::{
    plugin_factory, required_factories, PluginRegistry, StaticRegistry, CAPS_FACTORY,
    LEVEL_FACTORY, SINK_FACTORY, SOURCE_FACTORY, VOLUME_FACTORY,
};
pub use segment::{
    seconds_to_ns, EffectSegment, ElementSpec, AUTOVOLUME_ELEMENT, EQ_INPUT_GAIN_ELEMENT,
    EQ_OUTPUT_GAIN_ELEMENT,
};
