//! Metering: level decoding, spectrum display and the relay to views

pub mod level;
pub mod relay;
pub mod spectrum;

pub use level::{db_to_linear, ChannelLevel, LevelReading, LEVEL_FLOOR_DB};
pub use relay::{MeterEvent, MeterRelay, MeterRoute, MeterSink, RecordingSink};
pub use spectrum::{band_freqs, log_axis, CubicSpline, SpectrumAnalyzer};
