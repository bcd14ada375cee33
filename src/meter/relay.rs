//! Metering relay
//!
//! Decoded measurements go to whichever [`MeterSink`] is bound. Nothing is
//! buffered: with no sink bound, values are dropped.

use std::cell::RefCell;
use std::rc::Rc;

use super::level::LevelReading;
use crate::effects::{SegmentKind, Tap, AUTOVOLUME_ELEMENT};

/// What a bus message source name refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterRoute {
    /// A segment's input or output level meter
    Level(SegmentKind, Tap),
    /// The limiter's autovolume meter
    Autovolume,
    /// The spectrum analyzer
    Spectrum,
}

impl MeterRoute {
    /// Route for a message posted by `source`
    pub fn parse(source: &str) -> Option<Self> {
        if source == AUTOVOLUME_ELEMENT {
            return Some(MeterRoute::Autovolume);
        }
        if source == SegmentKind::Spectrum.name() {
            return Some(MeterRoute::Spectrum);
        }

        let (name, tap) = if let Some(name) = source.strip_suffix("_input_level") {
            (name, Tap::Input)
        } else if let Some(name) = source.strip_suffix("_output_level") {
            (name, Tap::Output)
        } else {
            return None;
        };

        SegmentKind::ALL
            .iter()
            .copied()
            .find(|k| k.has_level_taps() && k.name() == name)
            .map(|kind| MeterRoute::Level(kind, tap))
    }
}

/// Receiver of meter updates, typically a view
pub trait MeterSink {
    fn level(&mut self, kind: SegmentKind, tap: Tap, reading: &LevelReading);

    /// Limiter attenuation in whole dB
    fn attenuation(&mut self, db: i64);

    /// Compressor gain reduction in whole dB
    fn gain_reduction(&mut self, db: i64);

    /// Normalised spectrum frame
    fn spectrum(&mut self, frame: &[f64]);
}

/// Forwards measurements to the bound sink
#[derive(Default)]
pub struct MeterRelay {
    sink: Option<Box<dyn MeterSink>>,
    last_attenuation: i64,
    last_gain_reduction: i64,
}

impl MeterRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `sink`, replacing any previous one
    pub fn bind(&mut self, sink: Box<dyn MeterSink>) {
        self.sink = Some(sink);
        self.last_attenuation = 0;
        self.last_gain_reduction = 0;
    }

    /// Unbind and return the current sink
    pub fn unbind(&mut self) -> Option<Box<dyn MeterSink>> {
        self.sink.take()
    }

    pub fn is_bound(&self) -> bool {
        self.sink.is_some()
    }

    /// Decode a peak list and forward it
    pub fn relay_level(&mut self, kind: SegmentKind, tap: Tap, peak: &[f64]) -> Option<LevelReading> {
        let reading = LevelReading::from_peak(peak)?;
        if let Some(sink) = self.sink.as_mut() {
            sink.level(kind, tap, &reading);
        }
        Some(reading)
    }

    /// Forward the limiter attenuation if its rounded value changed
    pub fn relay_attenuation(&mut self, db: f64) -> bool {
        let rounded = db.round() as i64;
        match self.sink.as_mut() {
            Some(sink) if rounded != self.last_attenuation => {
                self.last_attenuation = rounded;
                sink.attenuation(rounded);
                true
            }
            _ => false,
        }
    }

    /// Forward the compressor gain reduction if its rounded value changed
    ///
    /// The compressor reports reduction as a negative level; views get its magnitude.
    pub fn relay_gain_reduction(&mut self, db: f64) -> bool {
        let rounded = db.round().abs() as i64;
        match self.sink.as_mut() {
            Some(sink) if rounded != self.last_gain_reduction => {
                self.last_gain_reduction = rounded;
                sink.gain_reduction(rounded);
                true
            }
            _ => false,
        }
    }

    pub fn relay_spectrum(&mut self, frame: &[f64]) -> bool {
        match self.sink.as_mut() {
            Some(sink) => {
                sink.spectrum(frame);
                true
            }
            None => false,
        }
    }
}

/// A meter update, as recorded by [`RecordingSink`]
#[derive(Debug, Clone, PartialEq)]
pub enum MeterEvent {
    Level {
        kind: SegmentKind,
        tap: Tap,
        reading: LevelReading,
    },
    Attenuation(i64),
    GainReduction(i64),
    Spectrum(Vec<f64>),
}

/// Sink that keeps every update in a shared list
///
/// Clones share the list, so a handle kept outside the relay sees what the
/// bound copy received.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Rc<RefCell<Vec<MeterEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything recorded so far
    pub fn take(&self) -> Vec<MeterEvent> {
        self.events.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

impl MeterSink for RecordingSink {
    fn level(&mut self, kind: SegmentKind, tap: Tap, reading: &LevelReading) {
        self.events.borrow_mut().push(MeterEvent::Level {
            kind,
            tap,
            reading: *reading,
        });
    }

    fn attenuation(&mut self, db: i64) {
        self.events.borrow_mut().push(MeterEvent::Attenuation(db));
    }

    fn gain_reduction(&mut self, db: i64) {
        self.events.borrow_mut().push(MeterEvent::GainReduction(db));
    }

    fn spectrum(&mut self, frame: &[f64]) {
        self.events.borrow_mut().push(MeterEvent::Spectrum(frame.to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_parsing() {
        assert_eq!(
            MeterRoute::parse("limiter_input_level"),
            Some(MeterRoute::Level(SegmentKind::Limiter, Tap::Input))
        );
        assert_eq!(
            MeterRoute::parse("equalizer_output_level"),
            Some(MeterRoute::Level(SegmentKind::Equalizer, Tap::Output))
        );
        assert_eq!(MeterRoute::parse("autovolume"), Some(MeterRoute::Autovolume));
        assert_eq!(MeterRoute::parse("spectrum"), Some(MeterRoute::Spectrum));
        assert_eq!(MeterRoute::parse("spectrum_input_level"), None);
        assert_eq!(MeterRoute::parse("flanger_input_level"), None);
        assert_eq!(MeterRoute::parse("audio_sink"), None);
    }

    #[test]
    fn test_unbound_relay_discards() {
        let mut relay = MeterRelay::new();
        assert!(relay.relay_level(SegmentKind::Reverb, Tap::Input, &[-3.0, -3.0]).is_some());
        assert!(!relay.relay_attenuation(-4.0));
        assert!(!relay.relay_spectrum(&[0.5]));
    }

    #[test]
    fn test_level_forwarded() {
        let sink = RecordingSink::new();
        let mut relay = MeterRelay::new();
        relay.bind(Box::new(sink.clone()));

        relay.relay_level(SegmentKind::Compressor, Tap::Output, &[-6.0, -200.0]);
        let events = sink.take();
        assert_eq!(events.len(), 1);
        match &events[0] {
            MeterEvent::Level { kind, tap, reading } => {
                assert_eq!(*kind, SegmentKind::Compressor);
                assert_eq!(*tap, Tap::Output);
                assert_eq!(reading.left.label, -6);
                assert_eq!(reading.right.label, -99);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_attenuation_only_on_change() {
        let sink = RecordingSink::new();
        let mut relay = MeterRelay::new();
        relay.bind(Box::new(sink.clone()));

        assert!(!relay.relay_attenuation(0.2));
        assert!(relay.relay_attenuation(3.4));
        assert!(!relay.relay_attenuation(2.6));
        assert!(relay.relay_attenuation(5.0));
        assert_eq!(sink.take(), vec![MeterEvent::Attenuation(3), MeterEvent::Attenuation(5)]);
    }

    #[test]
    fn test_gain_reduction_tracked_separately() {
        let sink = RecordingSink::new();
        let mut relay = MeterRelay::new();
        relay.bind(Box::new(sink.clone()));

        assert!(relay.relay_attenuation(2.0));
        assert!(relay.relay_gain_reduction(2.0));
        assert!(!relay.relay_gain_reduction(2.0));
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_gain_reduction_forwarded_as_magnitude() {
        let sink = RecordingSink::new();
        let mut relay = MeterRelay::new();
        relay.bind(Box::new(sink.clone()));

        assert!(relay.relay_gain_reduction(-6.3));
        assert!(!relay.relay_gain_reduction(6.2));
        assert_eq!(sink.take(), vec![MeterEvent::GainReduction(6)]);
    }

    #[test]
    fn test_unbind_returns_sink() {
        let mut relay = MeterRelay::new();
        relay.bind(Box::new(RecordingSink::new()));
        assert!(relay.is_bound());
        assert!(relay.unbind().is_some());
        assert!(!relay.is_bound());
    }
}
