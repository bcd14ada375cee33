//! Pipeline message bus
//!
//! Streaming threads post messages, the main loop drains them. The channel is
//! bounded and posting never blocks: when the main loop falls behind, new
//! messages are dropped, which is what a live meter wants.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::debug;

/// Default number of messages the bus holds before dropping
pub const BUS_CAPACITY: usize = 1024;

/// Element-specific measurement payloads
#[derive(Debug, Clone, PartialEq)]
pub enum ElementPayload {
    /// Posted by `level` elements, one value per channel in dB
    Level { peak: Vec<f64>, rms: Vec<f64> },
    /// Posted by the spectrum analyzer, one magnitude per band in dB
    Spectrum { magnitudes: Vec<f32> },
}

/// A message posted on the pipeline bus
#[derive(Debug, Clone, PartialEq)]
pub enum BusMessage {
    Error { source: String, message: String },
    Warning { source: String, message: String },
    Info { source: String, message: String },
    /// The element's latency changed; values are read back from its properties
    Latency { source: String },
    Element { source: String, payload: ElementPayload },
}

impl BusMessage {
    /// Name of the element that posted the message
    pub fn source(&self) -> &str {
        match self {
            BusMessage::Error { source, .. }
            | BusMessage::Warning { source, .. }
            | BusMessage::Info { source, .. }
            | BusMessage::Latency { source }
            | BusMessage::Element { source, .. } => source,
        }
    }
}

/// Receiving end, owned by the pipeline host
#[derive(Debug)]
pub struct Bus {
    sender: Sender<BusMessage>,
    receiver: Receiver<BusMessage>,
}

impl Bus {
    /// Create a bus with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(BUS_CAPACITY)
    }

    /// Create a bus holding at most `capacity` pending messages
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self { sender, receiver }
    }

    /// A handle for posting messages from any thread
    pub fn sender(&self) -> BusSender {
        BusSender {
            sender: self.sender.clone(),
        }
    }

    /// Take the next pending message, if any
    pub fn try_pop(&self) -> Option<BusMessage> {
        self.receiver.try_recv().ok()
    }

    /// Number of messages waiting
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

/// Posting end of the bus
#[derive(Debug, Clone)]
pub struct BusSender {
    sender: Sender<BusMessage>,
}

impl BusSender {
    /// Post a message without blocking
    ///
    /// Returns `false` if the message was dropped.
    pub fn post(&self, message: BusMessage) -> bool {
        match self.sender.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(message)) => {
                debug!("bus full, dropping message from {}", message.source());
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(source: &str) -> BusMessage {
        BusMessage::Element {
            source: source.to_string(),
            payload: ElementPayload::Level {
                peak: vec![-6.0, -6.0],
                rms: vec![-9.0, -9.0],
            },
        }
    }

    #[test]
    fn test_messages_arrive_in_order() {
        let bus = Bus::new();
        let sender = bus.sender();
        assert!(sender.post(level("limiter_input_level")));
        assert!(sender.post(level("limiter_output_level")));

        assert_eq!(bus.pending(), 2);
        assert_eq!(bus.try_pop().unwrap().source(), "limiter_input_level");
        assert_eq!(bus.try_pop().unwrap().source(), "limiter_output_level");
        assert!(bus.try_pop().is_none());
    }

    #[test]
    fn test_overrun_drops_newest() {
        let bus = Bus::with_capacity(1);
        let sender = bus.sender();
        assert!(sender.post(level("first")));
        assert!(!sender.post(level("second")));

        assert_eq!(bus.try_pop().unwrap().source(), "first");
        assert!(bus.try_pop().is_none());
    }

    #[test]
    fn test_post_from_other_thread() {
        let bus = Bus::new();
        let sender = bus.sender();
        std::thread::spawn(move || {
            sender.post(BusMessage::Latency {
                source: "audio_sink".to_string(),
            });
        })
        .join()
        .unwrap();

        assert_eq!(
            bus.try_pop(),
            Some(BusMessage::Latency {
                source: "audio_sink".to_string()
            })
        );
    }
}
