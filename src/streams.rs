//! Sound-server stream tracking
//!
//! The sound-server client runs on its own thread and reports application
//! streams as [`StreamEvent`]s. The main loop drains them with
//! [`StreamTracker::pump`], which keeps the stream list and starts or parks the
//! pipeline as streams come and go.

use std::collections::BTreeMap;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::HostConfig;
use crate::error::{PulseFxError, Result};
use crate::pipeline::{Graph, PipelineHost, PipelineState};

/// Default capacity of the stream event channel
pub const STREAM_CHANNEL_CAPACITY: usize = 256;

/// One application stream as seen by the sound server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppInfo {
    pub index: u32,
    pub name: String,
    pub icon: String,
    pub channels: u8,
    /// Highest channel volume, linear
    pub volume: f64,
    /// Sampling rate in Hz
    pub rate: u32,
    pub resampler: String,
    pub format: String,
    pub mute: bool,
    /// Routed through the effects
    pub connected: bool,
    /// Buffer latency in microseconds
    pub buffer_latency_us: f64,
    /// Stream latency in microseconds
    pub latency_us: f64,
    pub corked: bool,
}

impl AppInfo {
    /// Rate for display, e.g. `48.0 kHz`
    pub fn rate_label(&self) -> String {
        format!("{:.1} kHz", self.rate as f64 / 1000.0)
    }

    pub fn buffer_label(&self) -> String {
        format!("{:.1} ms", self.buffer_latency_us / 1000.0)
    }

    pub fn latency_label(&self) -> String {
        format!("{:.1} ms", self.latency_us / 1000.0)
    }

    pub fn state_label(&self) -> &'static str {
        if self.corked {
            "paused"
        } else {
            "playing"
        }
    }
}

/// What the sound-server client reports
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Added(AppInfo),
    Changed(AppInfo),
    Removed(u32),
}

/// Producer side, owned by the sound-server client thread
#[derive(Debug, Clone)]
pub struct StreamSender {
    tx: Sender<StreamEvent>,
}

impl StreamSender {
    /// Queue an event without blocking
    ///
    /// Returns `Ok(false)` when the channel is full and the event was dropped.
    pub fn send(&self, event: StreamEvent) -> Result<bool> {
        match self.tx.try_send(event) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(event)) => {
                debug!("stream channel full, dropping {:?}", event);
                Ok(false)
            }
            Err(TrySendError::Disconnected(_)) => Err(PulseFxError::ChannelDisconnected {
                channel: "streams".to_string(),
            }),
        }
    }
}

/// Create a stream channel and the tracker draining it
pub fn stream_channel(capacity: usize, switch_on_all_apps: bool) -> (StreamSender, StreamTracker) {
    let (tx, rx) = bounded(capacity);
    (
        StreamSender { tx },
        StreamTracker {
            rx,
            apps: BTreeMap::new(),
            switch_on_all_apps,
        },
    )
}

/// Stream channel following the host configuration
pub fn stream_channel_for(config: &HostConfig) -> (StreamSender, StreamTracker) {
    stream_channel(STREAM_CHANNEL_CAPACITY, config.switch_on_all_apps)
}

/// Consumer side, owned by the main loop
#[derive(Debug)]
pub struct StreamTracker {
    rx: Receiver<StreamEvent>,
    apps: BTreeMap<u32, AppInfo>,
    switch_on_all_apps: bool,
}

impl StreamTracker {
    /// Apply every queued event to `host`
    ///
    /// Returns the number of events handled.
    pub fn pump<G: Graph>(&mut self, host: &mut PipelineHost<G>) -> usize {
        let mut handled = 0;
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    self.apply(event, host);
                    handled += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("stream producer gone");
                    break;
                }
            }
        }
        handled
    }

    /// Apply one event
    pub fn apply<G: Graph>(&mut self, event: StreamEvent, host: &mut PipelineHost<G>) {
        match event {
            StreamEvent::Added(mut app) => {
                if self.switch_on_all_apps {
                    app.connected = true;
                }
                info!("{}added stream {}: {}", host.layout().log_tag(), app.index, app.name);
                self.apps.insert(app.index, app);

                if !host.is_playing() {
                    host.set_state(PipelineState::Playing);
                }
            }
            StreamEvent::Changed(app) => match self.apps.get_mut(&app.index) {
                Some(tracked) => *tracked = app,
                None => debug!("change for unknown stream {}", app.index),
            },
            StreamEvent::Removed(index) => {
                let before = self.apps.len();
                if self.apps.remove(&index).is_some() {
                    info!("{}removed stream {}", host.layout().log_tag(), index);
                }
                if before == 1 && self.apps.is_empty() {
                    host.set_state(PipelineState::Ready);
                }
            }
        }
    }

    /// Tracked streams, by index
    pub fn apps(&self) -> impl Iterator<Item = &AppInfo> {
        self.apps.values()
    }

    pub fn get(&self, index: u32) -> Option<&AppInfo> {
        self.apps.get(&index)
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}
