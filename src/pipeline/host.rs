//! Pipeline host
//!
//! Owns one audio graph (source → effect segments → sink), keeps the spliced
//! segments in layout order as they are toggled, drives the state machine and
//! dispatches bus messages to the metering relay.
//!
//! Everything here runs on the thread that owns the host. Other threads only
//! reach it through the bus.

use log::{debug, error, info, warn};

use super::graph::{Graph, PropertyValue};
use super::policy::{plan_insertion, SplicePlan};
use super::state::{PipelineState, PipelineStateMachine};
use crate::bus::{Bus, BusMessage, BusSender, ElementPayload};
use crate::config::HostConfig;
use crate::effects::{
    band_property, gain_to_volume, plugin_factory, seconds_to_ns, Autovolume, ChainLayout,
    EffectSegment, ElementSpec, EqBand, PluginRegistry, SegmentKind, Tap, AUTOVOLUME_ELEMENT,
    CAPS_FACTORY, EQ_INPUT_GAIN_ELEMENT, EQ_NUM_BANDS, EQ_OUTPUT_GAIN_ELEMENT, SINK_FACTORY,
    SOURCE_FACTORY,
};
use crate::error::{PulseFxError, Result};
use crate::meter::{MeterRelay, MeterRoute, MeterSink, SpectrumAnalyzer};

/// Capture element feeding the chain
pub const AUDIO_SRC: &str = "audio_src";
/// Caps filter right after the capture element
pub const SOURCE_CAPS: &str = "source_caps";
/// Playback element at the end of the chain
pub const AUDIO_SINK: &str = "audio_sink";

/// Caps string pinning the stream format
pub fn source_caps(rate: u32) -> String {
    format!("audio/x-raw,format=F32LE,rate={},channels=2", rate)
}

/// Headless controller of one effects pipeline
pub struct PipelineHost<G: Graph> {
    graph: G,
    config: HostConfig,
    /// One entry per layout kind, in layout order
    segments: Vec<EffectSegment>,
    /// Requested on/off state, kept even when a plugin is missing
    enabled: Vec<SegmentKind>,
    machine: PipelineStateMachine,
    bus: Bus,
    relay: MeterRelay,
    analyzer: SpectrumAnalyzer,
    autovolume: Autovolume,
}

impl<G: Graph> PipelineHost<G> {
    /// Build the pipeline described by `config` on `graph`
    ///
    /// Every segment of the layout is created up front; the ones listed as
    /// enabled are spliced in. Segments whose plugins are missing stay out.
    pub fn new(graph: G, registry: &dyn PluginRegistry, config: HostConfig) -> Result<Self> {
        config.validate()?;

        let layout = config.layout;
        let segments: Vec<EffectSegment> = layout
            .order()
            .iter()
            .map(|kind| EffectSegment::build(*kind, registry, &config))
            .collect();

        let mut host = Self {
            graph,
            segments,
            enabled: Vec::new(),
            machine: PipelineStateMachine::new(layout.log_tag()),
            bus: Bus::new(),
            relay: MeterRelay::new(),
            analyzer: SpectrumAnalyzer::new(config.spectrum.clone(), config.rate),
            autovolume: Autovolume::new(config.autovolume.clone()),
            config,
        };

        host.add_endpoints()?;
        for segment in host.segments.iter().filter(|s| s.is_installed()) {
            host.graph.create_segment(segment)?;
        }

        let installed = host.segments.iter().filter(|s| s.is_installed()).count();
        info!(
            "{}pipeline built: {} of {} segments installed",
            host.log_tag(),
            installed,
            host.segments.len()
        );

        for kind in host.config.enabled.clone() {
            host.enable(kind)?;
        }

        Ok(host)
    }

    fn add_endpoints(&mut self) -> Result<()> {
        let mut src = ElementSpec::new(AUDIO_SRC, SOURCE_FACTORY)
            .with("volume", 1.0)
            .with("mute", false)
            .with("provide-clock", false)
            .with("slave-method", "re-timestamp")
            .with("buffer-time", self.config.buffer_time_us)
            .with("latency-time", self.config.latency_time_us);
        let caps = ElementSpec::new(SOURCE_CAPS, CAPS_FACTORY).with("caps", source_caps(self.config.rate));
        let mut sink = ElementSpec::new(AUDIO_SINK, SINK_FACTORY)
            .with("volume", 1.0)
            .with("mute", false)
            .with("buffer-time", self.config.buffer_time_us)
            .with("latency-time", self.config.latency_time_us);

        if let Some(device) = &self.config.source_device {
            src = src.with("device", device.as_str());
        }
        if let Some(device) = &self.config.sink_device {
            sink = sink.with("device", device.as_str());
        }

        self.graph.add_element(&src)?;
        self.graph.add_element(&caps)?;
        self.graph.add_element(&sink)
    }

    fn log_tag(&self) -> &'static str {
        self.config.layout.log_tag()
    }

    // ========================================================================
    // Segments
    // ========================================================================

    /// Segment of `kind`, if the layout carries it
    pub fn segment(&self, kind: SegmentKind) -> Result<&EffectSegment> {
        self.segments
            .iter()
            .find(|s| s.kind() == kind)
            .ok_or_else(|| PulseFxError::SegmentNotInLayout {
                segment: kind.to_string(),
                layout: self.config.layout.to_string(),
            })
    }

    /// Turn a segment on, splicing it after its closest spliced predecessor
    ///
    /// Returns `true` when the graph changed. Enabling a spliced segment, or
    /// one whose plugin is missing, leaves the graph alone.
    pub fn enable(&mut self, kind: SegmentKind) -> Result<bool> {
        let installed = self.segment(kind)?.is_installed();
        if !self.enabled.contains(&kind) {
            self.enabled.push(kind);
        }

        if !installed {
            warn!(
                "{}{} plugin is not installed, keeping it out of the pipeline",
                self.log_tag(),
                kind.display_name()
            );
            return Ok(false);
        }

        let bin = kind.bin_name();
        if self.graph.contains(&bin) {
            debug!("{}{} is already in the pipeline", self.log_tag(), kind);
            return Ok(false);
        }

        let graph = &self.graph;
        let plan = plan_insertion(self.config.layout, kind, |k| graph.contains(&k.bin_name()))?;
        match plan {
            SplicePlan::Prepend => self.graph.prepend(&bin)?,
            SplicePlan::InsertAfter(anchor) => self.graph.insert_after(&bin, &anchor.bin_name())?,
        }

        if kind == SegmentKind::Spectrum {
            self.graph
                .set_property(kind.name(), "post-messages", PropertyValue::Bool(true))?;
        }

        info!("{}{} enabled", self.log_tag(), kind);
        Ok(true)
    }

    /// Turn a segment off, unsplicing it
    ///
    /// Returns `true` when the graph changed.
    pub fn disable(&mut self, kind: SegmentKind) -> Result<bool> {
        self.segment(kind)?;
        self.enabled.retain(|k| *k != kind);

        let bin = kind.bin_name();
        if !self.graph.contains(&bin) {
            debug!("{}{} is not in the pipeline", self.log_tag(), kind);
            return Ok(false);
        }

        self.graph.remove(&bin)?;
        if kind == SegmentKind::Spectrum {
            self.graph
                .set_property(kind.name(), "post-messages", PropertyValue::Bool(false))?;
        }

        info!("{}{} disabled", self.log_tag(), kind);
        Ok(true)
    }

    pub fn set_enabled(&mut self, kind: SegmentKind, enabled: bool) -> Result<bool> {
        if enabled {
            self.enable(kind)
        } else {
            self.disable(kind)
        }
    }

    /// Check if `kind` was last switched on
    pub fn is_enabled(&self, kind: SegmentKind) -> bool {
        self.enabled.contains(&kind)
    }

    /// Check if `kind` is actually in the pipeline
    pub fn is_spliced(&self, kind: SegmentKind) -> bool {
        self.graph.contains(&kind.bin_name())
    }

    /// Spliced segments, upstream first
    pub fn spliced_order(&self) -> Vec<SegmentKind> {
        self.graph
            .spliced()
            .iter()
            .filter_map(|bin| SegmentKind::from_bin_name(bin))
            .collect()
    }

    /// Set a property on the plugin element of `kind`
    pub fn set_plugin_property(&mut self, kind: SegmentKind, property: &str, value: PropertyValue) -> Result<()> {
        self.require_installed(kind)?;
        let element = self.segment(kind)?.plugin_element_name();
        self.graph.set_property(element, property, value)
    }

    fn require_installed(&self, kind: SegmentKind) -> Result<()> {
        if self.segment(kind)?.is_installed() {
            Ok(())
        } else {
            Err(PulseFxError::PluginMissing {
                segment: kind.name().to_string(),
                factory: plugin_factory(kind).to_string(),
            })
        }
    }

    fn limiter_installed(&self) -> bool {
        self.segment(SegmentKind::Limiter)
            .map(|s| s.is_installed())
            .unwrap_or(false)
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Ask the graph for `state`
    ///
    /// Failures are logged and reported as `false`, never retried.
    pub fn set_state(&mut self, state: PipelineState) -> bool {
        let outcome = self.graph.set_state(state);
        self.machine.apply(state, outcome)
    }

    /// Last state successfully reached
    pub fn state(&self) -> PipelineState {
        self.machine.state()
    }

    pub fn is_playing(&self) -> bool {
        self.machine.is_playing()
    }

    // ========================================================================
    // Bus and metering
    // ========================================================================

    /// Handle for backends posting on this host's bus
    pub fn bus_sender(&self) -> BusSender {
        self.bus.sender()
    }

    /// Send meter updates to `sink`
    pub fn bind_meter(&mut self, sink: Box<dyn MeterSink>) {
        self.relay.bind(sink);
    }

    pub fn unbind_meter(&mut self) -> Option<Box<dyn MeterSink>> {
        self.relay.unbind()
    }

    /// Handle every message waiting on the bus
    ///
    /// Returns the number of messages handled.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Some(message) = self.bus.try_pop() {
            self.handle_message(message);
            handled += 1;
        }
        handled
    }

    pub fn handle_message(&mut self, message: BusMessage) {
        match message {
            BusMessage::Error { source, message } => {
                error!("{}{}: {}", self.log_tag(), source, message);
                self.set_state(PipelineState::Null);
            }
            BusMessage::Warning { source, message } => {
                warn!("{}{}: {}", self.log_tag(), source, message)
            }
            BusMessage::Info { source, message } => {
                info!("{}{}: {}", self.log_tag(), source, message)
            }
            BusMessage::Latency { source } => self.log_latency(&source),
            BusMessage::Element { source, payload } => self.handle_element(&source, payload),
        }
    }

    fn log_latency(&self, source: &str) {
        let (label, latency, buffer) = match source {
            AUDIO_SINK => ("pulsesink", "latency-time", "buffer-time"),
            AUDIO_SRC => ("pulsesrc", "actual-latency-time", "actual-buffer-time"),
            _ => return,
        };

        // actual-* values only exist once the device is open
        let read = |property: &str, fallback: &str| {
            self.graph
                .property(source, property)
                .or_else(|| self.graph.property(source, fallback))
                .map(|v| v.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        };

        info!("{}{} latency-time [us]: {}", self.log_tag(), label, read(latency, "latency-time"));
        info!("{}{} buffer-time [us]: {}", self.log_tag(), label, read(buffer, "buffer-time"));
    }

    fn handle_element(&mut self, source: &str, payload: ElementPayload) {
        let Some(route) = MeterRoute::parse(source) else {
            debug!("{}ignoring element message from {}", self.log_tag(), source);
            return;
        };

        match (route, payload) {
            (MeterRoute::Level(kind, tap), ElementPayload::Level { peak, .. }) => {
                self.relay.relay_level(kind, tap, &peak);
                if tap == Tap::Output {
                    self.relay_reduction(kind);
                }
            }
            (MeterRoute::Autovolume, ElementPayload::Level { peak, .. }) => self.auto_gain(&peak),
            (MeterRoute::Spectrum, ElementPayload::Spectrum { magnitudes }) => {
                if let Some(frame) = self.analyzer.process(&magnitudes) {
                    self.relay.relay_spectrum(&frame);
                }
            }
            (route, _) => debug!("{}unexpected payload for {:?}", self.log_tag(), route),
        }
    }

    fn relay_reduction(&mut self, kind: SegmentKind) {
        let property = match kind {
            SegmentKind::Limiter => "attenuation",
            SegmentKind::Compressor => "gain-reduction",
            _ => return,
        };
        let Some(value) = self
            .graph
            .property(kind.name(), property)
            .and_then(|v| v.as_f64())
        else {
            return;
        };

        match kind {
            SegmentKind::Limiter => self.relay.relay_attenuation(value),
            _ => self.relay.relay_gain_reduction(value),
        };
    }

    fn auto_gain(&mut self, peak: &[f64]) {
        let max_peak = peak.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !self.autovolume.should_track(max_peak) {
            return;
        }

        let limiter = SegmentKind::Limiter.name();
        let Some(current) = self
            .graph
            .property(limiter, "input-gain")
            .and_then(|v| v.as_f64())
        else {
            return;
        };

        if let Some(gain) = self.autovolume.next_gain(max_peak, current) {
            debug!("{}autovolume: input gain {} -> {}", self.log_tag(), current, gain);
            if let Err(e) = self.graph.set_property(limiter, "input-gain", PropertyValue::Double(gain)) {
                warn!("{}autovolume could not set the input gain: {}", self.log_tag(), e);
            }
        }
    }

    // ========================================================================
    // Source and sink
    // ========================================================================

    /// Set the buffer time (µs) on source and sink without restarting
    pub fn init_buffer_time(&mut self, value_us: i64) -> Result<()> {
        self.set_endpoint_property("buffer-time", PropertyValue::Int(value_us))?;
        self.config.buffer_time_us = value_us;
        Ok(())
    }

    /// Change the buffer time (µs), cycling the pipeline through Ready
    pub fn set_buffer_time(&mut self, value_us: i64) -> Result<()> {
        self.set_state(PipelineState::Ready);
        self.init_buffer_time(value_us)?;
        self.set_state(PipelineState::Playing);
        Ok(())
    }

    /// Set the latency time (µs) on source and sink without restarting
    pub fn init_latency_time(&mut self, value_us: i64) -> Result<()> {
        self.set_endpoint_property("latency-time", PropertyValue::Int(value_us))?;
        self.config.latency_time_us = value_us;
        Ok(())
    }

    /// Change the latency time (µs), cycling the pipeline through Ready
    pub fn set_latency_time(&mut self, value_us: i64) -> Result<()> {
        self.set_state(PipelineState::Ready);
        self.init_latency_time(value_us)?;
        self.set_state(PipelineState::Playing);
        Ok(())
    }

    fn set_endpoint_property(&mut self, property: &str, value: PropertyValue) -> Result<()> {
        self.graph.set_property(AUDIO_SRC, property, value.clone())?;
        self.graph.set_property(AUDIO_SINK, property, value)
    }

    /// Capture from `device`, typically a sink monitor
    pub fn set_source_monitor_name(&mut self, device: &str) -> Result<()> {
        self.graph.set_property(AUDIO_SRC, "device", device.into())?;
        self.config.source_device = Some(device.to_string());
        Ok(())
    }

    /// Play to `device`
    pub fn set_output_sink_name(&mut self, device: &str) -> Result<()> {
        self.graph.set_property(AUDIO_SINK, "device", device.into())?;
        self.config.sink_device = Some(device.to_string());
        Ok(())
    }

    /// Switch the stream sampling rate
    ///
    /// Updates the source caps and the spectrum band tables.
    pub fn set_rate(&mut self, rate: u32) -> Result<()> {
        if rate == 0 {
            return Err(PulseFxError::InvalidConfig {
                reason: "rate must be positive".to_string(),
            });
        }
        self.graph.set_property(SOURCE_CAPS, "caps", source_caps(rate).into())?;
        self.analyzer.set_rate(rate);
        self.config.rate = rate;
        Ok(())
    }

    /// Change how many points a spectrum frame has
    pub fn set_spectrum_n_points(&mut self, n_points: usize) -> Result<()> {
        if n_points < 2 {
            return Err(PulseFxError::InvalidConfig {
                reason: "spectrum axis needs at least two points".to_string(),
            });
        }
        self.analyzer.set_n_points(n_points);
        self.config.spectrum.n_points = n_points;
        Ok(())
    }

    pub fn spectrum(&self) -> &SpectrumAnalyzer {
        &self.analyzer
    }

    // ========================================================================
    // Autovolume
    // ========================================================================

    /// Switch autovolume, resetting the limiter to match
    ///
    /// Without the limiter plugin the flag is only recorded.
    pub fn set_autovolume_enabled(&mut self, enabled: bool) -> Result<()> {
        if !self.limiter_installed() {
            warn!(
                "{}limiter plugin is not installed, autovolume has no effect",
                self.log_tag()
            );
            self.autovolume.set_enabled(enabled);
            self.config.autovolume.enabled = enabled;
            return Ok(());
        }

        let mut controller = self.autovolume.clone();
        controller.set_enabled(enabled);
        let settings = controller.limiter_settings();
        let limiter = SegmentKind::Limiter.name();

        self.graph
            .set_property(AUTOVOLUME_ELEMENT, "post-messages", PropertyValue::Bool(enabled))?;
        self.graph
            .set_property(limiter, "input-gain", PropertyValue::Double(settings.input_gain))?;
        self.graph
            .set_property(limiter, "limit", PropertyValue::Double(settings.limit))?;
        self.graph
            .set_property(limiter, "release-time", PropertyValue::Double(settings.release_time))?;
        self.autovolume = controller;
        self.config.autovolume.enabled = enabled;
        self.config.limiter = settings;

        info!(
            "{}autovolume {}",
            self.log_tag(),
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    /// Change the measurement window (seconds)
    ///
    /// The limiter release time follows the window.
    pub fn set_autovolume_window(&mut self, window: f64) -> Result<()> {
        if window <= 0.0 {
            return Err(PulseFxError::InvalidConfig {
                reason: "autovolume window must be positive".to_string(),
            });
        }
        if self.limiter_installed() {
            self.graph.set_property(
                AUTOVOLUME_ELEMENT,
                "interval",
                PropertyValue::Int(seconds_to_ns(window)),
            )?;
            self.graph
                .set_property(SegmentKind::Limiter.name(), "release-time", PropertyValue::Double(window))?;
            self.config.limiter.release_time = window;
        }
        self.autovolume.set_window(window);
        self.config.autovolume.window = window;
        Ok(())
    }

    pub fn set_autovolume_target(&mut self, target: f64) -> Result<()> {
        self.autovolume.set_target(target);
        self.config.autovolume.target = target;
        self.sync_autovolume_limit()
    }

    pub fn set_autovolume_tolerance(&mut self, tolerance: f64) -> Result<()> {
        if tolerance < 0.0 {
            return Err(PulseFxError::InvalidConfig {
                reason: "autovolume tolerance must not be negative".to_string(),
            });
        }
        self.autovolume.set_tolerance(tolerance);
        self.config.autovolume.tolerance = tolerance;
        self.sync_autovolume_limit()
    }

    pub fn set_autovolume_threshold(&mut self, threshold: f64) {
        self.autovolume.set_threshold(threshold);
        self.config.autovolume.threshold = threshold;
    }

    fn sync_autovolume_limit(&mut self) -> Result<()> {
        if !self.autovolume.is_enabled() || !self.limiter_installed() {
            return Ok(());
        }
        let limit = self.autovolume.limit();
        self.graph
            .set_property(SegmentKind::Limiter.name(), "limit", PropertyValue::Double(limit))?;
        self.config.limiter.limit = limit;
        Ok(())
    }

    pub fn autovolume(&self) -> &Autovolume {
        &self.autovolume
    }

    // ========================================================================
    // Equalizer
    // ========================================================================

    /// Set the equalizer input or output gain in dB
    pub fn set_equalizer_gain(&mut self, tap: Tap, gain_db: f64) -> Result<()> {
        self.require_installed(SegmentKind::Equalizer)?;
        let element = match tap {
            Tap::Input => EQ_INPUT_GAIN_ELEMENT,
            Tap::Output => EQ_OUTPUT_GAIN_ELEMENT,
        };
        self.graph
            .set_property(element, "volume", PropertyValue::Double(gain_to_volume(gain_db)))?;
        match tap {
            Tap::Input => self.config.equalizer.input_gain = gain_db,
            Tap::Output => self.config.equalizer.output_gain = gain_db,
        }
        Ok(())
    }

    /// Retune one equalizer band
    pub fn set_equalizer_band(&mut self, index: usize, band: EqBand) -> Result<()> {
        if index >= EQ_NUM_BANDS {
            return Err(PulseFxError::InvalidConfig {
                reason: format!("equalizer band {} out of range", index),
            });
        }
        if band.freq <= 0.0 || band.q <= 0.0 {
            return Err(PulseFxError::InvalidConfig {
                reason: "equalizer band needs positive frequency and q".to_string(),
            });
        }
        self.require_installed(SegmentKind::Equalizer)?;

        let equalizer = SegmentKind::Equalizer.name();
        self.graph
            .set_property(equalizer, &band_property(index, "freq"), PropertyValue::Double(band.freq))?;
        self.graph.set_property(
            equalizer,
            &band_property(index, "bandwidth"),
            PropertyValue::Double(band.bandwidth()),
        )?;
        self.graph
            .set_property(equalizer, &band_property(index, "gain"), PropertyValue::Double(band.gain))?;
        self.config.equalizer.bands[index] = band;
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn layout(&self) -> ChainLayout {
        self.config.layout
    }

    /// Configuration reflecting every change made through the host
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut G {
        &mut self.graph
    }
}
