//! CLI Command Implementations
//!
//! Every command runs against the in-memory graph and the static plugin
//! registry.

use std::path::Path;

use log::info;

use super::Toggle;
use crate::config::{HostConfig, SpectrumConfig};
use crate::effects::{ChainLayout, PluginRegistry, SegmentKind, StaticRegistry, Tap};
use crate::error::{PulseFxError, Result};
use crate::meter::{LevelReading, MeterSink, SpectrumAnalyzer};
use crate::pipeline::{Graph, MemoryGraph, PipelineHost, AUDIO_SINK, AUDIO_SRC, SOURCE_CAPS};

/// Registry knowing every factory except `missing`
pub fn registry_without(missing: &[String]) -> StaticRegistry {
    missing
        .iter()
        .fold(StaticRegistry::with_all_known(), |registry, factory| registry.without(factory))
}

/// Element chain from source to sink, bins standing for their segments
pub fn chain_description<G: Graph>(host: &PipelineHost<G>) -> Vec<String> {
    let mut chain = vec![AUDIO_SRC.to_string(), SOURCE_CAPS.to_string()];
    chain.extend(host.graph().spliced());
    chain.push(AUDIO_SINK.to_string());
    chain
}

/// Build a host from `config`, apply `toggles` and return it
pub fn build_chain(
    config: Option<&Path>,
    layout: Option<ChainLayout>,
    missing: &[String],
    toggles: &[Toggle],
) -> Result<PipelineHost<MemoryGraph>> {
    let mut config = match config {
        Some(path) => {
            info!("Loading configuration: {}", path.display());
            HostConfig::load(path)?
        }
        None => HostConfig::default(),
    };
    if let Some(layout) = layout {
        config.layout = layout;
        config.enabled.retain(|k| layout.contains(*k));
    }

    let registry = registry_without(missing);
    let mut host = PipelineHost::new(MemoryGraph::new(), &registry, config)?;
    for toggle in toggles {
        host.set_enabled(toggle.kind, toggle.enable)?;
    }
    Ok(host)
}

/// Print the chain resulting from a configuration and a toggle script.
pub fn chain(
    config: Option<&Path>,
    layout: Option<ChainLayout>,
    missing: &[String],
    toggles: &[Toggle],
    json: bool,
) -> Result<()> {
    let host = build_chain(config, layout, missing, toggles)?;
    let chain = chain_description(&host);

    if json {
        let value = serde_json::json!({
            "layout": host.layout(),
            "chain": chain,
            "enabled": host.config().enabled,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Layout: {}", host.layout());
    println!("{}", chain.join(" -> "));

    let skipped: Vec<String> = host
        .layout()
        .order()
        .iter()
        .filter(|k| host.is_enabled(**k) && !host.is_spliced(**k))
        .map(|k| k.to_string())
        .collect();
    if !skipped.is_empty() {
        println!("Enabled but not installed: {}", skipped.join(", "));
    }

    Ok(())
}

/// Print the band count and the display axis.
pub fn spectrum_axis(rate: u32, points: usize, bands: usize) -> Result<()> {
    if rate == 0 || bands == 0 {
        return Err(PulseFxError::InvalidConfig {
            reason: "rate and band count must be positive".to_string(),
        });
    }

    let config = SpectrumConfig {
        n_bands: bands,
        n_points: points,
        ..SpectrumConfig::default()
    };
    let max_freq = config.max_freq;
    let analyzer = SpectrumAnalyzer::new(config, rate);

    println!(
        "{} of {} bands below {} Hz at {} Hz",
        analyzer.n_freqs(),
        bands,
        max_freq,
        rate
    );
    println!("{:-<40}", "");
    for (i, freq) in analyzer.axis().iter().enumerate() {
        println!("{:>4}  {:>10.1} Hz", i, freq);
    }

    Ok(())
}

/// Report plugin availability per segment.
pub fn plugins(missing: &[String], layout: ChainLayout) -> Result<()> {
    let registry = registry_without(missing);

    println!("Plugins for {}:", layout);
    println!("{:-<60}", "");
    for kind in layout.order() {
        let absent = registry.missing_factories(*kind);
        if absent.is_empty() {
            println!("  {:<12} ok", kind.display_name());
        } else {
            println!("  {:<12} missing {}", kind.display_name(), absent.join(", "));
        }
    }

    Ok(())
}

/// Prints meter updates as they arrive
struct PrintSink;

impl MeterSink for PrintSink {
    fn level(&mut self, kind: SegmentKind, tap: Tap, reading: &LevelReading) {
        println!(
            "{} {}: L {:>4} dB ({:.4})  R {:>4} dB ({:.4})",
            kind, tap, reading.left.label, reading.left.linear, reading.right.label, reading.right.linear
        );
    }

    fn attenuation(&mut self, db: i64) {
        println!("attenuation: {} dB", db);
    }

    fn gain_reduction(&mut self, db: i64) {
        println!("gain reduction: {} dB", db);
    }

    fn spectrum(&mut self, frame: &[f64]) {
        println!("spectrum: {} points", frame.len());
    }
}

/// Push peak pairs through a segment meter and the relay.
pub fn meter(segment: SegmentKind, tap: Tap, peaks: &[f64]) -> Result<()> {
    if !segment.has_level_taps() {
        return Err(PulseFxError::InvalidConfig {
            reason: format!("{} has no level meters", segment),
        });
    }

    let config = HostConfig {
        enabled: vec![segment],
        ..HostConfig::default()
    };
    let mut host = PipelineHost::new(MemoryGraph::new(), &StaticRegistry::with_all_known(), config)?;
    let sender = host.bus_sender();
    host.graph_mut().attach_bus(sender);
    host.bind_meter(Box::new(PrintSink));

    let element = match tap {
        Tap::Input => segment.input_level_name(),
        Tap::Output => segment.output_level_name(),
    };
    for pair in peaks.chunks(2) {
        host.graph().emit_level(&element, pair);
        host.dispatch_pending();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn toggles(script: &str) -> Vec<Toggle> {
        script.split(',').map(|t| t.parse().unwrap()).collect()
    }

    #[test]
    fn test_build_chain_applies_toggles() {
        let host = build_chain(None, None, &[], &toggles("+eq,+limiter,-spectrum,+reverb")).unwrap();
        assert_eq!(
            chain_description(&host),
            vec![
                "audio_src",
                "source_caps",
                "limiter_bin",
                "reverb_bin",
                "equalizer_bin",
                "audio_sink"
            ]
        );
    }

    #[test]
    fn test_build_chain_with_missing_plugin() {
        let missing = vec!["freeverb".to_string()];
        let host = build_chain(None, None, &missing, &toggles("+reverb")).unwrap();
        assert!(host.is_enabled(SegmentKind::Reverb));
        assert!(!host.is_spliced(SegmentKind::Reverb));
    }

    #[test]
    fn test_layout_override_drops_foreign_segments() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "enabled": ["panorama", "compressor"] }}"#).unwrap();

        let host = build_chain(Some(file.path()), Some(ChainLayout::SourceOutputs), &[], &[]).unwrap();
        assert_eq!(host.spliced_order(), vec![SegmentKind::Compressor]);
    }

    #[test]
    fn test_meter_rejects_spectrum() {
        assert!(meter(SegmentKind::Spectrum, Tap::Input, &[-3.0]).is_err());
        assert!(meter(SegmentKind::Reverb, Tap::Output, &[-3.0, -4.0, -200.0]).is_ok());
    }

    #[test]
    fn test_spectrum_axis_rejects_zero_rate() {
        assert!(spectrum_axis(0, 10, 1600).is_err());
    }
}
