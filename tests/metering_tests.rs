//! Metering Tests
//!
//! Measurements travel from meter elements over the bus to a bound sink.

use approx::assert_relative_eq;

use pulsefx::bus::BusMessage;
use pulsefx::config::HostConfig;
use pulsefx::effects::{SegmentKind, StaticRegistry, Tap};
use pulsefx::meter::{MeterEvent, RecordingSink};
use pulsefx::pipeline::{Graph, MemoryGraph, PipelineHost, PipelineState, PropertyValue};

fn metered_host(enabled: Vec<SegmentKind>) -> (PipelineHost<MemoryGraph>, RecordingSink) {
    let config = HostConfig {
        enabled,
        ..HostConfig::default()
    };
    let mut host = PipelineHost::new(MemoryGraph::new(), &StaticRegistry::with_all_known(), config).unwrap();
    let sender = host.bus_sender();
    host.graph_mut().attach_bus(sender);

    let sink = RecordingSink::new();
    host.bind_meter(Box::new(sink.clone()));
    (host, sink)
}

fn levels(events: &[MeterEvent]) -> Vec<(SegmentKind, Tap, i64, i64)> {
    events
        .iter()
        .filter_map(|e| match e {
            MeterEvent::Level { kind, tap, reading } => {
                Some((*kind, *tap, reading.left.label, reading.right.label))
            }
            _ => None,
        })
        .collect()
}

#[test]
fn test_every_tap_is_routed() {
    let kinds = vec![
        SegmentKind::Limiter,
        SegmentKind::Panorama,
        SegmentKind::Compressor,
        SegmentKind::Reverb,
        SegmentKind::Highpass,
        SegmentKind::Lowpass,
        SegmentKind::Equalizer,
    ];
    let (mut host, sink) = metered_host(kinds.clone());

    for kind in &kinds {
        assert!(host.graph().emit_level(&kind.input_level_name(), &[-10.0, -20.0]));
        assert!(host.graph().emit_level(&kind.output_level_name(), &[-11.0, -21.0]));
    }
    assert_eq!(host.dispatch_pending(), kinds.len() * 2);

    let got = levels(&sink.take());
    let want: Vec<_> = kinds
        .iter()
        .flat_map(|k| [(*k, Tap::Input, -10, -20), (*k, Tap::Output, -11, -21)])
        .collect();
    assert_eq!(got, want);
}

#[test]
fn test_floor_reading() {
    let (mut host, sink) = metered_host(vec![SegmentKind::Highpass]);
    host.graph().emit_level("highpass_output_level", &[-140.0, -99.0]);
    host.dispatch_pending();

    match sink.take().as_slice() {
        [MeterEvent::Level { reading, .. }] => {
            assert_eq!(reading.left.linear, 0.0);
            assert_eq!(reading.left.label, -99);
            assert_relative_eq!(reading.right.linear, 10f64.powf(-99.0 / 20.0));
        }
        other => panic!("unexpected events {:?}", other),
    }
}

#[test]
fn test_compressor_gain_reduction_deduplicated() {
    let (mut host, sink) = metered_host(vec![SegmentKind::Compressor]);

    for reduction in [0.4, 4.2, 3.8, 4.4, 6.0] {
        host.graph_mut()
            .set_property("compressor", "gain-reduction", PropertyValue::Double(reduction))
            .unwrap();
        host.graph().emit_level("compressor_output_level", &[-6.0, -6.0]);
        host.dispatch_pending();
    }

    let reductions: Vec<_> = sink
        .take()
        .into_iter()
        .filter_map(|e| match e {
            MeterEvent::GainReduction(db) => Some(db),
            _ => None,
        })
        .collect();
    assert_eq!(reductions, vec![4, 6]);
}

#[test]
fn test_compressor_reports_reduction_magnitude() {
    let (mut host, sink) = metered_host(vec![SegmentKind::Compressor]);
    host.graph_mut()
        .set_property("compressor", "gain-reduction", PropertyValue::Double(-6.3))
        .unwrap();
    host.graph().emit_level("compressor_output_level", &[-6.0, -6.0]);
    host.dispatch_pending();

    let reductions: Vec<_> = sink
        .take()
        .into_iter()
        .filter(|e| matches!(e, MeterEvent::GainReduction(_)))
        .collect();
    assert_eq!(reductions, vec![MeterEvent::GainReduction(6)]);
}

#[test]
fn test_input_tap_does_not_read_attenuation() {
    let (mut host, sink) = metered_host(vec![SegmentKind::Limiter]);
    host.graph_mut()
        .set_property("limiter", "attenuation", PropertyValue::Double(5.0))
        .unwrap();
    host.graph().emit_level("limiter_input_level", &[-6.0, -6.0]);
    host.dispatch_pending();

    assert!(!sink.take().iter().any(|e| matches!(e, MeterEvent::Attenuation(_))));
}

#[test]
fn test_spectrum_normalised_into_unit_range() {
    let (mut host, sink) = metered_host(vec![SegmentKind::Spectrum]);

    // a falling slope from -20 dB to -110 dB
    let magnitudes: Vec<f32> = (0..1600).map(|i| -20.0 - 90.0 * (i as f32 / 1600.0)).collect();
    host.graph().emit_spectrum("spectrum", &magnitudes);
    host.dispatch_pending();

    match sink.take().as_slice() {
        [MeterEvent::Spectrum(frame)] => {
            assert_eq!(frame.len(), 250);
            assert!(frame.iter().all(|v| (0.0..=1.0).contains(v)));
            assert!(frame.first() > frame.last());
        }
        other => panic!("unexpected events {:?}", other),
    }
}

#[test]
fn test_disabled_spectrum_posts_nothing() {
    let (mut host, sink) = metered_host(vec![]);
    assert!(!host.graph().emit_spectrum("spectrum", &[-10.0; 1600]));
    assert_eq!(host.dispatch_pending(), 0);
    assert!(sink.is_empty());
}

#[test]
fn test_unbound_meter_discards() {
    let (mut host, sink) = metered_host(vec![SegmentKind::Reverb]);
    assert!(host.unbind_meter().is_some());

    host.graph().emit_level("reverb_input_level", &[-6.0, -6.0]);
    assert_eq!(host.dispatch_pending(), 1);
    assert!(sink.is_empty());
}

#[test]
fn test_autovolume_walks_gain_down_to_floor() {
    let (mut host, _sink) = metered_host(vec![SegmentKind::Limiter]);
    host.set_autovolume_enabled(true).unwrap();

    for _ in 0..15 {
        host.graph().emit_level("autovolume", &[-1.0, -2.0]);
        host.dispatch_pending();
    }
    assert_eq!(
        host.graph().property("limiter", "input-gain"),
        Some(PropertyValue::Double(-20.0))
    );
}

#[test]
fn test_autovolume_ignores_quiet_input() {
    let (mut host, _sink) = metered_host(vec![SegmentKind::Limiter]);
    host.set_autovolume_enabled(true).unwrap();

    host.graph().emit_level("autovolume", &[-70.0, -80.0]);
    host.dispatch_pending();
    assert_eq!(
        host.graph().property("limiter", "input-gain"),
        Some(PropertyValue::Double(-10.0))
    );
}

#[test]
fn test_warnings_and_latency_keep_state() {
    let (mut host, _sink) = metered_host(vec![]);
    host.set_state(PipelineState::Playing);

    let sender = host.bus_sender();
    assert!(sender.post(BusMessage::Warning {
        source: "audio_sink".to_string(),
        message: "underrun".to_string(),
    }));
    assert!(sender.post(BusMessage::Latency {
        source: "audio_src".to_string(),
    }));
    assert!(sender.post(BusMessage::Latency {
        source: "audio_sink".to_string(),
    }));
    assert_eq!(host.dispatch_pending(), 3);
    assert!(host.is_playing());
}

#[test]
fn test_bus_posts_from_other_threads() {
    let (mut host, sink) = metered_host(vec![SegmentKind::Reverb]);
    let sender = host.bus_sender();

    let producer = std::thread::spawn(move || {
        for _ in 0..10 {
            sender.post(BusMessage::Element {
                source: "reverb_output_level".to_string(),
                payload: pulsefx::bus::ElementPayload::Level {
                    peak: vec![-3.0, -3.0],
                    rms: vec![-6.0, -6.0],
                },
            });
        }
    });
    producer.join().unwrap();

    assert_eq!(host.dispatch_pending(), 10);
    assert_eq!(sink.len(), 10);
}
