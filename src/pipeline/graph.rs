//! Graph backend abstraction
//!
//! The host never touches the multimedia framework directly. It creates
//! elements and segment bins through [`Graph`], splices bins by name and reads
//! or writes element properties. [`MemoryGraph`] is a headless backend that
//! keeps the same bookkeeping in memory.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::bus::{BusMessage, BusSender, ElementPayload};
use crate::effects::{EffectSegment, ElementSpec};
use crate::error::{PulseFxError, Result};
use crate::pipeline::state::{PipelineState, StateChangeReturn};

/// Value of an element property
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
}

impl PropertyValue {
    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Int(v) => Some(*v as f64),
            PropertyValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{}", v),
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::Double(v) => write!(f, "{}", v),
            PropertyValue::Str(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        PropertyValue::Int(v as i64)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Double(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Str(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Str(v)
    }
}

/// Operations the host needs from a pipeline backend
///
/// Segment bins live inside an effects bin between the fixed source and sink
/// elements. Splicing only changes where a bin sits in that chain; the
/// elements themselves exist from `create_segment` on.
pub trait Graph {
    /// Create a standalone element (source, caps filter, sink)
    fn add_element(&mut self, element: &ElementSpec) -> Result<()>;

    /// Create a segment bin and its elements without splicing it
    fn create_segment(&mut self, segment: &EffectSegment) -> Result<()>;

    /// Splice `bin` at the head of the effects chain
    fn prepend(&mut self, bin: &str) -> Result<()>;

    /// Splice `bin` right after the already spliced `anchor`
    fn insert_after(&mut self, bin: &str, anchor: &str) -> Result<()>;

    /// Unsplice `bin`, relinking its neighbours
    fn remove(&mut self, bin: &str) -> Result<()>;

    /// Check if `bin` is currently spliced
    fn contains(&self, bin: &str) -> bool;

    /// Spliced bin names, upstream first
    fn spliced(&self) -> Vec<String>;

    fn set_property(&mut self, element: &str, property: &str, value: PropertyValue) -> Result<()>;

    fn property(&self, element: &str, property: &str) -> Option<PropertyValue>;

    /// Ask the pipeline to move to `state`
    fn set_state(&mut self, state: PipelineState) -> StateChangeReturn;
}

#[derive(Debug, Clone)]
struct ElementRecord {
    factory: String,
    /// Owning bin, `None` for standalone elements
    bin: Option<String>,
    properties: HashMap<String, PropertyValue>,
}

/// In-memory graph backend
///
/// Keeps elements, bins and the spliced order. Level and spectrum elements can
/// be made to post measurements on an attached bus, honouring their
/// `post-messages` property and whether their bin is spliced.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    state: PipelineState,
    elements: HashMap<String, ElementRecord>,
    bins: HashMap<String, Vec<String>>,
    spliced: Vec<String>,
    failing: HashSet<PipelineState>,
    bus: Option<BusSender>,
}

impl MemoryGraph {
    /// Create an empty graph in the Null state
    pub fn new() -> Self {
        Self::default()
    }

    /// Post element measurements on `bus`
    pub fn attach_bus(&mut self, bus: BusSender) {
        self.bus = Some(bus);
    }

    /// Make every transition to `state` fail
    pub fn fail_transitions_to(&mut self, state: PipelineState) {
        self.failing.insert(state);
    }

    /// Stop simulating failures
    pub fn clear_failures(&mut self) {
        self.failing.clear();
    }

    /// State the backend is currently in
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Check if an element (or bin) exists
    pub fn has_element(&self, name: &str) -> bool {
        self.elements.contains_key(name) || self.bins.contains_key(name)
    }

    /// Elements of a bin, in link order
    pub fn bin_elements(&self, bin: &str) -> Option<&[String]> {
        self.bins.get(bin).map(|v| v.as_slice())
    }

    /// Have a `level` element post a peak measurement
    ///
    /// Returns `false` when nothing was posted: no bus, unknown or muted
    /// element, or its bin is not spliced.
    pub fn emit_level(&self, element: &str, peak: &[f64]) -> bool {
        if !self.is_posting(element, "level") {
            return false;
        }
        self.post(BusMessage::Element {
            source: element.to_string(),
            payload: ElementPayload::Level {
                peak: peak.to_vec(),
                rms: peak.to_vec(),
            },
        })
    }

    /// Have the `spectrum` element post band magnitudes
    pub fn emit_spectrum(&self, element: &str, magnitudes: &[f32]) -> bool {
        if !self.is_posting(element, "spectrum") {
            return false;
        }
        self.post(BusMessage::Element {
            source: element.to_string(),
            payload: ElementPayload::Spectrum {
                magnitudes: magnitudes.to_vec(),
            },
        })
    }

    /// Post an arbitrary message on the attached bus
    pub fn post(&self, message: BusMessage) -> bool {
        match &self.bus {
            Some(bus) => bus.post(message),
            None => false,
        }
    }

    fn is_posting(&self, element: &str, factory: &str) -> bool {
        let Some(record) = self.elements.get(element) else {
            return false;
        };
        if record.factory != factory {
            return false;
        }
        let live = match &record.bin {
            Some(bin) => self.contains(bin),
            None => true,
        };
        let posting = record
            .properties
            .get("post-messages")
            .and_then(PropertyValue::as_bool)
            .unwrap_or(true);
        live && posting
    }

    fn insert_record(&mut self, element: &ElementSpec, bin: Option<&str>) -> Result<()> {
        if self.has_element(&element.name) {
            return Err(PulseFxError::SpliceFailed {
                segment: element.name.clone(),
                reason: "an element with this name already exists".to_string(),
            });
        }
        let properties = element
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.elements.insert(
            element.name.clone(),
            ElementRecord {
                factory: element.factory.clone(),
                bin: bin.map(str::to_string),
                properties,
            },
        );
        Ok(())
    }

    fn check_splice(&self, bin: &str) -> Result<()> {
        if !self.bins.contains_key(bin) {
            return Err(PulseFxError::ElementNotFound {
                element: bin.to_string(),
            });
        }
        if self.contains(bin) {
            return Err(PulseFxError::SpliceFailed {
                segment: bin.to_string(),
                reason: "already spliced".to_string(),
            });
        }
        Ok(())
    }
}

impl Graph for MemoryGraph {
    fn add_element(&mut self, element: &ElementSpec) -> Result<()> {
        self.insert_record(element, None)
    }

    fn create_segment(&mut self, segment: &EffectSegment) -> Result<()> {
        let bin = segment.bin_name();
        if self.has_element(&bin) {
            return Err(PulseFxError::SpliceFailed {
                segment: bin,
                reason: "bin already exists".to_string(),
            });
        }
        for element in segment.elements() {
            self.insert_record(element, Some(&bin))?;
        }
        let names = segment.elements().iter().map(|e| e.name.clone()).collect();
        self.bins.insert(bin, names);
        Ok(())
    }

    fn prepend(&mut self, bin: &str) -> Result<()> {
        self.check_splice(bin)?;
        self.spliced.insert(0, bin.to_string());
        Ok(())
    }

    fn insert_after(&mut self, bin: &str, anchor: &str) -> Result<()> {
        self.check_splice(bin)?;
        let index = self
            .spliced
            .iter()
            .position(|b| b == anchor)
            .ok_or_else(|| PulseFxError::AnchorNotSpliced {
                anchor: anchor.to_string(),
            })?;
        self.spliced.insert(index + 1, bin.to_string());
        Ok(())
    }

    fn remove(&mut self, bin: &str) -> Result<()> {
        let index = self
            .spliced
            .iter()
            .position(|b| b == bin)
            .ok_or_else(|| PulseFxError::SpliceFailed {
                segment: bin.to_string(),
                reason: "not spliced".to_string(),
            })?;
        self.spliced.remove(index);
        Ok(())
    }

    fn contains(&self, bin: &str) -> bool {
        self.spliced.iter().any(|b| b == bin)
    }

    fn spliced(&self) -> Vec<String> {
        self.spliced.clone()
    }

    fn set_property(&mut self, element: &str, property: &str, value: PropertyValue) -> Result<()> {
        let record = self
            .elements
            .get_mut(element)
            .ok_or_else(|| PulseFxError::ElementNotFound {
                element: element.to_string(),
            })?;
        record.properties.insert(property.to_string(), value);
        Ok(())
    }

    fn property(&self, element: &str, property: &str) -> Option<PropertyValue> {
        self.elements
            .get(element)
            .and_then(|record| record.properties.get(property))
            .cloned()
    }

    fn set_state(&mut self, state: PipelineState) -> StateChangeReturn {
        if self.failing.contains(&state) {
            return StateChangeReturn::Failure;
        }
        self.state = state;
        StateChangeReturn::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Bus;

    fn graph_with_bins(names: &[&str]) -> MemoryGraph {
        let mut graph = MemoryGraph::new();
        for name in names {
            let bin = format!("{}_bin", name);
            graph.bins.insert(bin, Vec::new());
        }
        graph
    }

    #[test]
    fn test_prepend_and_insert_after() {
        let mut graph = graph_with_bins(&["a", "b", "c"]);
        graph.prepend("b_bin").unwrap();
        graph.prepend("a_bin").unwrap();
        graph.insert_after("c_bin", "b_bin").unwrap();
        assert_eq!(graph.spliced(), vec!["a_bin", "b_bin", "c_bin"]);
    }

    #[test]
    fn test_insert_after_missing_anchor() {
        let mut graph = graph_with_bins(&["a", "b"]);
        let err = graph.insert_after("b_bin", "a_bin").unwrap_err();
        assert_eq!(err.error_code(), "ANCHOR_NOT_SPLICED");
        assert!(graph.spliced().is_empty());
    }

    #[test]
    fn test_double_splice_rejected() {
        let mut graph = graph_with_bins(&["a"]);
        graph.prepend("a_bin").unwrap();
        assert!(graph.prepend("a_bin").is_err());
        assert_eq!(graph.spliced().len(), 1);
    }

    #[test]
    fn test_unknown_bin_rejected() {
        let mut graph = MemoryGraph::new();
        let err = graph.prepend("ghost_bin").unwrap_err();
        assert_eq!(err.error_code(), "ELEMENT_NOT_FOUND");
    }

    #[test]
    fn test_remove_keeps_neighbour_order() {
        let mut graph = graph_with_bins(&["a", "b", "c"]);
        graph.prepend("a_bin").unwrap();
        graph.insert_after("b_bin", "a_bin").unwrap();
        graph.insert_after("c_bin", "b_bin").unwrap();
        graph.remove("b_bin").unwrap();
        assert_eq!(graph.spliced(), vec!["a_bin", "c_bin"]);
        assert!(graph.remove("b_bin").is_err());
    }

    #[test]
    fn test_properties() {
        let mut graph = MemoryGraph::new();
        graph
            .add_element(&ElementSpec::new("audio_sink", "pulsesink").with("volume", 1.0))
            .unwrap();
        assert_eq!(graph.property("audio_sink", "volume"), Some(PropertyValue::Double(1.0)));

        graph.set_property("audio_sink", "device", "hdmi".into()).unwrap();
        assert_eq!(
            graph.property("audio_sink", "device").as_ref().and_then(|v| v.as_str()),
            Some("hdmi")
        );
        assert!(graph.set_property("nope", "volume", PropertyValue::Double(1.0)).is_err());
    }

    #[test]
    fn test_simulated_failures() {
        let mut graph = MemoryGraph::new();
        graph.fail_transitions_to(PipelineState::Playing);
        assert_eq!(graph.set_state(PipelineState::Playing), StateChangeReturn::Failure);
        assert_eq!(graph.state(), PipelineState::Null);

        graph.clear_failures();
        assert_eq!(graph.set_state(PipelineState::Playing), StateChangeReturn::Success);
        assert_eq!(graph.state(), PipelineState::Playing);
    }

    #[test]
    fn test_standalone_level_posts() {
        let bus = Bus::new();
        let mut graph = MemoryGraph::new();
        graph.attach_bus(bus.sender());
        graph.add_element(&ElementSpec::new("meter", "level")).unwrap();

        assert!(graph.emit_level("meter", &[-3.0, -4.0]));
        assert!(!graph.emit_level("unknown", &[-3.0]));

        graph.set_property("meter", "post-messages", false.into()).unwrap();
        assert!(!graph.emit_level("meter", &[-3.0, -4.0]));
        assert_eq!(bus.pending(), 1);
    }
}
