//! Pipeline assembly, insertion policy and state

pub mod graph;
pub mod host;
pub mod policy;
pub mod state;

pub use graph::{Graph, MemoryGraph, PropertyValue};
pub use host::{source_caps, PipelineHost, AUDIO_SINK, AUDIO_SRC, SOURCE_CAPS};
pub use policy::{plan_insertion, upstream_anchor, SplicePlan};
pub use state::{PipelineState, PipelineStateMachine, Severity, StateChangeReturn};
