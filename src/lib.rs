//! PulseFx - effect pipeline assembly and metering core
//!
//! Application and microphone streams of a desktop sound server are routed
//! through a chain of effect segments followed by a spectrum analyzer.
//!
//! # Architecture
//!
//! - `pipeline`: the host owning the graph, the insertion policy keeping
//!   segments in their declared order, and the pipeline state machine
//! - `effects`: segment kinds, layouts, plugin lookup and segment construction
//! - `meter`: level decoding, the spectrum display and the relay to views
//! - `bus` / `streams`: channels feeding the main loop from other threads
//!
//! The multimedia framework is reached through the [`pipeline::Graph`] trait;
//! [`pipeline::MemoryGraph`] is a headless implementation.

pub mod bus;
pub mod cli;
pub mod config;
pub mod effects;
pub mod error;
pub mod meter;
pub mod pipeline;
pub mod streams;

pub use error::{PulseFxError, Result};
