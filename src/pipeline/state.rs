//! Pipeline state machine
//!
//! The multimedia framework owns the real state machine; this module tracks
//! what the host last asked for and how failures are reported. Failed
//! transitions are logged and never retried.

use std::fmt;

use log::{error, info};
use serde::{Deserialize, Serialize};

/// The four states a pipeline can be asked to reach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    /// Resources released (default state)
    #[default]
    Null,
    /// Devices opened, no data flowing
    Ready,
    /// Prerolled, clock stopped
    Paused,
    /// Data flowing
    Playing,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Null => write!(f, "null"),
            PipelineState::Ready => write!(f, "ready"),
            PipelineState::Paused => write!(f, "paused"),
            PipelineState::Playing => write!(f, "playing"),
        }
    }
}

/// Outcome reported by the graph backend for a state change request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChangeReturn {
    Success,
    /// The change will complete asynchronously
    Async,
    /// Live source, no preroll possible
    NoPreroll,
    Failure,
}

impl StateChangeReturn {
    pub fn is_failure(&self) -> bool {
        matches!(self, StateChangeReturn::Failure)
    }
}

/// Severity a failed transition is reported with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Critical,
    Error,
}

impl PipelineState {
    /// Severity of a failure to reach this state
    ///
    /// Failing to start (ready/playing) leaves the user without audio, so it
    /// is critical; failing to pause or stop is an error.
    pub fn failure_severity(&self) -> Severity {
        match self {
            PipelineState::Ready | PipelineState::Playing => Severity::Critical,
            PipelineState::Paused | PipelineState::Null => Severity::Error,
        }
    }

    /// Message logged when the transition to this state fails
    pub fn failure_message(&self) -> &'static str {
        match self {
            PipelineState::Ready => "could not set pipeline to ready",
            PipelineState::Paused => "failed to pause pipeline",
            PipelineState::Playing => "playing pipeline has failed",
            PipelineState::Null => "could not stop pipeline",
        }
    }
}

/// Tracks the last successfully reached state
#[derive(Debug, Clone, Default)]
pub struct PipelineStateMachine {
    state: PipelineState,
    is_playing: bool,
    log_tag: &'static str,
}

impl PipelineStateMachine {
    /// Create a tracker in the Null state
    pub fn new(log_tag: &'static str) -> Self {
        Self {
            state: PipelineState::Null,
            is_playing: false,
            log_tag,
        }
    }

    /// Record the backend's answer to a request for `requested`
    ///
    /// Returns `true` when the transition was accepted.
    ///
    /// # Example
    /// ```
    /// use pulsefx::pipeline::{PipelineState, PipelineStateMachine, StateChangeReturn};
    /// let mut machine = PipelineStateMachine::new("apps: ");
    /// assert!(machine.apply(PipelineState::Playing, StateChangeReturn::Async));
    /// assert!(machine.is_playing());
    /// ```
    pub fn apply(&mut self, requested: PipelineState, outcome: StateChangeReturn) -> bool {
        if outcome.is_failure() {
            match requested.failure_severity() {
                Severity::Critical => {
                    error!("critical: {}{}", self.log_tag, requested.failure_message())
                }
                Severity::Error => error!("{}{}", self.log_tag, requested.failure_message()),
            }
            return false;
        }

        self.state = requested;
        self.is_playing = requested == PipelineState::Playing;
        info!("{}pipeline state: {}", self.log_tag, requested);
        true
    }

    /// The last state successfully reached
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Check if the pipeline was last put into Playing
    pub fn is_playing(&self) -> bool {
        self.is_playing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_null() {
        let machine = PipelineStateMachine::new("");
        assert_eq!(machine.state(), PipelineState::Null);
        assert!(!machine.is_playing());
    }

    #[test]
    fn test_playing_sets_flag() {
        let mut machine = PipelineStateMachine::new("");
        assert!(machine.apply(PipelineState::Playing, StateChangeReturn::Success));
        assert!(machine.is_playing());
        assert_eq!(machine.state(), PipelineState::Playing);
    }

    #[test]
    fn test_leaving_playing_clears_flag() {
        let mut machine = PipelineStateMachine::new("");
        machine.apply(PipelineState::Playing, StateChangeReturn::Success);

        for next in [PipelineState::Paused, PipelineState::Ready, PipelineState::Null] {
            machine.apply(PipelineState::Playing, StateChangeReturn::Success);
            assert!(machine.apply(next, StateChangeReturn::Success));
            assert!(!machine.is_playing());
            assert_eq!(machine.state(), next);
        }
    }

    #[test]
    fn test_failure_keeps_previous_state() {
        let mut machine = PipelineStateMachine::new("");
        machine.apply(PipelineState::Ready, StateChangeReturn::Success);

        assert!(!machine.apply(PipelineState::Playing, StateChangeReturn::Failure));
        assert_eq!(machine.state(), PipelineState::Ready);
        assert!(!machine.is_playing());
    }

    #[test]
    fn test_no_preroll_counts_as_success() {
        let mut machine = PipelineStateMachine::new("");
        assert!(machine.apply(PipelineState::Paused, StateChangeReturn::NoPreroll));
        assert_eq!(machine.state(), PipelineState::Paused);
    }

    #[test]
    fn test_failure_severity() {
        assert_eq!(PipelineState::Ready.failure_severity(), Severity::Critical);
        assert_eq!(PipelineState::Playing.failure_severity(), Severity::Critical);
        assert_eq!(PipelineState::Paused.failure_severity(), Severity::Error);
        assert_eq!(PipelineState::Null.failure_severity(), Severity::Error);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(format!("{}", PipelineState::Null), "null");
        assert_eq!(format!("{}", PipelineState::Playing), "playing");
    }
}
