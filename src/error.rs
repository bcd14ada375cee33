//! Error handling for PulseFx
//!
//! Errors carry enough context to be logged directly; recoverable ones come
//! with suggestions for the front-end.

use thiserror::Error;

/// Result type alias for PulseFx operations
pub type Result<T> = std::result::Result<T, PulseFxError>;

/// Main error type for PulseFx operations
#[derive(Error, Debug)]
pub enum PulseFxError {
    // Segment Errors
    #[error("Unknown segment: {name}")]
    UnknownSegment { name: String },

    #[error("Segment {segment} is not part of the {layout} layout")]
    SegmentNotInLayout { segment: String, layout: String },

    #[error("Plugin not installed: {factory} (needed by {segment})")]
    PluginMissing { segment: String, factory: String },

    // Graph Errors
    #[error("Splice failed for {segment}: {reason}")]
    SpliceFailed { segment: String, reason: String },

    #[error("Anchor {anchor} is not spliced into the pipeline")]
    AnchorNotSpliced { anchor: String },

    #[error("Element not found: {element}")]
    ElementNotFound { element: String },

    // Configuration Errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Invalid toggle: {toggle}")]
    InvalidToggle { toggle: String },

    // Channel Errors
    #[error("Channel disconnected: {channel}")]
    ChannelDisconnected { channel: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PulseFxError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            PulseFxError::UnknownSegment { .. } => "UNKNOWN_SEGMENT",
            PulseFxError::SegmentNotInLayout { .. } => "SEGMENT_NOT_IN_LAYOUT",
            PulseFxError::PluginMissing { .. } => "PLUGIN_MISSING",
            PulseFxError::SpliceFailed { .. } => "SPLICE_FAILED",
            PulseFxError::AnchorNotSpliced { .. } => "ANCHOR_NOT_SPLICED",
            PulseFxError::ElementNotFound { .. } => "ELEMENT_NOT_FOUND",
            PulseFxError::InvalidConfig { .. } => "INVALID_CONFIG",
            PulseFxError::InvalidToggle { .. } => "INVALID_TOGGLE",
            PulseFxError::ChannelDisconnected { .. } => "CHANNEL_DISCONNECTED",
            PulseFxError::Io(_) => "IO_ERROR",
            PulseFxError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors leave the pipeline usable in a degraded form.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PulseFxError::PluginMissing { .. }
                | PulseFxError::SpliceFailed { .. }
                | PulseFxError::AnchorNotSpliced { .. }
                | PulseFxError::InvalidToggle { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            PulseFxError::PluginMissing { .. } => vec![
                "Install the LADSPA/GStreamer plugin package providing this element",
                "The effect stays disabled until the plugin is available",
            ],
            PulseFxError::SpliceFailed { .. } => vec![
                "Toggle the effect off and on again",
                "Restart the pipeline if the problem persists",
            ],
            PulseFxError::InvalidConfig { .. } => vec![
                "Check the configuration file against the documented fields",
                "Delete the file to fall back to defaults",
            ],
            PulseFxError::InvalidToggle { .. } => vec![
                "Toggles look like +equalizer or -limiter",
            ],
            _ => vec![],
        }
    }
}
