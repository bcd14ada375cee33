//! CLI Module
//!
//! Command-line front-end driving a headless pipeline host.

pub mod commands;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};

use crate::effects::{ChainLayout, SegmentKind, Tap};
use crate::error::PulseFxError;

/// PulseFx - effect pipeline assembly and metering
#[derive(Parser, Debug)]
#[command(name = "pulsefx")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a pipeline, apply toggles and print the resulting chain
    #[command(name = "chain")]
    Chain {
        /// Configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the layout (sink-inputs or source-outputs)
        #[arg(short, long)]
        layout: Option<ChainLayout>,

        /// Treat these plugin factories as not installed
        #[arg(short, long, value_delimiter = ',')]
        missing: Vec<String>,

        /// Print the chain as JSON
        #[arg(long)]
        json: bool,

        /// Toggles applied in order, e.g. +eq,-limiter
        #[arg(value_delimiter = ',', allow_hyphen_values = true)]
        toggles: Vec<Toggle>,
    },

    /// Print the spectrum band count and display axis
    #[command(name = "spectrum-axis")]
    SpectrumAxis {
        /// Sampling rate in Hz
        #[arg(short, long, default_value_t = 48000)]
        rate: u32,

        /// Points on the display axis
        #[arg(short, long, default_value_t = 250)]
        points: usize,

        /// Bands computed by the analyzer
        #[arg(short, long, default_value_t = 1600)]
        bands: usize,
    },

    /// Report which segment plugins are available
    #[command(name = "plugins")]
    Plugins {
        /// Treat these plugin factories as not installed
        #[arg(short, long, value_delimiter = ',')]
        missing: Vec<String>,

        #[arg(short, long, default_value_t = ChainLayout::SinkInputs)]
        layout: ChainLayout,
    },

    /// Feed peak pairs (dB) through a segment meter and print the readings
    #[command(name = "meter")]
    Meter {
        /// Segment whose meter reports the peaks
        #[arg(short, long, default_value_t = SegmentKind::Limiter)]
        segment: SegmentKind,

        /// Report on the output meter instead of the input one
        #[arg(long)]
        output: bool,

        /// Peaks in dB, taken as left/right pairs
        #[arg(allow_negative_numbers = true, required = true)]
        peaks: Vec<f64>,
    },
}

/// Switch a segment on (`+name`) or off (`-name`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toggle {
    pub kind: SegmentKind,
    pub enable: bool,
}

impl FromStr for Toggle {
    type Err = PulseFxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (enable, name) = if let Some(name) = s.strip_prefix('+') {
            (true, name)
        } else if let Some(name) = s.strip_prefix('-') {
            (false, name)
        } else {
            return Err(PulseFxError::InvalidToggle {
                toggle: s.to_string(),
            });
        };

        let kind = name.parse().map_err(|_| PulseFxError::InvalidToggle {
            toggle: s.to_string(),
        })?;
        Ok(Self { kind, enable })
    }
}

impl fmt::Display for Toggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", if self.enable { '+' } else { '-' }, self.kind)
    }
}

/// Meter tap selected by the `--output` flag
pub fn tap_for(output: bool) -> Tap {
    if output {
        Tap::Output
    } else {
        Tap::Input
    }
}
