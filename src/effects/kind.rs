//! Segment kinds and the fixed chain layouts
//!
//! Every pipeline flavour declares a total order over the segment kinds it
//! carries. Whatever subset is enabled, spliced segments always appear in
//! this order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PulseFxError;

/// One splice-able unit of the effects chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Limiter,
    Panorama,
    Compressor,
    Reverb,
    Highpass,
    Lowpass,
    Equalizer,
    /// Spectrum analyzer, always the last segment of a layout
    Spectrum,
}

impl SegmentKind {
    /// All kinds, in the sink-inputs order
    pub const ALL: [SegmentKind; 8] = [
        SegmentKind::Limiter,
        SegmentKind::Panorama,
        SegmentKind::Compressor,
        SegmentKind::Reverb,
        SegmentKind::Highpass,
        SegmentKind::Lowpass,
        SegmentKind::Equalizer,
        SegmentKind::Spectrum,
    ];

    /// Stable lowercase identifier, also the plugin element name
    pub fn name(&self) -> &'static str {
        match self {
            SegmentKind::Limiter => "limiter",
            SegmentKind::Panorama => "panorama",
            SegmentKind::Compressor => "compressor",
            SegmentKind::Reverb => "reverb",
            SegmentKind::Highpass => "highpass",
            SegmentKind::Lowpass => "lowpass",
            SegmentKind::Equalizer => "equalizer",
            SegmentKind::Spectrum => "spectrum",
        }
    }

    /// Human-readable name used in log lines
    pub fn display_name(&self) -> &'static str {
        match self {
            SegmentKind::Limiter => "Limiter",
            SegmentKind::Panorama => "Panorama",
            SegmentKind::Compressor => "Compressor",
            SegmentKind::Reverb => "Reverb",
            SegmentKind::Highpass => "Highpass",
            SegmentKind::Lowpass => "Lowpass",
            SegmentKind::Equalizer => "Equalizer",
            SegmentKind::Spectrum => "Spectrum",
        }
    }

    /// Name of the bin wrapping this segment inside the effects bin
    pub fn bin_name(&self) -> String {
        format!("{}_bin", self.name())
    }

    /// Name of the level meter in front of the plugin
    pub fn input_level_name(&self) -> String {
        format!("{}_input_level", self.name())
    }

    /// Name of the level meter behind the plugin
    pub fn output_level_name(&self) -> String {
        format!("{}_output_level", self.name())
    }

    /// Whether the segment carries pre/post level meters
    pub fn has_level_taps(&self) -> bool {
        !matches!(self, SegmentKind::Spectrum)
    }

    /// Resolve a bin name (`"<kind>_bin"`) back to its kind
    pub fn from_bin_name(bin: &str) -> Option<Self> {
        let name = bin.strip_suffix("_bin")?;
        name.parse().ok()
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SegmentKind {
    type Err = PulseFxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "limiter" => Ok(SegmentKind::Limiter),
            "panorama" => Ok(SegmentKind::Panorama),
            "compressor" => Ok(SegmentKind::Compressor),
            "reverb" => Ok(SegmentKind::Reverb),
            "highpass" => Ok(SegmentKind::Highpass),
            "lowpass" => Ok(SegmentKind::Lowpass),
            "equalizer" | "eq" => Ok(SegmentKind::Equalizer),
            "spectrum" => Ok(SegmentKind::Spectrum),
            other => Err(PulseFxError::UnknownSegment {
                name: other.to_string(),
            }),
        }
    }
}

/// Which side of the plugin a level meter sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tap {
    Input,
    Output,
}

impl fmt::Display for Tap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tap::Input => write!(f, "input"),
            Tap::Output => write!(f, "output"),
        }
    }
}

const SINK_INPUTS_ORDER: [SegmentKind; 8] = SegmentKind::ALL;

const SOURCE_OUTPUTS_ORDER: [SegmentKind; 7] = [
    SegmentKind::Limiter,
    SegmentKind::Compressor,
    SegmentKind::Reverb,
    SegmentKind::Highpass,
    SegmentKind::Lowpass,
    SegmentKind::Equalizer,
    SegmentKind::Spectrum,
];

/// Pipeline flavour, each with its own declared segment order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChainLayout {
    /// Application playback streams
    #[default]
    SinkInputs,
    /// Microphone / recording streams
    SourceOutputs,
}

impl ChainLayout {
    /// The declared order of segments for this layout
    pub fn order(&self) -> &'static [SegmentKind] {
        match self {
            ChainLayout::SinkInputs => &SINK_INPUTS_ORDER,
            ChainLayout::SourceOutputs => &SOURCE_OUTPUTS_ORDER,
        }
    }

    /// Index of `kind` in the declared order
    pub fn position(&self, kind: SegmentKind) -> Option<usize> {
        self.order().iter().position(|k| *k == kind)
    }

    /// Check if the layout carries `kind`
    pub fn contains(&self, kind: SegmentKind) -> bool {
        self.position(kind).is_some()
    }

    /// Prefix for log lines coming from this pipeline
    pub fn log_tag(&self) -> &'static str {
        match self {
            ChainLayout::SinkInputs => "apps: ",
            ChainLayout::SourceOutputs => "mic: ",
        }
    }

    /// The declared order restricted to the kinds accepted by `keep`
    pub fn restrict<F>(&self, mut keep: F) -> Vec<SegmentKind>
    where
        F: FnMut(SegmentKind) -> bool,
    {
        self.order().iter().copied().filter(|k| keep(*k)).collect()
    }
}

impl fmt::Display for ChainLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainLayout::SinkInputs => write!(f, "sink-inputs"),
            ChainLayout::SourceOutputs => write!(f, "source-outputs"),
        }
    }
}

impl FromStr for ChainLayout {
    type Err = PulseFxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sink-inputs" | "apps" => Ok(ChainLayout::SinkInputs),
            "source-outputs" | "mic" => Ok(ChainLayout::SourceOutputs),
            other => Err(PulseFxError::InvalidConfig {
                reason: format!("unknown layout '{}'", other),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spectrum_is_last_in_every_layout() {
        for layout in [ChainLayout::SinkInputs, ChainLayout::SourceOutputs] {
            assert_eq!(layout.order().last(), Some(&SegmentKind::Spectrum));
        }
    }

    #[test]
    fn test_source_outputs_have_no_panorama() {
        assert!(ChainLayout::SinkInputs.contains(SegmentKind::Panorama));
        assert!(!ChainLayout::SourceOutputs.contains(SegmentKind::Panorama));
        assert_eq!(ChainLayout::SourceOutputs.position(SegmentKind::Compressor), Some(1));
    }

    #[test]
    fn test_element_names() {
        let kind = SegmentKind::Highpass;
        assert_eq!(kind.bin_name(), "highpass_bin");
        assert_eq!(kind.input_level_name(), "highpass_input_level");
        assert_eq!(kind.output_level_name(), "highpass_output_level");
        assert_eq!(SegmentKind::from_bin_name("highpass_bin"), Some(kind));
        assert_eq!(SegmentKind::from_bin_name("highpass"), None);
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("eq".parse::<SegmentKind>().unwrap(), SegmentKind::Equalizer);
        assert_eq!(" Reverb ".parse::<SegmentKind>().unwrap(), SegmentKind::Reverb);
        assert!("flanger".parse::<SegmentKind>().is_err());
    }

    #[test]
    fn test_restrict_keeps_declared_order() {
        let kept = ChainLayout::SinkInputs.restrict(|k| {
            matches!(k, SegmentKind::Equalizer | SegmentKind::Limiter | SegmentKind::Reverb)
        });
        assert_eq!(
            kept,
            vec![SegmentKind::Limiter, SegmentKind::Reverb, SegmentKind::Equalizer]
        );
    }
}
