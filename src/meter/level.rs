//! Peak level decoding
//!
//! Level meters report one dB peak per channel. Bars show the linear
//! amplitude and labels the rounded dB value; anything below the floor reads
//! as silence.

use serde::Serialize;

/// Lowest level shown on a meter, in dB
pub const LEVEL_FLOOR_DB: f64 = -99.0;

/// Amplitude ratio for a level in dB
pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// One channel of a level reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelLevel {
    /// Raw peak as reported by the meter
    pub db: f64,
    /// Bar value
    pub linear: f64,
    /// Label value
    pub label: i64,
}

impl ChannelLevel {
    pub fn from_db(db: f64) -> Self {
        // NaN fails the comparison and reads as silence too
        if db >= LEVEL_FLOOR_DB {
            Self {
                db,
                linear: db_to_linear(db),
                label: db.round() as i64,
            }
        } else {
            Self {
                db,
                linear: 0.0,
                label: LEVEL_FLOOR_DB as i64,
            }
        }
    }

    pub fn is_silent(&self) -> bool {
        self.linear == 0.0
    }
}

/// Stereo reading of a level meter
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LevelReading {
    pub left: ChannelLevel,
    pub right: ChannelLevel,
}

impl LevelReading {
    /// Decode a peak list
    ///
    /// A single channel is shown on both bars. Channels past the second are
    /// ignored and an empty list yields `None`.
    pub fn from_peak(peak: &[f64]) -> Option<Self> {
        let left = *peak.first()?;
        let right = peak.get(1).copied().unwrap_or(left);
        Some(Self {
            left: ChannelLevel::from_db(left),
            right: ChannelLevel::from_db(right),
        })
    }

    /// Louder of the two channels, in dB
    pub fn max_db(&self) -> f64 {
        self.left.db.max(self.right.db)
    }
}
