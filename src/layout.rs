//! Surround layouts: which physical channel index maps to which speaker.
//!
//! A layout is fixed for the lifetime of a session. Changing it tears down
//! and recreates the session, never mutates a live one.

use crate::error::{Result, RoomlockError};
use std::fmt;
use std::str::FromStr;

/// Named mapping of channel indices to speaker identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurroundLayout {
    /// Front left, front right
    Stereo,
    /// Front left, front right, front center
    Lcr,
    /// LCR plus a rear pair
    LcrRear,
}

impl SurroundLayout {
    /// Number of physical audio channels in this layout.
    pub fn channels(&self) -> usize {
        self.speaker_names().len()
    }

    /// Speaker names in channel-index order. Index `i` of the interleaved
    /// capture stream feeds the source placed for `speaker_names()[i]`.
    pub fn speaker_names(&self) -> &'static [&'static str] {
        match self {
            Self::Stereo => &["Front left", "Front right"],
            Self::Lcr => &["Front left", "Front right", "Front center"],
            Self::LcrRear => &[
                "Front left",
                "Front right",
                "Front center",
                "Rear left",
                "Rear right",
            ],
        }
    }

    /// Channel-map tokens for the audio server's virtual sink, matching
    /// `speaker_names()` index for index.
    pub fn server_channel_map(&self) -> &'static [&'static str] {
        match self {
            Self::Stereo => &["front-left", "front-right"],
            Self::Lcr => &["front-left", "front-right", "front-center"],
            Self::LcrRear => &[
                "front-left",
                "front-right",
                "front-center",
                "rear-left",
                "rear-right",
            ],
        }
    }
}

impl Default for SurroundLayout {
    fn default() -> Self {
        Self::Lcr
    }
}

impl fmt::Display for SurroundLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stereo => "Stereo",
            Self::Lcr => "LCR",
            Self::LcrRear => "LCR + Rear",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for SurroundLayout {
    type Err = RoomlockError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Stereo" => Ok(Self::Stereo),
            "LCR" => Ok(Self::Lcr),
            "LCR + Rear" => Ok(Self::LcrRear),
            other => Err(RoomlockError::Configuration(format!(
                "Unknown surround layout: {}",
                other
            ))),
        }
    }
}
