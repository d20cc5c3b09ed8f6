//! Quality catalog.
//!
//! The catalog is a fixed, process-wide table of encoding presets. It is
//! immutable, so lookups need no synchronization.

use serde::Serialize;

use crate::{Error, Result};

/// A named encoding preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quality {
    /// Preset name, also used as the variant file suffix.
    pub name: &'static str,
    /// Target frame width in pixels.
    pub width: u32,
    /// Target frame height in pixels.
    pub height: u32,
    /// Target video bitrate in kbit/s.
    pub video_bitrate_kbps: u32,
    /// Target audio bitrate in kbit/s.
    pub audio_bitrate_kbps: u32,
}

impl Quality {
    /// Video bitrate in encoder notation, e.g. `2500k`.
    pub fn video_bitrate(&self) -> String {
        format!("{}k", self.video_bitrate_kbps)
    }

    /// Audio bitrate in encoder notation, e.g. `128k`.
    pub fn audio_bitrate(&self) -> String {
        format!("{}k", self.audio_bitrate_kbps)
    }

    /// Scale filter expression for this preset.
    pub fn scale_filter(&self) -> String {
        format!("scale={}:{}", self.width, self.height)
    }
}

const CATALOG: &[Quality] = &[
    Quality {
        name: "1080p",
        width: 1920,
        height: 1080,
        video_bitrate_kbps: 4000,
        audio_bitrate_kbps: 192,
    },
    Quality {
        name: "720p",
        width: 1280,
        height: 720,
        video_bitrate_kbps: 2500,
        audio_bitrate_kbps: 128,
    },
    Quality {
        name: "480p",
        width: 854,
        height: 480,
        video_bitrate_kbps: 1000,
        audio_bitrate_kbps: 96,
    },
    Quality {
        name: "360p",
        width: 640,
        height: 360,
        video_bitrate_kbps: 800,
        audio_bitrate_kbps: 96,
    },
];

/// Quality names requested for every upload unless configured otherwise.
pub const DEFAULT_LADDER: &[&str] = &["1080p", "720p", "480p", "360p"];

/// Pseudo-quality naming the untouched upload.
pub const ORIGINAL: &str = "original";

/// Look up a preset by name.
///
/// # Examples
///
/// ```
/// use reelhouse_common::quality::lookup;
///
/// let q = lookup("480p").unwrap();
/// assert_eq!((q.width, q.height), (854, 480));
/// assert!(lookup("4k").is_err());
/// ```
pub fn lookup(name: &str) -> Result<&'static Quality> {
    CATALOG
        .iter()
        .find(|q| q.name == name)
        .ok_or_else(|| Error::UnknownQuality(name.to_string()))
}

/// All presets, highest resolution first.
#[must_use]
pub fn all() -> &'static [Quality] {
    CATALOG
}
