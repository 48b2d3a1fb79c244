//! Subtitle tracks and the text transforms that turn them into WebVTT.
//!
//! Everything here is pure: no process spawning and no filesystem access.

mod ass;
mod select;
mod srt;

pub use ass::ass_to_vtt;
pub use select::select_preferred;
pub use srt::srt_to_vtt;

use serde::{Deserialize, Serialize};

/// Header every WebVTT document starts with.
pub const VTT_HEADER: &str = "WEBVTT";

/// An embedded subtitle stream as reported by ffprobe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    /// Absolute stream index inside the container (the `N` in `-map 0:N`).
    pub index: u32,
    /// ISO 639 language tag; `und` when the container has none.
    pub language: String,
    pub title: Option<String>,
    pub codec: Option<String>,
}

impl SubtitleTrack {
    pub fn new(index: u32, language: impl Into<String>) -> Self {
        Self {
            index,
            language: language.into(),
            title: None,
            codec: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}
