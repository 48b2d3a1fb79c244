//! Media-domain enums: request classification by extension and the codec plan
//! that decides between stream-copy and H.264 re-encode.
//!
//! All enums serialize in lowercase and implement `Display` manually for a
//! consistent string representation in logs and JSON.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

// ---------------------------------------------------------------------------
// CodecPlan
// ---------------------------------------------------------------------------

/// Video codecs that browsers cannot be trusted to decode inside MP4.
const TRANSCODE_CODECS: &[&str] = &["hevc", "h265", "vp9", "av1"];

/// What to do with the first video stream of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecPlan {
    /// Copy the video bitstream untouched.
    Copy,
    /// Re-encode video to H.264.
    TranscodeH264,
}

impl CodecPlan {
    /// Choose a plan from an ffprobe codec name.
    ///
    /// A missing codec (probe failure) yields [`CodecPlan::Copy`].
    pub fn for_codec(codec: Option<&str>) -> Self {
        match codec {
            Some(c) if TRANSCODE_CODECS.iter().any(|t| c.eq_ignore_ascii_case(t)) => {
                Self::TranscodeH264
            }
            _ => Self::Copy,
        }
    }
}

impl fmt::Display for CodecPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Copy => write!(f, "copy"),
            Self::TranscodeH264 => write!(f, "transcode_h264"),
        }
    }
}

// ---------------------------------------------------------------------------
// MediaKind
// ---------------------------------------------------------------------------

/// Coarse classification of a requested file by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Image,
    Subtitle,
    Other,
}

impl MediaKind {
    /// Classify a path by its (case-insensitive) extension.
    pub fn from_path(path: &Path) -> Self {
        let ext = extension_lower(path);
        match ext.as_deref() {
            Some(
                "mkv" | "mp4" | "m4v" | "avi" | "mov" | "webm" | "wmv" | "flv" | "ts" | "m2ts"
                | "mpg" | "mpeg",
            ) => Self::Video,
            Some("mp3" | "m4a" | "aac" | "flac" | "ogg" | "opus" | "wav") => Self::Audio,
            Some("jpg" | "jpeg" | "png" | "gif" | "webp") => Self::Image,
            Some("vtt" | "srt" | "ass" | "ssa") => Self::Subtitle,
            _ => Self::Other,
        }
    }

    /// Media files advertise `Accept-Ranges` and get the prefix treatment on
    /// un-ranged requests.
    pub fn is_media(&self) -> bool {
        matches!(self, Self::Video | Self::Audio)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
            Self::Image => write!(f, "image"),
            Self::Subtitle => write!(f, "subtitle"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// True for video containers that browsers play directly, which are served
/// byte-for-byte instead of going through the encoder.
pub fn is_browser_native(path: &Path) -> bool {
    matches!(extension_lower(path).as_deref(), Some("mp4" | "m4v" | "webm"))
}

/// True for video sources that must go through the remux streamer or HLS.
pub fn needs_remux(path: &Path) -> bool {
    MediaKind::from_path(path) == MediaKind::Video && !is_browser_native(path)
}

/// MIME type for a path, by extension.
pub fn content_type(path: &Path) -> &'static str {
    match extension_lower(path).as_deref() {
        Some("mp4" | "m4v") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        Some("mov") => "video/quicktime",
        Some("wmv") => "video/x-ms-wmv",
        Some("flv") => "video/x-flv",
        Some("ts" | "m2ts") => "video/mp2t",
        Some("mpg" | "mpeg") => "video/mpeg",
        Some("mp3") => "audio/mpeg",
        Some("m4a" | "aac") => "audio/mp4",
        Some("flac") => "audio/flac",
        Some("ogg" | "opus") => "audio/ogg",
        Some("wav") => "audio/wav",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("vtt") => "text/vtt; charset=utf-8",
        Some("srt") => "application/x-subrip",
        Some("ass" | "ssa") => "text/x-ssa",
        Some("json") => "application/json",
        Some("m3u8") => "application/vnd.apple.mpegurl",
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("txt" | "nfo") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

fn extension_lower(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
