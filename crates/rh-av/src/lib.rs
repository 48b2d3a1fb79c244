//! # rh-av
//!
//! Everything that touches ffmpeg and ffprobe, plus the pure subtitle
//! transforms that sit next to them.
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder with optional
//!   deadline, stderr line streaming and cancellation.
//! - **Probing** ([`MediaProber`], [`FfprobeProber`]) -- codec, duration and
//!   embedded subtitle tracks, each failing independently.
//! - **Subtitles** ([`subtitle`]) -- SRT/ASS to WebVTT and track selection.
//! - **Actions** ([`actions`]) -- ffmpeg invocations for the fragmented-MP4
//!   pipe, HLS segmentation and subtitle extraction.

pub mod actions;
pub mod command;
pub mod probe;
pub mod subtitle;
pub mod tools;

pub use command::{ToolCommand, ToolOutput};
pub use probe::{FfprobeProber, MediaProber, ProbeReport};
pub use subtitle::SubtitleTrack;
pub use tools::{ToolInfo, ToolRegistry};
