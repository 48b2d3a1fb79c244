//! Media probing.
//!
//! [`MediaProber`] exposes the three facts the engine needs about a source,
//! each as its own fallible call. [`MediaProber::report`] combines them with
//! the degrade-on-failure defaults the request handlers rely on.

mod ffprobe;

pub use ffprobe::FfprobeProber;

use std::path::Path;

use async_trait::async_trait;
use rh_core::CodecPlan;
use serde::Serialize;

use crate::subtitle::SubtitleTrack;

/// Trait for anything that can inspect a media file.
#[async_trait]
pub trait MediaProber: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &'static str;

    /// Codec name of the first video stream (e.g. `h264`, `hevc`).
    async fn video_codec(&self, path: &Path) -> rh_core::Result<String>;

    /// Container duration in seconds.
    async fn duration(&self, path: &Path) -> rh_core::Result<f64>;

    /// All embedded subtitle streams in container order.
    async fn subtitle_tracks(&self, path: &Path) -> rh_core::Result<Vec<SubtitleTrack>>;

    /// Run codec and duration probes concurrently and degrade failures:
    /// unknown codec, zero duration.
    async fn codec_and_duration(&self, path: &Path) -> (Option<String>, f64) {
        let (codec, duration) = tokio::join!(self.video_codec(path), self.duration(path));

        let codec = codec
            .map_err(|e| {
                tracing::warn!(path = %path.display(), "Codec probe failed, assuming compatible: {e}");
            })
            .ok();
        let duration = duration
            .map_err(|e| {
                tracing::warn!(path = %path.display(), "Duration probe failed, assuming 0: {e}");
            })
            .ok()
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(0.0);

        (codec, duration)
    }

    /// Subtitle tracks, or an empty list when the probe fails.
    async fn subtitle_tracks_or_empty(&self, path: &Path) -> Vec<SubtitleTrack> {
        match self.subtitle_tracks(path).await {
            Ok(tracks) => tracks,
            Err(e) => {
                tracing::warn!(path = %path.display(), "Subtitle probe failed: {e}");
                Vec::new()
            }
        }
    }

    /// Everything at once, with every failure degraded.
    async fn report(&self, path: &Path) -> ProbeReport {
        let ((video_codec, duration_secs), subtitle_tracks) = tokio::join!(
            self.codec_and_duration(path),
            self.subtitle_tracks_or_empty(path)
        );
        ProbeReport {
            plan: CodecPlan::for_codec(video_codec.as_deref()),
            video_codec,
            duration_secs,
            subtitle_tracks,
        }
    }
}

/// Combined probe result.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub video_codec: Option<String>,
    pub duration_secs: f64,
    pub plan: CodecPlan,
    pub subtitle_tracks: Vec<SubtitleTrack>,
}
