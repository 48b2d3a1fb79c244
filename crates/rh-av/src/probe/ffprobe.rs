//! FFprobe-backed [`MediaProber`].
//!
//! Each fact is a separate, narrowly scoped ffprobe call so that a broken
//! subtitle stream cannot take the duration down with it.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use super::MediaProber;
use crate::subtitle::SubtitleTrack;
use crate::tools::ToolRegistry;

/// A prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    tools: ToolRegistry,
}

impl FfprobeProber {
    pub fn new(tools: ToolRegistry) -> Self {
        Self { tools }
    }

    async fn run(&self, args: &[&str], path: &Path) -> rh_core::Result<String> {
        let mut cmd = self.tools.ffprobe()?;
        cmd.args(["-v", "error"]);
        cmd.args(args.iter().copied());
        cmd.arg(path.to_string_lossy().as_ref());
        Ok(cmd.execute().await?.stdout)
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    async fn video_codec(&self, path: &Path) -> rh_core::Result<String> {
        let stdout = self
            .run(
                &[
                    "-select_streams", "v:0",
                    "-show_entries", "stream=codec_name",
                    "-of", "default=noprint_wrappers=1:nokey=1",
                ],
                path,
            )
            .await?;
        parse_codec(&stdout)
    }

    async fn duration(&self, path: &Path) -> rh_core::Result<f64> {
        let stdout = self
            .run(
                &[
                    "-show_entries", "format=duration",
                    "-of", "default=noprint_wrappers=1:nokey=1",
                ],
                path,
            )
            .await?;
        parse_duration(&stdout)
    }

    async fn subtitle_tracks(&self, path: &Path) -> rh_core::Result<Vec<SubtitleTrack>> {
        let stdout = self
            .run(
                &[
                    "-select_streams", "s",
                    "-show_entries", "stream=index,codec_name:stream_tags=language,title",
                    "-of", "json",
                ],
                path,
            )
            .await?;
        parse_subtitle_streams(&stdout)
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeStreams {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: u32,
    codec_name: Option<String>,
    #[serde(default)]
    tags: FfprobeTags,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    language: Option<String>,
    title: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

fn parse_codec(stdout: &str) -> rh_core::Result<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(|l| l.to_ascii_lowercase())
        .ok_or_else(|| rh_core::Error::Probe("no video stream".into()))
}

fn parse_duration(stdout: &str) -> rh_core::Result<f64> {
    let raw = stdout.trim();
    raw.parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| rh_core::Error::Probe(format!("unparseable duration {raw:?}")))
}

fn parse_subtitle_streams(stdout: &str) -> rh_core::Result<Vec<SubtitleTrack>> {
    let parsed: FfprobeStreams = serde_json::from_str(stdout)
        .map_err(|e| rh_core::Error::Probe(format!("ffprobe JSON parse error: {e}")))?;

    Ok(parsed
        .streams
        .into_iter()
        .map(|s| SubtitleTrack {
            index: s.index,
            language: s
                .tags
                .language
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| "und".to_string()),
            title: s.tags.title,
            codec: s.codec_name,
        })
        .collect())
}
