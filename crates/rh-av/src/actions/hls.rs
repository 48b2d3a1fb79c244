//! HLS segmentation into a sibling `<source>.hls/` directory.
//!
//! Layout: `playlist.m3u8` plus `segment000.ts`, `segment001.ts`, ... MPEG-TS
//! segments. The playlist is only trusted once it carries `#EXT-X-ENDLIST` and
//! is at least as new as the source.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rh_core::config::{HlsConfig, TranscodeConfig};
use rh_core::CodecPlan;
use tokio_util::sync::CancellationToken;

use super::{push_audio_args, push_video_args};
use crate::command::ToolCommand;
use crate::tools::ToolRegistry;

pub const PLAYLIST_NAME: &str = "playlist.m3u8";
const END_LIST: &str = "#EXT-X-ENDLIST";
const SEGMENT_PREFIX: &str = "segment";
const SEGMENT_EXT: &str = ".ts";

/// Log at most this often while encoding, unless a 5% step is crossed.
const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(30);

/// `/media/show/ep01.mkv` -> `/media/show/ep01.mkv.hls`
pub fn hls_dir_for(source: &Path) -> PathBuf {
    let mut dir = OsString::from(source.as_os_str());
    dir.push(".hls");
    PathBuf::from(dir)
}

/// File name of the `n`th segment.
pub fn segment_name(n: u32) -> String {
    format!("{SEGMENT_PREFIX}{n:03}{SEGMENT_EXT}")
}

/// Whether `dir` holds a finished playlist that is not older than `source`.
pub fn is_hls_ready(source: &Path, dir: &Path) -> bool {
    let playlist = dir.join(PLAYLIST_NAME);

    let complete = std::fs::read_to_string(&playlist)
        .map(|text| text.contains(END_LIST))
        .unwrap_or(false);
    if !complete {
        return false;
    }

    let modified = |p: &Path| std::fs::metadata(p).and_then(|m| m.modified()).ok();
    match (modified(&playlist), modified(source)) {
        (Some(playlist_mtime), Some(source_mtime)) => playlist_mtime >= source_mtime,
        _ => false,
    }
}

/// Number of finished segment files in `dir`. In-progress `.tmp` files are
/// not counted.
pub fn count_segments(dir: &Path) -> u32 {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    let count = entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name();
            let name = name.to_string_lossy();
            name.starts_with(SEGMENT_PREFIX) && name.ends_with(SEGMENT_EXT)
        })
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Build the segmenting ffmpeg command.
pub fn hls_command(
    tools: &ToolRegistry,
    input: &Path,
    out_dir: &Path,
    plan: CodecPlan,
    transcode: &TranscodeConfig,
    hls: &HlsConfig,
) -> rh_core::Result<ToolCommand> {
    let mut cmd = tools.ffmpeg()?;
    cmd.args(["-loglevel", "error", "-nostdin", "-y"]);
    cmd.args(["-progress", "pipe:2", "-nostats"]);
    cmd.arg("-i");
    cmd.arg(input.to_string_lossy().as_ref());
    cmd.args(["-map", "0:v:0", "-map", "0:a:0?"]);

    push_video_args(&mut cmd, plan, transcode, hls.video_tune.as_deref());
    push_audio_args(&mut cmd, transcode);
    cmd.args(["-ar", &hls.audio_sample_rate.to_string()]);

    let segment_pattern = out_dir.join(format!("{SEGMENT_PREFIX}%03d{SEGMENT_EXT}"));
    cmd.args(["-f", "hls"]);
    cmd.args(["-hls_time", &hls.segment_secs.to_string()]);
    cmd.args(["-hls_list_size", "0", "-hls_segment_type", "mpegts"]);
    cmd.args(["-hls_segment_filename", &segment_pattern.to_string_lossy()]);
    cmd.args(["-hls_flags", "independent_segments+temp_file"]);
    cmd.arg(out_dir.join(PLAYLIST_NAME).to_string_lossy().as_ref());

    cmd.timeout(hls.generation_timeout());
    Ok(cmd)
}

/// Run a full HLS generation for `input` into `out_dir`.
///
/// Any previous contents of `out_dir` are discarded first. Encoder progress
/// is logged as percent/ETA when `duration_secs` is known. The run stops
/// (and the encoder is killed) when `cancel` fires or the configured
/// generation deadline expires. Cleaning up after a failure is left to the
/// caller.
#[allow(clippy::too_many_arguments)]
pub async fn generate_hls(
    tools: &ToolRegistry,
    input: &Path,
    out_dir: &Path,
    plan: CodecPlan,
    transcode: &TranscodeConfig,
    hls: &HlsConfig,
    duration_secs: f64,
    cancel: CancellationToken,
) -> rh_core::Result<()> {
    if out_dir.exists() {
        tokio::fs::remove_dir_all(out_dir).await?;
    }
    tokio::fs::create_dir_all(out_dir).await?;

    let cmd = hls_command(tools, input, out_dir, plan, transcode, hls)?;

    tracing::info!(
        path = %input.display(),
        %plan,
        duration_secs,
        "HLS generation: {:?} -> {:?}",
        input,
        out_dir
    );

    let started = Instant::now();
    let mut parser = ProgressParser::default();
    let mut last_logged_pct: Option<u32> = None;
    let mut last_log = started;

    cmd.execute_with_stderr_callback(
        |line| {
            let Some(progress) = parser.feed(line) else {
                return;
            };
            if duration_secs <= 0.0 || progress.done {
                return;
            }
            let pct = ((progress.out_secs / duration_secs) * 100.0).clamp(0.0, 99.0) as u32;
            let now = Instant::now();
            let crossed_step = pct % 5 == 0 && last_logged_pct != Some(pct);
            if crossed_step || now.duration_since(last_log) >= PROGRESS_LOG_INTERVAL {
                let eta_secs = progress
                    .speed
                    .filter(|s| *s > 0.0)
                    .map(|s| ((duration_secs - progress.out_secs).max(0.0) / s).round() as u64);
                tracing::info!(
                    path = %input.display(),
                    pct,
                    speed = ?progress.speed,
                    eta_secs = ?eta_secs,
                    elapsed_secs = started.elapsed().as_secs(),
                    "HLS encode progress"
                );
                last_logged_pct = Some(pct);
                last_log = now;
            }
        },
        Some(cancel),
    )
    .await?;

    tracing::info!(
        path = %input.display(),
        elapsed_secs = started.elapsed().as_secs(),
        "HLS generation finished"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Progress parsing
// ---------------------------------------------------------------------------

/// One block of `ffmpeg -progress` output.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeProgress {
    /// Media time encoded so far.
    pub out_secs: f64,
    /// Encoding speed relative to real time, when ffmpeg reports one.
    pub speed: Option<f64>,
    /// Set on the final `progress=end` block.
    pub done: bool,
}

/// Accumulates `key=value` lines and yields one [`EncodeProgress`] per
/// `progress=` terminator.
#[derive(Debug, Default)]
pub struct ProgressParser {
    out_us: Option<i64>,
    speed: Option<f64>,
}

impl ProgressParser {
    pub fn feed(&mut self, line: &str) -> Option<EncodeProgress> {
        let (key, value) = line.trim().split_once('=')?;
        let value = value.trim();
        match key {
            // out_time_ms is microseconds as well, despite the name.
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.out_us = Some(us);
                }
                None
            }
            "speed" => {
                self.speed = value.trim_end_matches('x').trim().parse::<f64>().ok();
                None
            }
            "progress" => Some(EncodeProgress {
                out_secs: self.out_us.unwrap_or(0).max(0) as f64 / 1_000_000.0,
                speed: self.speed,
                done: value == "end",
            }),
            _ => None,
        }
    }
}
