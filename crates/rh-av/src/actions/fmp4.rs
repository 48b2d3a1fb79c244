//! Fragmented MP4 written to stdout for progressive playback.

use std::path::Path;

use rh_core::config::TranscodeConfig;
use rh_core::CodecPlan;
use tokio::process::Child;

use super::{push_audio_args, push_video_args};
use crate::command::ToolCommand;
use crate::tools::ToolRegistry;

/// Build the ffmpeg command that remuxes or transcodes `input` into a
/// fragmented MP4 on `pipe:1`, starting `seek_secs` into the source.
pub fn fmp4_command(
    tools: &ToolRegistry,
    input: &Path,
    seek_secs: f64,
    plan: CodecPlan,
    transcode: &TranscodeConfig,
) -> rh_core::Result<ToolCommand> {
    let mut cmd = tools.ffmpeg()?;
    cmd.args(["-loglevel", "error", "-nostdin"]);

    // Input seeking: -ss before -i jumps to the nearest keyframe.
    if seek_secs > 0.0 {
        cmd.args(["-ss", &format!("{seek_secs:.3}")]);
    }
    cmd.arg("-i");
    cmd.arg(input.to_string_lossy().as_ref());
    cmd.args(["-map", "0:v:0", "-map", "0:a:0?"]);

    push_video_args(&mut cmd, plan, transcode, None);
    push_audio_args(&mut cmd, transcode);

    cmd.args([
        "-movflags",
        "frag_keyframe+empty_moov+default_base_moof",
        "-f",
        "mp4",
        "pipe:1",
    ]);

    Ok(cmd)
}

/// Spawn the fragmented-MP4 encoder. The returned child has stdout and
/// stderr piped and is killed when dropped.
pub fn spawn_fmp4(
    tools: &ToolRegistry,
    input: &Path,
    seek_secs: f64,
    plan: CodecPlan,
    transcode: &TranscodeConfig,
) -> rh_core::Result<Child> {
    let cmd = fmp4_command(tools, input, seek_secs, plan, transcode)?;
    tracing::debug!(args = ?cmd.get_args(), "Spawning fMP4 encoder");
    cmd.spawn_stdout()
}
