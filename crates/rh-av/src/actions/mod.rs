//! ffmpeg invocations: fragmented-MP4 pipe, HLS segmentation and embedded
//! subtitle extraction.

mod extract;
mod fmp4;
mod hls;

pub use extract::extract_subtitle_vtt;
pub use fmp4::spawn_fmp4;
pub use hls::{
    count_segments, generate_hls, hls_dir_for, is_hls_ready, segment_name, EncodeProgress,
    ProgressParser, PLAYLIST_NAME,
};

use rh_core::config::TranscodeConfig;
use rh_core::CodecPlan;

use crate::command::ToolCommand;

/// Append the video encoder arguments for `plan`.
fn push_video_args(
    cmd: &mut ToolCommand,
    plan: CodecPlan,
    transcode: &TranscodeConfig,
    tune: Option<&str>,
) {
    match plan {
        CodecPlan::Copy => {
            cmd.args(["-c:v", "copy"]);
        }
        CodecPlan::TranscodeH264 => {
            cmd.args(["-c:v", "libx264", "-preset", &transcode.video_preset]);
            cmd.args(["-crf", &transcode.video_crf.to_string()]);
            if let Some(tune) = tune {
                cmd.args(["-tune", tune]);
            }
            cmd.args(["-profile:v", "high", "-level", "4.1", "-pix_fmt", "yuv420p"]);
        }
    }
}

/// Stereo AAC at the configured bitrate.
fn push_audio_args(cmd: &mut ToolCommand, transcode: &TranscodeConfig) {
    cmd.args(["-c:a", "aac", "-ac", "2", "-b:a", &transcode.audio_bitrate]);
}
