//! Embedded subtitle extraction.

use std::path::Path;

use crate::subtitle::ass_to_vtt;
use crate::tools::ToolRegistry;

/// Pull stream `index` out of `input` as ASS and convert it to WebVTT.
pub async fn extract_subtitle_vtt(
    tools: &ToolRegistry,
    input: &Path,
    index: u32,
) -> rh_core::Result<String> {
    let mut cmd = tools.ffmpeg()?;
    cmd.args(["-loglevel", "error", "-nostdin", "-i"]);
    cmd.arg(input.to_string_lossy().as_ref());
    cmd.args(["-map", &format!("0:{index}"), "-f", "ass", "pipe:1"]);

    tracing::debug!(path = %input.display(), index, "Extracting subtitle stream");
    let output = cmd.execute().await?;
    Ok(ass_to_vtt(&output.stdout))
}
