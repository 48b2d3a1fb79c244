use once_cell::sync::Lazy;

use regex::Regex;

use super::VTT_HEADER;

static SRT_TIMESTAMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{2}:\d{2}:\d{2}),(\d{3})").expect("valid regex"));

/// Convert SubRip text to WebVTT.
///
/// Timestamps switch from comma to dot milliseconds and the numeric index
/// line heading each cue is dropped. Blank separators and cue text pass
/// through as-is, including text made only of digits.
pub fn srt_to_vtt(srt: &str) -> String {
    let srt = srt.strip_prefix('\u{feff}').unwrap_or(srt);

    let mut out = String::with_capacity(srt.len() + VTT_HEADER.len() + 2);
    out.push_str(VTT_HEADER);
    out.push_str("\n\n");

    let lines: Vec<&str> = srt.lines().collect();
    let mut block_start = true;
    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            block_start = true;
        } else {
            let heads_block = block_start;
            block_start = false;
            if heads_block && is_cue_index(trimmed, lines.get(i + 1).copied()) {
                continue;
            }
        }
        out.push_str(&SRT_TIMESTAMP.replace_all(line, "$1.$2"));
        out.push('\n');
    }

    out
}

/// A digits-only line directly followed by the cue timing line.
fn is_cue_index(line: &str, next: Option<&str>) -> bool {
    line.bytes().all(|b| b.is_ascii_digit()) && next.is_some_and(|n| n.contains("-->"))
}
