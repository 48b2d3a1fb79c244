use once_cell::sync::Lazy;

use regex::Regex;

use super::VTT_HEADER;

/// Field count at which a `Dialogue:` line is treated as the full
/// `Layer,Start,End,Style,Name,MarginL,MarginR,MarginV,Effect,Text` layout.
const EXTENDED_FIELDS: usize = 10;

static STYLE_OVERRIDE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[^}]*\}").expect("valid regex"));

/// Convert Advanced SubStation Alpha text to WebVTT.
///
/// Only `Dialogue:` lines inside the `[Events]` section are read. Style
/// override blocks are stripped, `\N` and `\n` become line breaks, and cues
/// with no text left are dropped.
pub fn ass_to_vtt(ass: &str) -> String {
    let ass = ass.strip_prefix('\u{feff}').unwrap_or(ass);

    let mut out = String::from(VTT_HEADER);
    out.push_str("\n\n");

    let mut in_events = false;
    for line in ass.lines() {
        let line = line.trim();

        if line.starts_with('[') {
            in_events = line.eq_ignore_ascii_case("[events]");
            continue;
        }
        if !in_events {
            continue;
        }

        let Some(body) = line.strip_prefix("Dialogue:") else {
            continue;
        };
        let Some(cue) = parse_dialogue(body) else {
            continue;
        };

        out.push_str(&cue.start);
        out.push_str(" --> ");
        out.push_str(&cue.end);
        out.push('\n');
        out.push_str(&cue.text);
        out.push_str("\n\n");
    }

    out
}

struct Cue {
    start: String,
    end: String,
    text: String,
}

fn parse_dialogue(body: &str) -> Option<Cue> {
    let fields: Vec<&str> = body.trim_start().split(',').collect();

    let text_from = if fields.len() >= EXTENDED_FIELDS {
        EXTENDED_FIELDS - 1
    } else if fields.len() >= 5 {
        4
    } else {
        return None;
    };

    let start = ass_time_to_vtt(fields[1])?;
    let end = ass_time_to_vtt(fields[2])?;

    let raw = fields[text_from..].join(",");
    let text = STYLE_OVERRIDE
        .replace_all(&raw, "")
        .replace("\\N", "\n")
        .replace("\\n", "\n");
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    Some(Cue {
        start,
        end,
        text: text.to_string(),
    })
}

/// `H:MM:SS.cc` (centiseconds) to `HH:MM:SS.mmm`.
fn ass_time_to_vtt(time: &str) -> Option<String> {
    let mut parts = time.trim().split(':');
    let hours: u32 = parts.next()?.parse().ok()?;
    let minutes: u32 = parts.next()?.parse().ok()?;
    let seconds_part = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let (secs, frac) = seconds_part.split_once('.').unwrap_or((seconds_part, "0"));
    let seconds: u32 = secs.parse().ok()?;
    let frac_value: u32 = frac.parse().ok()?;
    let millis = match frac.len() {
        1 => frac_value * 100,
        2 => frac_value * 10,
        3 => frac_value,
        _ => return None,
    };

    Some(format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}"))
}
