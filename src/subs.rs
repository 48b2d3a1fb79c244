//! `reelhouse convert-subs`: write a `.vtt` next to every `.srt` that lacks one.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rh_av::subtitle::srt_to_vtt;
use walkdir::WalkDir;

/// `.srt` files under `root` without a sibling `.vtt`.
pub fn unconverted(root: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("srt"))
                && !p.with_extension("vtt").exists()
        })
        .collect();
    found.sort();
    found
}

pub fn convert_all(root: &Path) -> Result<usize> {
    if !root.is_dir() {
        anyhow::bail!("Directory does not exist: {}", root.display());
    }

    let mut converted = 0;
    for srt in unconverted(root) {
        let vtt = srt.with_extension("vtt");
        let raw = std::fs::read(&srt).with_context(|| format!("reading {}", srt.display()))?;
        std::fs::write(&vtt, srt_to_vtt(&String::from_utf8_lossy(&raw)))
            .with_context(|| format!("writing {}", vtt.display()))?;
        tracing::debug!(from = %srt.display(), to = %vtt.display(), "Converted subtitle");
        println!("✓ {}", vtt.display());
        converted += 1;
    }
    Ok(converted)
}
