//! `reelhouse pregen`: encode HLS output ahead of playback.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Result;
use futures::stream::{self, StreamExt};
use rh_av::actions::hls_dir_for;
use rh_server::context::AppContext;
use rh_server::hls_manager::GenerateOptions;
use walkdir::WalkDir;

pub struct PregenOptions {
    pub force: bool,
    pub skip: Vec<String>,
    pub parallel: usize,
    pub dry_run: bool,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Done,
    Pending,
    Skip,
}

impl Status {
    fn tag(self) -> &'static str {
        match self {
            Self::Done => "[DONE]",
            Self::Pending => "[PENDING]",
            Self::Skip => "[SKIP]",
        }
    }
}

/// Sources under `root` that need remuxing, sorted, excluding anything inside
/// generated `.hls` directories.
pub fn find_sources(root: &Path) -> Vec<PathBuf> {
    let mut sources: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_hls_output_dir(e.path()))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && rh_core::needs_remux(e.path()))
        .map(|e| e.into_path())
        .collect();
    sources.sort();
    sources
}

fn is_hls_output_dir(path: &Path) -> bool {
    path.is_dir()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("hls"))
}

/// Case-insensitive substring match of any pattern against `rel`.
pub fn is_skipped(rel: &str, patterns: &[String]) -> bool {
    let rel = rel.to_lowercase();
    patterns
        .iter()
        .filter(|p| !p.is_empty())
        .any(|p| rel.contains(&p.to_lowercase()))
}

/// `HH:MM:SS`, or `--:--:--` when unknown.
pub fn format_duration(secs: f64) -> String {
    if secs <= 0.0 || !secs.is_finite() {
        return "--:--:--".to_string();
    }
    let total = secs.round() as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}

pub async fn run(ctx: AppContext, root: &Path, opts: PregenOptions) -> Result<()> {
    if !root.is_dir() {
        anyhow::bail!("Directory does not exist: {}", root.display());
    }

    let sources = find_sources(root);
    println!("Found {} file(s) needing remux under {}\n", sources.len(), root.display());

    let mut pending = Vec::new();
    let mut total_secs = 0.0;
    for source in &sources {
        let rel = source
            .strip_prefix(root)
            .unwrap_or(source)
            .to_string_lossy()
            .into_owned();
        let duration = ctx
            .prober
            .duration(source)
            .await
            .unwrap_or_else(|e| {
                tracing::debug!(path = %source.display(), "Duration probe failed: {e}");
                0.0
            });

        let status = if is_skipped(&rel, &opts.skip) {
            Status::Skip
        } else if !opts.force && ctx.hls.is_ready(source) {
            Status::Done
        } else {
            Status::Pending
        };

        println!("{:<10} {}  {}", status.tag(), format_duration(duration), rel);
        if status == Status::Pending {
            total_secs += duration.max(0.0);
            pending.push(source.clone());
        }
    }

    println!(
        "\n{} to generate, {} of source material",
        pending.len(),
        format_duration(total_secs)
    );

    if opts.dry_run || pending.is_empty() {
        return Ok(());
    }

    let gen_opts = GenerateOptions {
        force: opts.force,
        timeout: opts.timeout,
    };
    let total = pending.len();
    let started = Instant::now();

    let results: Vec<(PathBuf, rh_core::Result<()>, Duration)> = stream::iter(pending)
        .map(|source| {
            let hls = std::sync::Arc::clone(&ctx.hls);
            async move {
                let file_started = Instant::now();
                tracing::info!(path = %source.display(), "Generating HLS");
                let result = hls.ensure_with(&source, gen_opts).wait().await;
                (source, result, file_started.elapsed())
            }
        })
        .buffer_unordered(opts.parallel.max(1))
        .collect()
        .await;

    let mut failed = 0usize;
    for (source, result, elapsed) in &results {
        match result {
            Ok(()) => println!(
                "✓ {} ({})",
                hls_dir_for(source).display(),
                format_duration(elapsed.as_secs_f64())
            ),
            Err(e) => {
                failed += 1;
                println!("✗ {}: {e}", source.display());
            }
        }
    }

    println!(
        "\nGenerated {}/{} in {}",
        total - failed,
        total,
        format_duration(started.elapsed().as_secs_f64())
    );

    if failed > 0 {
        anyhow::bail!("{failed} file(s) failed");
    }
    Ok(())
}
