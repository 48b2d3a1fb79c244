mod cli;
mod pregen;
mod subs;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use rh_av::{FfprobeProber, MediaProber, ToolRegistry};
use rh_core::config::Config;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn serve(
    config_path: Option<&Path>,
    host: Option<String>,
    port: Option<u16>,
    media_root: Option<PathBuf>,
) -> Result<()> {
    let mut config = Config::load_or_default(config_path);

    // CLI flags win over the config file
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(root) = media_root {
        config.server.media_root = root;
    }

    tracing::info!("Starting reelhouse {}", env!("CARGO_PKG_VERSION"));
    rh_server::start(config, CancellationToken::new()).await?;
    Ok(())
}

async fn pregen_command(
    config_path: Option<&Path>,
    dir: Option<PathBuf>,
    opts: pregen::PregenOptions,
) -> Result<()> {
    let config = Config::load_or_default(config_path);
    let root = dir.unwrap_or_else(|| config.server.media_root.clone());

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; cancelling running encodes");
            on_signal.cancel();
        }
    });

    let ctx = rh_server::build_context(config, shutdown);
    pregen::run(ctx, &root, opts).await
}

async fn probe_file(config_path: Option<&Path>, file: &Path, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = Config::load_or_default(config_path);
    let prober = FfprobeProber::new(ToolRegistry::discover(&config.tools));
    let report = prober.report(file).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("File: {}", file.display());
    println!(
        "Video codec: {}",
        report.video_codec.as_deref().unwrap_or("unknown")
    );
    println!("Duration: {}", pregen::format_duration(report.duration_secs));
    println!("Plan: {}", report.plan);

    println!("\nSubtitle Tracks: {}", report.subtitle_tracks.len());
    let preferred = rh_av::subtitle::select_preferred(&report.subtitle_tracks).map(|t| t.index);
    for track in &report.subtitle_tracks {
        print!("  [{}] {}", track.index, track.language);
        if let Some(ref codec) = track.codec {
            print!(" {}", codec);
        }
        if let Some(ref title) = track.title {
            print!(" \"{}\"", title);
        }
        if preferred == Some(track.index) {
            print!(" [preferred]");
        }
        println!();
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = Config::load_or_default(config_path);
    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
        Ok(())
    } else {
        anyhow::bail!("ffmpeg and ffprobe are both required for remux, transcode and HLS")
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let contents = std::fs::read_to_string(p)?;
            Config::from_json(&contents)?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("✓ Configuration is valid");
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Media root: {}", config.server.media_root.display());
    println!("  HLS segment length: {}s", config.hls.segment_secs);

    let warnings = config.validate();
    for warning in &warnings {
        println!("  ! {}", warning);
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "reelhouse=trace,rh_server=trace,rh_av=trace,rh_core=trace,tower_http=debug".to_string()
        } else {
            "reelhouse=debug,rh_server=debug,rh_av=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Serve {
            host,
            port,
            media_root,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(serve(config_path, host, port, media_root))
        }
        Commands::Pregen {
            dir,
            force,
            skip,
            parallel,
            dry_run,
            timeout,
        } => {
            let opts = pregen::PregenOptions {
                force,
                skip,
                parallel,
                dry_run,
                timeout: timeout.map(|m| Duration::from_secs(m.saturating_mul(60))),
            };
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(pregen_command(config_path, dir, opts))
        }
        Commands::Probe { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(config_path, &file, json))
        }
        Commands::CheckTools => check_tools(config_path),
        Commands::ConvertSubs { dir } => {
            let root = dir.unwrap_or_else(|| Config::load_or_default(config_path).server.media_root);
            let count = subs::convert_all(&root)?;
            println!("\nConverted {} subtitle file(s)", count);
            Ok(())
        }
        Commands::Validate => validate_config(config_path),
        Commands::Version => {
            println!("reelhouse {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
