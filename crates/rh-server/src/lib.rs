//! rh-server: HTTP surface of the streaming engine.
//!
//! - `/media/{*path}` dispatches each request to the byte-range responder,
//!   the fragmented-MP4 streamer, HLS generation or subtitle extraction
//! - [`hls_manager::HlsManager`] deduplicates HLS work per source file
//! - Graceful shutdown cancels in-flight HLS generation

pub mod context;
pub mod error;
pub mod hls_manager;
pub mod middleware;
pub mod router;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use rh_av::{FfprobeProber, ToolRegistry};
use rh_core::config::Config;
use tokio_util::sync::CancellationToken;

use crate::context::AppContext;

/// Build the production [`AppContext`]: discover tools and wire up ffprobe.
pub fn build_context(config: Config, shutdown: CancellationToken) -> AppContext {
    let tools = Arc::new(ToolRegistry::discover(&config.tools));
    for info in tools.check_all() {
        if info.available {
            tracing::info!(
                "Tool found: {} ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            tracing::warn!("Tool not found: {}; streaming that needs it will fail", info.name);
        }
    }

    let prober = Arc::new(FfprobeProber::new(ToolRegistry::clone(&tools)));
    AppContext::new(config, tools, prober, shutdown)
}

/// Start the server and run until a shutdown signal arrives or `shutdown` is
/// cancelled.
pub async fn start(config: Config, shutdown: CancellationToken) -> rh_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| rh_core::Error::Internal(format!("Invalid server address: {e}")))?;

    tracing::info!(
        media_root = %config.server.media_root.display(),
        "Starting server on {addr}"
    );

    let ctx = build_context(config, shutdown.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| rh_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;

    serve(listener, ctx).await
}

/// Serve the router on an already-bound listener until shutdown.
pub async fn serve(listener: tokio::net::TcpListener, ctx: AppContext) -> rh_core::Result<()> {
    let shutdown = ctx.shutdown.clone();
    let app = router::build_router(ctx);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .map_err(|e| rh_core::Error::Internal(format!("server error: {e}")))?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for SIGINT, SIGTERM, or cancellation of `cancel`, then cancel it so
/// encoders and open streams wind down before connections drain.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
    cancel.cancel();
}
