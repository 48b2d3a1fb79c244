//! Shared application state.
//!
//! [`AppContext`] is handed to every route handler via Axum state. It only
//! holds `Arc`s and a cancellation token, so cloning is cheap.

use std::sync::Arc;

use rh_av::{MediaProber, ToolRegistry};
use rh_core::config::Config;
use tokio_util::sync::CancellationToken;

use crate::hls_manager::HlsManager;

/// Application context shared by all request handlers.
#[derive(Clone)]
pub struct AppContext {
    /// Immutable application configuration snapshot.
    pub config: Arc<Config>,
    /// External tool registry.
    pub tools: Arc<ToolRegistry>,
    /// Media prober (ffprobe in production).
    pub prober: Arc<dyn MediaProber>,
    /// HLS generation registry.
    pub hls: Arc<HlsManager>,
    /// Fired on server shutdown; parents every HLS generation token.
    pub shutdown: CancellationToken,
}

impl AppContext {
    pub fn new(
        config: Config,
        tools: Arc<ToolRegistry>,
        prober: Arc<dyn MediaProber>,
        shutdown: CancellationToken,
    ) -> Self {
        let hls = Arc::new(HlsManager::new(
            Arc::clone(&tools),
            Arc::clone(&prober),
            config.transcode.clone(),
            config.hls.clone(),
            shutdown.clone(),
        ));
        Self {
            config: Arc::new(config),
            tools,
            prober,
            hls,
            shutdown,
        }
    }
}
