//! On-demand HLS generation with per-file deduplication.
//!
//! The manager owns a registry of in-flight generations keyed by source path.
//! The first request for a file that has no valid output spawns the encoder
//! on a detached task; every concurrent request attaches to that task and
//! waits on its state channel. Entries leave the registry when the run
//! finishes, successfully or not. The last failure per file is kept until the
//! next run for that file registers, so progress polling can report it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rh_av::actions::{count_segments, generate_hls, hls_dir_for, is_hls_ready};
use rh_av::{MediaProber, ToolRegistry};
use rh_core::config::{HlsConfig, TranscodeConfig};
use rh_core::CodecPlan;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Lifecycle of one generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "state", content = "error")]
pub enum GenerationState {
    Pending,
    Generating,
    Ready,
    Failed(String),
}

impl GenerationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed(_))
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Generating => "generating",
            Self::Ready => "ready",
            Self::Failed(_) => "failed",
        }
    }
}

/// Per-run overrides, used by the pre-generation command.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateOptions {
    /// Regenerate even when a valid playlist already exists.
    pub force: bool,
    /// Overrides the configured generation deadline.
    pub timeout: Option<Duration>,
}

/// Snapshot returned by the progress endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HlsProgress {
    pub state: &'static str,
    pub progress: u32,
    pub completed_segments: u32,
    pub estimated_segments: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct GenerationTask {
    state: watch::Sender<GenerationState>,
    cancel: CancellationToken,
    estimated_segments: AtomicU32,
}

/// Handle returned to callers that asked for a generation.
pub struct GenerationHandle {
    rx: watch::Receiver<GenerationState>,
}

impl GenerationHandle {
    fn ready() -> Self {
        let (_tx, rx) = watch::channel(GenerationState::Ready);
        Self { rx }
    }

    /// Current state without waiting.
    pub fn state(&self) -> GenerationState {
        self.rx.borrow().clone()
    }

    /// Wait until the run reaches `Ready` or `Failed`.
    pub async fn wait(mut self) -> rh_core::Result<()> {
        let state = self
            .rx
            .wait_for(GenerationState::is_terminal)
            .await
            .map(|s| s.clone())
            .map_err(|_| rh_core::Error::Internal("HLS generation task vanished".into()))?;
        match state {
            GenerationState::Failed(msg) => Err(rh_core::Error::tool("ffmpeg", msg)),
            _ => Ok(()),
        }
    }
}

/// Registry and driver for HLS generation runs.
pub struct HlsManager {
    tools: Arc<ToolRegistry>,
    prober: Arc<dyn MediaProber>,
    transcode: TranscodeConfig,
    hls: HlsConfig,
    in_flight: DashMap<PathBuf, Arc<GenerationTask>>,
    failures: DashMap<PathBuf, String>,
    shutdown: CancellationToken,
}

impl HlsManager {
    pub fn new(
        tools: Arc<ToolRegistry>,
        prober: Arc<dyn MediaProber>,
        transcode: TranscodeConfig,
        hls: HlsConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            tools,
            prober,
            transcode,
            hls,
            in_flight: DashMap::new(),
            failures: DashMap::new(),
            shutdown,
        }
    }

    pub fn config(&self) -> &HlsConfig {
        &self.hls
    }

    /// Whether `source` has a complete playlist at least as new as itself.
    pub fn is_ready(&self, source: &Path) -> bool {
        is_hls_ready(source, &hls_dir_for(source))
    }

    /// Whether a run for `source` is currently registered.
    pub fn is_generating(&self, source: &Path) -> bool {
        self.in_flight.contains_key(source)
    }

    /// Number of registered runs.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Start a generation for `source` unless valid output exists or a run is
    /// already in flight, and return a handle to whichever applies.
    pub fn ensure(self: &Arc<Self>, source: &Path) -> GenerationHandle {
        self.ensure_with(source, GenerateOptions::default())
    }

    pub fn ensure_with(self: &Arc<Self>, source: &Path, opts: GenerateOptions) -> GenerationHandle {
        if !opts.force && !self.is_generating(source) && self.is_ready(source) {
            return GenerationHandle::ready();
        }

        match self.in_flight.entry(source.to_path_buf()) {
            Entry::Occupied(e) => {
                tracing::debug!(path = %source.display(), "Attaching to in-flight HLS generation");
                GenerationHandle {
                    rx: e.get().state.subscribe(),
                }
            }
            Entry::Vacant(e) => {
                // A run may have finished between the readiness check and
                // taking the shard lock.
                if !opts.force && self.is_ready(source) {
                    return GenerationHandle::ready();
                }

                let (tx, rx) = watch::channel(GenerationState::Pending);
                let task = Arc::new(GenerationTask {
                    state: tx,
                    cancel: self.shutdown.child_token(),
                    estimated_segments: AtomicU32::new(0),
                });
                // Output from an earlier encode must not be served while
                // this run rebuilds it.
                let out_dir = hls_dir_for(source);
                if let Err(rm) = std::fs::remove_dir_all(&out_dir) {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(dir = %out_dir.display(), "Failed to clear stale HLS output: {rm}");
                    }
                }
                e.insert(task.clone());
                self.failures.remove(source);

                let manager = Arc::clone(self);
                let source = source.to_path_buf();
                tokio::spawn(async move {
                    manager.run(source, task, opts).await;
                });

                GenerationHandle { rx }
            }
        }
    }

    /// Ensure and wait for the playlist to be ready.
    pub async fn wait_ready(self: &Arc<Self>, source: &Path) -> rh_core::Result<()> {
        self.ensure(source).wait().await
    }

    /// Progress snapshot for `source`. Never starts a generation.
    pub fn progress(&self, source: &Path) -> HlsProgress {
        let dir = hls_dir_for(source);
        let completed = count_segments(&dir);

        if let Some(task) = self.in_flight.get(source).map(|t| Arc::clone(t.value())) {
            let state = task.state.borrow().clone();
            let estimated = task.estimated_segments.load(Ordering::Relaxed);
            let progress = match &state {
                GenerationState::Ready => 100,
                _ => generating_percent(completed, estimated),
            };
            return HlsProgress {
                state: state.label(),
                progress,
                completed_segments: completed,
                estimated_segments: estimated,
                error: match state {
                    GenerationState::Failed(msg) => Some(msg),
                    _ => None,
                },
            };
        }

        if let Some(error) = self.failures.get(source).map(|f| f.value().clone()) {
            return HlsProgress {
                state: GenerationState::Failed(String::new()).label(),
                progress: 0,
                completed_segments: completed,
                estimated_segments: 0,
                error: Some(error),
            };
        }

        if self.is_ready(source) {
            HlsProgress {
                state: GenerationState::Ready.label(),
                progress: 100,
                completed_segments: completed,
                estimated_segments: completed,
                error: None,
            }
        } else {
            HlsProgress {
                state: GenerationState::Pending.label(),
                progress: 0,
                completed_segments: 0,
                estimated_segments: 0,
                error: None,
            }
        }
    }

    async fn run(self: Arc<Self>, source: PathBuf, task: Arc<GenerationTask>, opts: GenerateOptions) {
        task.state.send_replace(GenerationState::Generating);

        let (codec, duration) = self.prober.codec_and_duration(&source).await;
        let plan = CodecPlan::for_codec(codec.as_deref());
        task.estimated_segments.store(
            estimated_segments(duration, self.hls.segment_secs),
            Ordering::Relaxed,
        );

        let mut hls = self.hls.clone();
        if let Some(timeout) = opts.timeout {
            hls.generation_timeout_secs = Some(timeout.as_secs().max(1));
        }

        let out_dir = hls_dir_for(&source);
        let result = generate_hls(
            &self.tools,
            &source,
            &out_dir,
            plan,
            &self.transcode,
            &hls,
            duration,
            task.cancel.clone(),
        )
        .await
        .and_then(|()| {
            if is_hls_ready(&source, &out_dir) {
                Ok(())
            } else {
                Err(rh_core::Error::tool("ffmpeg", "playlist incomplete after encoder exit"))
            }
        });

        let state = match result {
            Ok(()) => {
                tracing::info!(path = %source.display(), %plan, "HLS output ready");
                GenerationState::Ready
            }
            Err(e) => {
                tracing::error!(path = %source.display(), error = %e, "HLS generation failed");
                if let Err(rm) = tokio::fs::remove_dir_all(&out_dir).await {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(dir = %out_dir.display(), "Failed to remove partial HLS output: {rm}");
                    }
                }
                GenerationState::Failed(e.to_string())
            }
        };

        if let GenerationState::Failed(msg) = &state {
            self.failures.insert(source.clone(), msg.clone());
        }

        // Publish before deregistering so attached waiters see the outcome.
        task.state.send_replace(state);
        self.in_flight
            .remove_if(&source, |_, registered| Arc::ptr_eq(registered, &task));
    }
}

/// `ceil(duration / segment_secs)`, zero when either is unknown.
pub fn estimated_segments(duration_secs: f64, segment_secs: u32) -> u32 {
    if duration_secs <= 0.0 || !duration_secs.is_finite() || segment_secs == 0 {
        return 0;
    }
    (duration_secs / f64::from(segment_secs)).ceil() as u32
}

/// `min(99, round(completed / estimated * 100))`; 100 is reserved for a
/// validated playlist.
pub fn generating_percent(completed: u32, estimated: u32) -> u32 {
    if estimated == 0 {
        return 0;
    }
    let pct = (f64::from(completed) / f64::from(estimated) * 100.0).round() as u32;
    pct.min(99)
}
