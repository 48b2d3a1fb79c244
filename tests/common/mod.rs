//! Shared test harness for integration tests.
//!
//! [`TestHarness`] builds an [`AppContext`] over a temporary media root, a
//! [`StubProber`] and a fake `ffmpeg` shell script, then serves the router on
//! a random port. Every script invocation appends its arguments to
//! `calls.log` so tests can assert on what was spawned.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use rh_av::{MediaProber, SubtitleTrack, ToolRegistry};
use rh_core::config::Config;
use rh_server::context::AppContext;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Fake ffmpeg covering the three invocation shapes the server uses.
pub const FAKE_FFMPEG: &str = r#"#!/bin/sh
echo "$*" >> "$(dirname "$0")/calls.log"
case "$*" in
  *"-f hls"*)
    for a; do last="$a"; done
    dir=$(dirname "$last")
    sleep 0.3
    printf 'segment-0' > "$dir/segment000.ts"
    printf 'segment-1' > "$dir/segment001.ts"
    printf '#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXTINF:6.0,\nsegment000.ts\n#EXTINF:6.0,\nsegment001.ts\n#EXT-X-ENDLIST\n' > "$last"
    echo "out_time_us=12000000" >&2
    echo "progress=end" >&2
    ;;
  *"-f ass"*)
    printf '[Script Info]\nTitle: test\n\n[Events]\nFormat: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\nDialogue: 0,0:00:01.00,0:00:02.50,Default,,0,0,0,,Hello {\\i1}there{\\i0}\n'
    ;;
  *"-f mp4"*)
    printf 'fmp4-bytes'
    ;;
esac
"#;

/// Fake ffmpeg whose every run fails.
pub const FAILING_FFMPEG: &str = r#"#!/bin/sh
echo "$*" >> "$(dirname "$0")/calls.log"
for a; do last="$a"; done
case "$*" in
  *"-f hls"*)
    dir=$(dirname "$last")
    printf 'partial' > "$dir/segment000.ts"
    ;;
esac
echo "Conversion failed!" >&2
exit 1
"#;

/// Canned probe results.
#[derive(Clone, Default)]
pub struct StubProber {
    pub codec: Option<String>,
    pub duration: f64,
    pub tracks: Vec<SubtitleTrack>,
}

impl StubProber {
    pub fn codec(codec: &str, duration: f64) -> Self {
        Self {
            codec: Some(codec.to_string()),
            duration,
            tracks: Vec::new(),
        }
    }

    pub fn with_tracks(mut self, tracks: Vec<SubtitleTrack>) -> Self {
        self.tracks = tracks;
        self
    }
}

#[async_trait]
impl MediaProber for StubProber {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn video_codec(&self, _path: &Path) -> rh_core::Result<String> {
        self.codec
            .clone()
            .ok_or_else(|| rh_core::Error::Probe("no video stream".into()))
    }

    async fn duration(&self, _path: &Path) -> rh_core::Result<f64> {
        Ok(self.duration)
    }

    async fn subtitle_tracks(&self, _path: &Path) -> rh_core::Result<Vec<SubtitleTrack>> {
        Ok(self.tracks.clone())
    }
}

/// Running server plus the temporary directories backing it.
pub struct TestHarness {
    pub ctx: AppContext,
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    pub media: TempDir,
    pub bin: TempDir,
}

impl TestHarness {
    pub async fn start(prober: StubProber) -> Self {
        Self::start_with(prober, FAKE_FFMPEG, |_| {}).await
    }

    /// Start with a custom ffmpeg script and a hook to adjust the config.
    pub async fn start_with(
        prober: StubProber,
        ffmpeg_script: &str,
        configure: impl FnOnce(&mut Config),
    ) -> Self {
        let media = tempfile::tempdir().expect("failed to create media root");
        let bin = tempfile::tempdir().expect("failed to create tool dir");

        let ffmpeg = write_script(bin.path(), "ffmpeg", ffmpeg_script);
        let tools = Arc::new(ToolRegistry::with_paths(ffmpeg, bin.path().join("ffprobe")));

        let mut config = Config::default();
        config.server.media_root = media.path().to_path_buf();
        config.hls.poll_interval_ms = 20;
        config.hls.segment_wait_secs = 5;
        config.streaming.prefix_bytes = 1024;
        configure(&mut config);

        let ctx = AppContext::new(config, tools, Arc::new(prober), CancellationToken::new());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        let server_ctx = ctx.clone();
        tokio::spawn(async move {
            rh_server::serve(listener, server_ctx).await.ok();
        });

        Self {
            ctx,
            addr,
            client: reqwest::Client::new(),
            media,
            bin,
        }
    }

    /// Write a file under the media root, creating parent directories.
    pub fn media_file(&self, rel: &str, contents: &[u8]) -> PathBuf {
        let path = self.media.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create media dir");
        }
        std::fs::write(&path, contents).expect("failed to write media file");
        path
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Argument lines of every ffmpeg invocation so far.
    pub fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.bin.path().join("calls.log"))
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Wait for finished generations to leave the registry.
    pub async fn wait_idle(&self) {
        for _ in 0..100 {
            if self.ctx.hls.in_flight_count() == 0 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("HLS generation still in flight");
    }

    pub fn hls_calls(&self) -> usize {
        self.calls().iter().filter(|c| c.contains("-f hls")).count()
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.ctx.shutdown.cancel();
    }
}

pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("failed to write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("failed to chmod script");
    path
}
