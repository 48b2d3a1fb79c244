//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries all
//! sub-configs for the server, external tools, streaming, transcoding and HLS
//! generation. Every section defaults sensibly so a completely empty `{}` file
//! is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub tools: ToolsConfig,
    pub streaming: StreamingConfig,
    pub transcode: TranscodeConfig,
    pub hls: HlsConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if !self.server.media_root.exists() {
            warnings.push(format!(
                "server.media_root {} does not exist",
                self.server.media_root.display()
            ));
        }

        if self.hls.segment_secs == 0 {
            warnings.push("hls.segment_secs is 0; ffmpeg will pick its own length".into());
        }

        if self.streaming.pipe_capacity == 0 {
            warnings.push("streaming.pipe_capacity is 0; using 1".into());
        }

        if self.transcode.video_crf > 51 {
            warnings.push(format!(
                "transcode.video_crf {} is outside the x264 range 0-51",
                self.transcode.video_crf
            ));
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory that `/media/{path}` requests are resolved against.
    pub media_root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            media_root: PathBuf::from("./media"),
        }
    }
}

/// Paths to external CLI tools and the deadline applied to probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    /// Deadline for a single ffprobe invocation. `None` waits forever.
    pub probe_timeout_secs: Option<u64>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            probe_timeout_secs: Some(30),
        }
    }
}

impl ToolsConfig {
    pub fn probe_timeout(&self) -> Option<Duration> {
        self.probe_timeout_secs.map(Duration::from_secs)
    }
}

/// Byte-range serving and pipe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Un-ranged media requests for files up to this size are answered in
    /// full; larger files get a `206` carrying only this many leading bytes.
    pub prefix_bytes: u64,
    /// Number of chunks buffered between the encoder pipe and the socket.
    pub pipe_capacity: usize,
    /// Read size for file and pipe streaming.
    pub chunk_bytes: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            prefix_bytes: 1024 * 1024,
            pipe_capacity: 16,
            chunk_bytes: 64 * 1024,
        }
    }
}

/// Encoder settings for the fragmented-MP4 pipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    pub video_preset: String,
    pub video_crf: u32,
    pub audio_bitrate: String,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            video_preset: "veryfast".into(),
            video_crf: 23,
            audio_bitrate: "192k".into(),
        }
    }
}

/// HLS generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HlsConfig {
    pub segment_secs: u32,
    /// Upper bound on how long a segment request waits for the file.
    pub segment_wait_secs: u64,
    pub poll_interval_ms: u64,
    pub audio_sample_rate: u32,
    /// Optional `-tune` passed to libx264 (e.g. "animation", "film").
    pub video_tune: Option<String>,
    /// Optional deadline for a whole generation run.
    pub generation_timeout_secs: Option<u64>,
}

impl Default for HlsConfig {
    fn default() -> Self {
        Self {
            segment_secs: 6,
            segment_wait_secs: 30,
            poll_interval_ms: 500,
            audio_sample_rate: 48_000,
            video_tune: None,
            generation_timeout_secs: None,
        }
    }
}

impl HlsConfig {
    pub fn segment_wait(&self) -> Duration {
        Duration::from_secs(self.segment_wait_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }

    pub fn generation_timeout(&self) -> Option<Duration> {
        self.generation_timeout_secs.map(Duration::from_secs)
    }
}
