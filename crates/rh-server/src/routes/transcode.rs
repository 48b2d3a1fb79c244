//! Remux/transcode streamer.
//!
//! Sources browsers cannot play directly are piped through ffmpeg into a
//! fragmented MP4. A `Range: bytes=N-` request restarts the encoder at
//! `N / size * duration` seconds. The encoder lives exactly as long as the
//! response body: a client disconnect closes the channel and the pump task
//! kills the process.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use axum::body::Body;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use futures::StreamExt;
use rh_core::CodecPlan;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use super::range::range_header;
use crate::context::AppContext;
use crate::error::AppError;

/// How a transcode session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Complete,
    Aborted,
    EncoderError(String),
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::Aborted => write!(f, "aborted"),
            Self::EncoderError(msg) => write!(f, "encoder_error: {msg}"),
        }
    }
}

/// Start offset requested by a `Range: bytes=N-...` header. Only the start
/// matters: the output length is unknown.
pub fn requested_offset(value: &str, size: u64) -> rh_core::Result<u64> {
    let invalid = || rh_core::Error::InvalidRange { size };
    let spec = value.trim().strip_prefix("bytes=").ok_or_else(invalid)?;
    let (start, _) = spec.split_once('-').ok_or_else(invalid)?;
    let start = start.trim();
    if start.is_empty() {
        // Suffix ranges have no meaning for a live encode; start over.
        return Ok(0);
    }
    let start: u64 = start.parse().map_err(|_| invalid())?;
    if size > 0 && start >= size {
        return Err(invalid());
    }
    Ok(start)
}

/// `offset / size * duration`, zero whenever a factor is unknown.
pub fn seek_seconds(offset: u64, size: u64, duration_secs: f64) -> f64 {
    if offset == 0 || size == 0 || duration_secs <= 0.0 || !duration_secs.is_finite() {
        return 0.0;
    }
    (offset as f64 / size as f64) * duration_secs
}

/// Stream `path` as fragmented MP4.
pub async fn stream_transcoded(
    ctx: &AppContext,
    path: &Path,
    headers: &HeaderMap,
    head: bool,
) -> Result<Response, AppError> {
    let size = tokio::fs::metadata(path).await?.len();

    let offset = match range_header(headers) {
        Some(value) => Some(requested_offset(value, size)?),
        None => None,
    };

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CACHE_CONTROL, "no-cache");

    builder = match offset {
        Some(start) if size > 0 => builder
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_RANGE, format!("bytes {start}-{}/{size}", size - 1)),
        _ => builder.status(StatusCode::OK),
    };

    if head {
        return builder
            .body(Body::empty())
            .map_err(|e| AppError::new(rh_core::Error::Internal(format!("response build: {e}"))));
    }

    let (codec, duration) = ctx.prober.codec_and_duration(path).await;
    let plan = CodecPlan::for_codec(codec.as_deref());
    let seek_secs = seek_seconds(offset.unwrap_or(0), size, duration);

    let mut child = rh_av::actions::spawn_fmp4(
        &ctx.tools,
        path,
        seek_secs,
        plan,
        &ctx.config.transcode,
    )?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| rh_core::Error::tool("ffmpeg", "stdout was not captured"))?;
    if let Some(stderr) = child.stderr.take() {
        let path = path.to_path_buf();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(path = %path.display(), "ffmpeg: {line}");
            }
        });
    }

    tracing::info!(
        path = %path.display(),
        codec = codec.as_deref().unwrap_or("unknown"),
        %plan,
        seek_secs,
        duration_secs = duration,
        "Transcode session started"
    );

    let streaming = &ctx.config.streaming;
    let (tx, rx) = mpsc::channel::<std::io::Result<Bytes>>(streaming.pipe_capacity.max(1));
    tokio::spawn(pump(
        child,
        stdout,
        tx,
        streaming.chunk_bytes.max(4096),
        path.to_path_buf(),
        ctx.shutdown.clone(),
    ));

    builder
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .map_err(|e| AppError::new(rh_core::Error::Internal(format!("response build: {e}"))))
}

/// Copy encoder stdout into the bounded response channel until the encoder
/// finishes or the receiver goes away.
async fn pump(
    mut child: Child,
    stdout: ChildStdout,
    tx: mpsc::Sender<std::io::Result<Bytes>>,
    chunk_bytes: usize,
    path: PathBuf,
    shutdown: CancellationToken,
) {
    let started = Instant::now();
    let mut reader = ReaderStream::with_capacity(stdout, chunk_bytes);
    let mut sent: u64 = 0;

    let outcome = loop {
        tokio::select! {
            _ = tx.closed() => break SessionOutcome::Aborted,
            _ = shutdown.cancelled() => break SessionOutcome::Aborted,
            chunk = reader.next() => match chunk {
                Some(Ok(bytes)) => {
                    sent += bytes.len() as u64;
                    if tx.send(Ok(bytes)).await.is_err() {
                        break SessionOutcome::Aborted;
                    }
                }
                Some(Err(e)) => {
                    let msg = format!("reading encoder output: {e}");
                    let _ = tx.send(Err(e)).await;
                    break SessionOutcome::EncoderError(msg);
                }
                None => match child.wait().await {
                    Ok(status) if status.success() => break SessionOutcome::Complete,
                    Ok(status) => {
                        let msg = format!("ffmpeg exited with {status}");
                        let _ = tx.send(Err(std::io::Error::other(msg.clone()))).await;
                        break SessionOutcome::EncoderError(msg);
                    }
                    Err(e) => {
                        let msg = format!("waiting for ffmpeg: {e}");
                        let _ = tx.send(Err(std::io::Error::other(msg.clone()))).await;
                        break SessionOutcome::EncoderError(msg);
                    }
                },
            },
        }
    };

    if outcome != SessionOutcome::Complete {
        if let Err(e) = child.kill().await {
            tracing::debug!(path = %path.display(), "Encoder already gone: {e}");
        }
    }

    match &outcome {
        SessionOutcome::EncoderError(_) => tracing::error!(
            path = %path.display(),
            status = %outcome,
            bytes = sent,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Transcode session ended"
        ),
        _ => tracing::info!(
            path = %path.display(),
            status = %outcome,
            bytes = sent,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Transcode session ended"
        ),
    }
}
