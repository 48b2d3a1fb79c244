//! `/media/{path}.hls/{playlist.m3u8 | segmentNNN.ts | progress}`.

use std::path::Path;
use std::time::Instant;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rh_av::actions::{hls_dir_for, PLAYLIST_NAME};
use tokio_util::io::ReaderStream;

use crate::context::AppContext;
use crate::error::AppError;
use crate::hls_manager::GenerationState;

const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
const SEGMENT_CACHE_CONTROL: &str = "public, max-age=3600";

/// A file requested inside a `<source>.hls/` directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HlsAsset {
    Playlist,
    Segment(String),
    Progress,
}

impl HlsAsset {
    /// Classify the final path component. Unknown names are `None`.
    pub fn parse(name: &str) -> Option<Self> {
        if name == PLAYLIST_NAME {
            return Some(Self::Playlist);
        }
        if name == "progress" {
            return Some(Self::Progress);
        }
        let digits = name.strip_prefix("segment")?.strip_suffix(".ts")?;
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self::Segment(name.to_string()))
        } else {
            None
        }
    }
}

/// Split `show/ep.mkv.hls/playlist.m3u8` into the source relative path and the
/// asset name. Returns `None` when the path is not an HLS companion path.
pub fn split_companion(rel: &str) -> Option<(&str, &str)> {
    let (dir, name) = rel.rsplit_once('/')?;
    let source = dir.strip_suffix(".hls")?;
    if source.is_empty() || name.is_empty() {
        return None;
    }
    Some((source, name))
}

pub async fn serve(
    ctx: &AppContext,
    source: &Path,
    asset: HlsAsset,
    head: bool,
) -> Result<Response, AppError> {
    match asset {
        HlsAsset::Playlist => playlist(ctx, source, head).await,
        HlsAsset::Segment(name) => segment(ctx, source, &name, head).await,
        HlsAsset::Progress => Ok(Json(ctx.hls.progress(source)).into_response()),
    }
}

async fn playlist(ctx: &AppContext, source: &Path, head: bool) -> Result<Response, AppError> {
    let started = Instant::now();
    ctx.hls.wait_ready(source).await?;
    tracing::debug!(
        path = %source.display(),
        waited_ms = started.elapsed().as_millis() as u64,
        "Playlist ready"
    );

    let text = tokio::fs::read_to_string(hls_dir_for(source).join(PLAYLIST_NAME)).await?;
    let len = text.len();
    let body = if head { Body::empty() } else { Body::from(text) };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, PLAYLIST_CONTENT_TYPE)
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONTENT_LENGTH, len)
        .body(body)
        .map_err(|e| AppError::new(rh_core::Error::Internal(format!("response build: {e}"))))
}

async fn segment(
    ctx: &AppContext,
    source: &Path,
    name: &str,
    head: bool,
) -> Result<Response, AppError> {
    let segment_path = hls_dir_for(source).join(name);
    let stale = !ctx.hls.is_generating(source) && !ctx.hls.is_ready(source);

    if stale || !segment_path.is_file() {
        // Kick off (or attach to) generation so the segment can appear.
        let handle = ctx.hls.ensure(source);
        let cfg = ctx.hls.config();
        let deadline = Instant::now() + cfg.segment_wait();

        loop {
            if segment_path.is_file() {
                break;
            }
            match handle.state() {
                GenerationState::Failed(_) | GenerationState::Ready => {
                    if segment_path.is_file() {
                        break;
                    }
                    tracing::debug!(
                        path = %source.display(),
                        segment = name,
                        "Segment absent after generation ended"
                    );
                    return Err(rh_core::Error::not_found("segment", name).into());
                }
                GenerationState::Pending | GenerationState::Generating => {}
            }
            if Instant::now() >= deadline {
                tracing::debug!(path = %source.display(), segment = name, "Segment wait timed out");
                return Err(rh_core::Error::not_found("segment", name).into());
            }
            tokio::time::sleep(cfg.poll_interval()).await;
        }
    }

    let file = tokio::fs::File::open(&segment_path).await?;
    let len = file.metadata().await?.len();
    let body = if head {
        Body::empty()
    } else {
        Body::from_stream(ReaderStream::with_capacity(
            file,
            ctx.config.streaming.chunk_bytes.max(4096),
        ))
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp2t")
        .header(header::CACHE_CONTROL, SEGMENT_CACHE_CONTROL)
        .header(header::CONTENT_LENGTH, len)
        .body(body)
        .map_err(|e| AppError::new(rh_core::Error::Internal(format!("response build: {e}"))))
}
