//! `/media/{*path}` dispatcher.
//!
//! Every request is routed to exactly one of: HLS companion files, embedded
//! subtitle extraction, the remux/transcode streamer, or the plain byte-range
//! file responder.

use std::path::{Component, Path, PathBuf};

use axum::extract::{Path as UrlPath, Query, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use rh_core::MediaKind;
use serde::Deserialize;

use super::hls::{self, HlsAsset};
use super::subtitles::{self, SubtitleSelector};
use super::{range, transcode};
use crate::context::AppContext;
use crate::error::AppError;

#[derive(Debug, Default, Deserialize)]
pub struct MediaQuery {
    /// `auto` or an absolute stream index.
    pub subtitle: Option<String>,
}

/// Join a request path onto the media root, refusing anything that could
/// step outside it.
pub fn resolve_media_path(root: &Path, rel: &str) -> rh_core::Result<PathBuf> {
    let mut resolved = root.to_path_buf();
    let mut depth = 0usize;

    for component in Path::new(rel).components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(rh_core::Error::Validation(format!(
                    "path {rel:?} escapes the media root"
                )));
            }
        }
    }

    if depth == 0 {
        return Err(rh_core::Error::Validation("empty media path".into()));
    }
    Ok(resolved)
}

/// `GET`/`HEAD /media/{*path}`
pub async fn media(
    State(ctx): State<AppContext>,
    method: Method,
    UrlPath(rel): UrlPath<String>,
    Query(query): Query<MediaQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let head = method == Method::HEAD;
    let root = &ctx.config.server.media_root;

    if let Some((source_rel, name)) = hls::split_companion(&rel) {
        let source = resolve_media_path(root, source_rel)?;
        let asset = HlsAsset::parse(name)
            .ok_or_else(|| rh_core::Error::not_found("HLS asset", name))?;
        if !source.is_file() {
            return Err(rh_core::Error::not_found("file", source_rel).into());
        }
        return hls::serve(&ctx, &source, asset, head).await;
    }

    let path = resolve_media_path(root, &rel)?;

    if !path.is_file() {
        if MediaKind::from_path(&path) == MediaKind::Subtitle
            && path
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case("vtt"))
        {
            if let Some(response) = subtitles::srt_sidecar(&path).await {
                return response;
            }
        }
        return Err(rh_core::Error::not_found("file", rel).into());
    }

    if let Some(value) = query.subtitle.as_deref() {
        let selector = SubtitleSelector::parse(value)?;
        return subtitles::extract(&ctx, &path, selector).await;
    }

    if rh_core::needs_remux(&path) {
        return transcode::stream_transcoded(&ctx, &path, &headers, head).await;
    }

    range::serve_file(&path, &headers, head, &ctx.config.streaming).await
}

/// `OPTIONS /media/{*path}` outside of CORS preflight.
pub async fn media_options() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [
            (header::ALLOW, "GET, HEAD, OPTIONS"),
            (header::ACCEPT_RANGES, "bytes"),
        ],
    )
}
