//! Subtitle endpoints: embedded extraction, track listing and on-the-fly
//! SRT sidecar conversion.

use std::path::Path;

use axum::extract::{Path as UrlPath, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rh_av::subtitle::{select_preferred, srt_to_vtt};
use rh_av::SubtitleTrack;
use serde::Serialize;

use super::media::resolve_media_path;
use crate::context::AppContext;
use crate::error::AppError;

const VTT_CONTENT_TYPE: &str = "text/vtt; charset=utf-8";

/// Value of the `subtitle=` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleSelector {
    Auto,
    Index(u32),
}

impl SubtitleSelector {
    pub fn parse(value: &str) -> rh_core::Result<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        value
            .parse::<u32>()
            .map(Self::Index)
            .map_err(|_| rh_core::Error::Validation(format!("invalid subtitle selector {value:?}")))
    }
}

/// Extract one embedded stream from `path` and answer it as WebVTT.
pub async fn extract(
    ctx: &AppContext,
    path: &Path,
    selector: SubtitleSelector,
) -> Result<Response, AppError> {
    let index = match selector {
        SubtitleSelector::Index(i) => i,
        SubtitleSelector::Auto => {
            let tracks = ctx.prober.subtitle_tracks_or_empty(path).await;
            let track = select_preferred(&tracks).ok_or_else(|| {
                rh_core::Error::not_found("subtitle track", path.display())
            })?;
            tracing::debug!(
                path = %path.display(),
                index = track.index,
                language = %track.language,
                "Auto-selected subtitle track"
            );
            track.index
        }
    };

    let vtt = rh_av::actions::extract_subtitle_vtt(&ctx.tools, path, index).await?;
    Ok(vtt_response(vtt))
}

/// Answer a missing `foo.vtt` from its `foo.srt` sibling, if there is one.
pub async fn srt_sidecar(vtt_path: &Path) -> Option<Result<Response, AppError>> {
    let srt_path = vtt_path.with_extension("srt");
    if !srt_path.is_file() {
        return None;
    }
    tracing::debug!(path = %srt_path.display(), "Converting SRT sidecar on the fly");
    Some(
        tokio::fs::read(&srt_path)
            .await
            .map(|raw| vtt_response(srt_to_vtt(&String::from_utf8_lossy(&raw))))
            .map_err(AppError::from),
    )
}

fn vtt_response(vtt: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, VTT_CONTENT_TYPE)],
        vtt,
    )
        .into_response()
}

#[derive(Debug, Serialize)]
pub struct TrackListing {
    pub tracks: Vec<SubtitleTrack>,
    pub preferred: Option<u32>,
}

/// `GET /api/subtitles/{*path}`
pub async fn list_tracks(
    State(ctx): State<AppContext>,
    UrlPath(rel): UrlPath<String>,
) -> Result<Json<TrackListing>, AppError> {
    let path = resolve_media_path(&ctx.config.server.media_root, &rel)?;
    if !path.is_file() {
        return Err(rh_core::Error::not_found("file", rel).into());
    }
    let tracks = ctx.prober.subtitle_tracks_or_empty(&path).await;
    let preferred = select_preferred(&tracks).map(|t| t.index);
    Ok(Json(TrackListing { tracks, preferred }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_parsing() {
        assert_eq!(SubtitleSelector::parse("auto").unwrap(), SubtitleSelector::Auto);
        assert_eq!(SubtitleSelector::parse("AUTO").unwrap(), SubtitleSelector::Auto);
        assert_eq!(SubtitleSelector::parse("3").unwrap(), SubtitleSelector::Index(3));
        let err = SubtitleSelector::parse("english").unwrap_err();
        assert_eq!(err.http_status(), 400);
        assert!(SubtitleSelector::parse("-1").is_err());
    }

    #[tokio::test]
    async fn sidecar_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let vtt = dir.path().join("ep.vtt");
        assert!(srt_sidecar(&vtt).await.is_none());

        std::fs::write(dir.path().join("ep.srt"), "1\n00:00:01,000 --> 00:00:02,000\nHi\n").unwrap();
        let response = srt_sidecar(&vtt).await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], VTT_CONTENT_TYPE);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nHi\n");
    }
}
