//! Byte-range file responder.
//!
//! Serves any file on disk with `Range: bytes=` support. Media files
//! (audio/video) advertise `Accept-Ranges` and, when requested without a
//! range, are answered with a leading prefix once they exceed the configured
//! size so players switch to ranged reads early.

use std::io::SeekFrom;
use std::path::Path;

use axum::body::Body;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use rh_core::config::StreamingConfig;
use rh_core::MediaKind;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::error::AppError;

/// Parse a `Range` header value against a resource of `size` bytes into an
/// inclusive `(start, end)` pair.
///
/// Supports `bytes=a-b`, open-ended `bytes=a-` and suffix `bytes=-n`. Only the
/// first range of a multi-range request is honoured. Anything malformed or
/// outside `0 <= start <= end < size` is [`rh_core::Error::InvalidRange`].
pub fn parse_range(value: &str, size: u64) -> rh_core::Result<(u64, u64)> {
    let invalid = || rh_core::Error::InvalidRange { size };

    let spec = value.trim().strip_prefix("bytes=").ok_or_else(invalid)?;
    let first = spec.split(',').next().unwrap_or_default().trim();
    let (start_s, end_s) = first.split_once('-').ok_or_else(invalid)?;
    let (start_s, end_s) = (start_s.trim(), end_s.trim());

    let (start, end) = if start_s.is_empty() {
        let suffix: u64 = end_s.parse().map_err(|_| invalid())?;
        if suffix == 0 || size == 0 {
            return Err(invalid());
        }
        (size.saturating_sub(suffix), size - 1)
    } else {
        let start: u64 = start_s.parse().map_err(|_| invalid())?;
        let end: u64 = if end_s.is_empty() {
            size.checked_sub(1).ok_or_else(invalid)?
        } else {
            end_s.parse().map_err(|_| invalid())?
        };
        (start, end)
    };

    if start > end || end >= size {
        return Err(invalid());
    }
    Ok((start, end))
}

/// Extract the raw `Range` header, if any.
pub fn range_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::RANGE).and_then(|v| v.to_str().ok())
}

/// Serve `path` honouring `Range`. `head` suppresses the body but keeps
/// every header.
pub async fn serve_file(
    path: &Path,
    headers: &HeaderMap,
    head: bool,
    streaming: &StreamingConfig,
) -> Result<Response, AppError> {
    let mut file = tokio::fs::File::open(path).await?;
    let size = file.metadata().await?.len();

    let is_media = MediaKind::from_path(path).is_media();
    let content_type = rh_core::content_type(path);

    let builder = Response::builder().header(header::CONTENT_TYPE, content_type);

    let (builder, start, len) = match range_header(headers) {
        Some(value) => {
            let (start, end) = parse_range(value, size)?;
            let builder = builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::ACCEPT_RANGES, "bytes")
                .header(header::CONTENT_RANGE, format!("bytes {start}-{end}/{size}"));
            (builder, start, end - start + 1)
        }
        None if head => {
            let builder = builder
                .status(StatusCode::OK)
                .header(header::ACCEPT_RANGES, "bytes");
            (builder, 0, size)
        }
        None if is_media && size > streaming.prefix_bytes && streaming.prefix_bytes > 0 => {
            let len = streaming.prefix_bytes;
            let builder = builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::ACCEPT_RANGES, "bytes")
                .header(header::CONTENT_RANGE, format!("bytes 0-{}/{size}", len - 1));
            (builder, 0, len)
        }
        None if is_media => {
            let builder = builder
                .status(StatusCode::OK)
                .header(header::ACCEPT_RANGES, "bytes");
            (builder, 0, size)
        }
        None => (builder.status(StatusCode::OK), 0, size),
    };

    let builder = builder.header(header::CONTENT_LENGTH, len);

    let body = if head || len == 0 {
        Body::empty()
    } else {
        if start > 0 {
            file.seek(SeekFrom::Start(start)).await?;
        }
        let reader = file.take(len);
        Body::from_stream(ReaderStream::with_capacity(reader, streaming.chunk_bytes.max(4096)))
    };

    tracing::debug!(
        path = %path.display(),
        start,
        len,
        size,
        head,
        "Serving file"
    );

    builder
        .body(body)
        .map_err(|e| AppError::new(rh_core::Error::Internal(format!("response build: {e}"))))
}
