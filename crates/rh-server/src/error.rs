//! Error-to-HTTP response conversion.
//!
//! Wraps [`rh_core::Error`] so route handlers can return
//! `Result<Response, AppError>` and use `?` on core results directly.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: rh_core::Error,
}

impl AppError {
    pub fn new(inner: rh_core::Error) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &rh_core::Error {
        &self.inner
    }
}

impl From<rh_core::Error> for AppError {
    fn from(e: rh_core::Error) -> Self {
        Self::new(e)
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.inner,
                "Server error in handler"
            );
        } else {
            tracing::debug!(status = %status, error = %self.inner, "Request rejected");
        }

        let code = match &self.inner {
            rh_core::Error::NotFound { .. } => "not_found",
            rh_core::Error::Validation(_) => "validation_error",
            rh_core::Error::InvalidRange { .. } => "range_not_satisfiable",
            rh_core::Error::Io { .. } => "io_error",
            rh_core::Error::Tool { .. } => "tool_error",
            rh_core::Error::Probe(_) => "probe_error",
            rh_core::Error::Internal(_) => "internal_error",
        };

        let body = json!({
            "error": self.inner.to_string(),
            "code": code,
        });

        let mut response = (status, axum::Json(body)).into_response();

        if let rh_core::Error::InvalidRange { size } = &self.inner {
            if let Ok(v) = HeaderValue::from_str(&format!("bytes */{size}")) {
                response.headers_mut().insert(header::CONTENT_RANGE, v);
            }
        }

        response
    }
}
