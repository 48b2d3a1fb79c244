//! Axum router construction.

use axum::http::{header, HeaderName, Method};
use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::middleware::request_id::{request_id_middleware, X_REQUEST_ID};
use crate::routes;

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers([
            header::CONTENT_LENGTH,
            header::CONTENT_RANGE,
            header::ACCEPT_RANGES,
            HeaderName::clone(&X_REQUEST_ID),
        ]);

    let api = Router::new().route(
        "/subtitles/{*path}",
        get(routes::subtitles::list_tracks),
    );

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route(
            "/media/{*path}",
            get(routes::media::media)
                .head(routes::media::media)
                .options(routes::media::media_options),
        )
        .nest("/api", api)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
