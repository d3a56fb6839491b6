//! API routes.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::delivery::{get_download_url, get_play_url};
use crate::handlers::manifest::build_manifest;
use crate::handlers::stream::stream_track;
use crate::handlers::{health, ready};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging, security_headers};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let track_routes = Router::new()
        // In-process range streaming
        .route("/tracks/:track_id/stream", get(stream_track))
        // Presigned playback URL
        .route("/tracks/:track_id/play-url", post(get_play_url))
        // Presigned download URL with Content-Disposition
        .route("/tracks/:track_id/download-url", post(get_download_url));

    let playlist_routes = Router::new()
        // Bulk signed manifest
        .route("/playlists/:playlist_id/manifest", post(build_manifest));

    let api_routes = Router::new().merge(track_routes).merge(playlist_routes);

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
