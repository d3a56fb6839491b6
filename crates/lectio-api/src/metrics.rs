//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "lectio_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "lectio_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "lectio_http_requests_in_flight";

    // Delivery metrics
    pub const SIGNED_URLS_ISSUED_TOTAL: &str = "lectio_signed_urls_issued_total";
    pub const STREAM_REQUESTS_TOTAL: &str = "lectio_stream_requests_total";

    // Manifest metrics
    pub const MANIFESTS_BUILT_TOTAL: &str = "lectio_manifests_built_total";
    pub const MANIFEST_BUILD_DURATION_SECONDS: &str = "lectio_manifest_build_duration_seconds";
    pub const MANIFEST_CACHE_HITS_TOTAL: &str = "lectio_manifest_cache_hits_total";
    pub const MANIFEST_CACHE_MISSES_TOTAL: &str = "lectio_manifest_cache_misses_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a signed URL issued for a single track.
pub fn record_signed_url_issued(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::SIGNED_URLS_ISSUED_TOTAL, &labels).increment(1);
}

/// Record a stream request, labelled by whether it was ranged.
pub fn record_stream_request(ranged: bool) {
    let labels = [("ranged", ranged.to_string())];
    counter!(names::STREAM_REQUESTS_TOTAL, &labels).increment(1);
}

/// Record a manifest build.
pub fn record_manifest_built(duration_secs: f64) {
    counter!(names::MANIFESTS_BUILT_TOTAL).increment(1);
    histogram!(names::MANIFEST_BUILD_DURATION_SECONDS).record(duration_secs);
}

/// Record a manifest cache hit or miss.
pub fn record_manifest_cache(hit: bool) {
    if hit {
        counter!(names::MANIFEST_CACHE_HITS_TOTAL).increment(1);
    } else {
        counter!(names::MANIFEST_CACHE_MISSES_TOTAL).increment(1);
    }
}

/// Sanitize path for metrics labels (remove IDs, etc.).
fn sanitize_path(path: &str) -> String {
    let path = regex_lite::Regex::new(r"/tracks/[a-zA-Z0-9_-]+")
        .unwrap()
        .replace_all(path, "/tracks/:track_id");
    let path = regex_lite::Regex::new(r"/playlists/[a-zA-Z0-9_-]+")
        .unwrap()
        .replace_all(&path, "/playlists/:playlist_id");
    path.to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/tracks/lecture-05/stream"),
            "/api/tracks/:track_id/stream"
        );
        assert_eq!(
            sanitize_path("/api/playlists/course-101/manifest"),
            "/api/playlists/:playlist_id/manifest"
        );
        assert_eq!(sanitize_path("/health"), "/health");
    }
}
