//! End-to-end router tests.
//!
//! These drive the real router with an in-memory catalog, a fake
//! signer, and a fake object reader; no object store is contacted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;

use lectio_api::{create_router, ApiConfig, AppState, StaticCatalog};
use lectio_models::{MediaObject, PlaylistId, ResolvedTrack, SignedUrl, TrackId};
use lectio_storage::{
    ByteStream, DeliveryConfig, ManifestCache, ObjectReader, StorageError, StorageResult,
    StoreClient, StoreConfig, UrlSigner,
};

/// Signer that mints fake URLs, optionally failing configured keys.
struct TestSigner {
    failing_keys: Vec<String>,
}

impl TestSigner {
    fn ok() -> Self {
        Self { failing_keys: Vec::new() }
    }

    fn failing(keys: &[&str]) -> Self {
        Self {
            failing_keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[async_trait]
impl UrlSigner for TestSigner {
    async fn sign(&self, key: &str, expires_in: Duration) -> StorageResult<SignedUrl> {
        if self.failing_keys.iter().any(|k| k == key) {
            return Err(StorageError::transient("signing backend unavailable"));
        }
        Ok(SignedUrl {
            url: format!("https://store.test/bucket/{}?sig=abc", key),
            key: key.to_string(),
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in.as_secs() as i64),
        })
    }
}

/// In-memory object store serving fixed byte blobs with range support.
struct TestStore {
    objects: HashMap<String, Vec<u8>>,
}

impl TestStore {
    fn with_fixtures() -> Self {
        let mut objects = HashMap::new();
        objects.insert("lectures/intro.mp3".to_string(), blob(2048));
        objects.insert("lectures/part-two.mp3".to_string(), blob(4096));
        // outro.mp3 is listed in the catalog but deliberately absent.
        Self { objects }
    }

    fn object(&self, key: &str) -> StorageResult<&Vec<u8>> {
        self.objects
            .get(key)
            .ok_or_else(|| StorageError::not_found(key))
    }
}

fn blob(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[async_trait]
impl ObjectReader for TestStore {
    async fn metadata(&self, key: &str) -> StorageResult<MediaObject> {
        let data = self.object(key)?;
        Ok(MediaObject {
            key: key.to_string(),
            size_bytes: data.len() as u64,
            content_type: "audio/mpeg".to_string(),
            last_modified: None,
        })
    }

    async fn get_object(&self, key: &str, range: Option<&str>) -> StorageResult<ByteStream> {
        let data = self.object(key)?;
        let window = match range {
            None => data.clone(),
            Some(spec) => {
                let spec = spec.strip_prefix("bytes=").expect("store range is bytes=");
                let (start, end) = spec.split_once('-').expect("store range has a dash");
                let start: usize = start.parse().unwrap();
                let end: usize = end.parse().unwrap();
                data[start..=end].to_vec()
            }
        };
        Ok(ByteStream::from(window))
    }
}

fn catalog() -> StaticCatalog {
    let tracks = vec![
        ResolvedTrack {
            track_id: TrackId::from("t1"),
            key: "lectures/intro.mp3".to_string(),
            duration_seconds: 300.0,
        },
        ResolvedTrack {
            track_id: TrackId::from("t2"),
            key: "lectures/part-two.mp3".to_string(),
            duration_seconds: 450.0,
        },
        ResolvedTrack {
            track_id: TrackId::from("t3"),
            key: "lectures/outro.mp3".to_string(),
            duration_seconds: 120.0,
        },
    ];
    let playlists = vec![(
        PlaylistId::from("course-101"),
        vec![TrackId::from("t1"), TrackId::from("t2"), TrackId::from("t3")],
    )];
    StaticCatalog::from_tracks(tracks, playlists)
}

async fn offline_storage() -> Arc<StoreClient> {
    let config = StoreConfig {
        endpoint_url: "http://localhost:1".to_string(),
        access_key_id: "test".to_string(),
        secret_access_key: "test".to_string(),
        bucket_name: "lectures".to_string(),
        region: "auto".to_string(),
        url_style: Default::default(),
        retry: Default::default(),
    };
    Arc::new(StoreClient::new(config).await.unwrap())
}

async fn router_with_signer(signer: Arc<dyn UrlSigner>) -> Router {
    let delivery = DeliveryConfig::default();
    let manifest_cache = Some(Arc::new(ManifestCache::new(delivery.effective_cache_ttl())));

    let state = AppState {
        config: ApiConfig::default(),
        storage: offline_storage().await,
        signer,
        reader: Arc::new(TestStore::with_fixtures()),
        catalog: Arc::new(catalog()),
        delivery,
        manifest_cache,
    };
    create_router(state, None)
}

async fn router() -> Router {
    router_with_signer(Arc::new(TestSigner::ok())).await
}

fn manifest_request(playlist: &str, body: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/api/playlists/{}/manifest", playlist))
        .header("X-Caller-Id", "student-1");
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).unwrap()
}

fn stream_request(track: &str, range: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .uri(format!("/api/tracks/{}/stream", track))
        .header("X-Caller-Id", "student-1");
    if let Some(range) = range {
        builder = builder.header(header::RANGE, range);
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = router().await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_manifest_requires_caller_identity() {
    let app = router().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/playlists/course-101/manifest")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_manifest_wire_shape() {
    let app = router().await;

    let response = app
        .oneshot(manifest_request("course-101", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["collectionId"], "course-101");

    let tracks = body["tracks"].as_array().unwrap();
    let ids: Vec<&str> = tracks.iter().map(|e| e["trackId"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["t1", "t2", "t3"]);

    let metadata = &body["metadata"];
    assert_eq!(metadata["totalTracks"], 3);
    assert_eq!(metadata["totalDuration"], 870.0);
    assert_eq!(metadata["cached"], false);

    // Every track shares the manifest expiry and carries a signed URL.
    for track in tracks {
        assert_eq!(track["expiresAt"], metadata["expiresAt"]);
        assert!(track["audioUrl"].as_str().unwrap().contains("sig="));
        assert!(track["duration"].is_number());
    }
}

#[tokio::test]
async fn test_manifest_with_explicit_ordering() {
    let app = router().await;

    let response = app
        .oneshot(manifest_request(
            "course-101",
            Some(r#"{"orderedTrackIds": ["t3", "t1"]}"#),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let ids: Vec<&str> = body["tracks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["trackId"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["t3", "t1"]);
}

#[tokio::test]
async fn test_manifest_repeat_request_served_from_cache() {
    let app = router().await;

    let first = app
        .clone()
        .oneshot(manifest_request("course-101", None))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first_body = json_body(first).await;
    assert_eq!(first_body["metadata"]["cached"], false);

    let second = app
        .oneshot(manifest_request("course-101", None))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let second_body = json_body(second).await;
    assert_eq!(second_body["metadata"]["cached"], true);
    assert_eq!(
        second_body["metadata"]["expiresAt"],
        first_body["metadata"]["expiresAt"]
    );
}

#[tokio::test]
async fn test_manifest_unknown_tracks_rejected_with_full_list() {
    let app = router().await;

    let response = app
        .oneshot(manifest_request(
            "course-101",
            Some(r#"{"orderedTrackIds": ["t1", "ghost-a", "t2", "ghost-b"]}"#),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = json_body(response).await;
    let failing: Vec<&str> = body["failingTrackIds"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(failing, vec!["ghost-a", "ghost-b"]);
}

#[tokio::test]
async fn test_manifest_signing_failure_names_failing_tracks() {
    let signer = Arc::new(TestSigner::failing(&[
        "lectures/intro.mp3",
        "lectures/outro.mp3",
    ]));
    let app = router_with_signer(signer).await;

    let response = app
        .oneshot(manifest_request("course-101", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = json_body(response).await;
    let failing: Vec<&str> = body["failingTrackIds"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(failing, vec!["t1", "t3"]);
}

#[tokio::test]
async fn test_manifest_unknown_playlist_is_404() {
    let app = router().await;

    let response = app
        .oneshot(manifest_request("no-such-course", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_manifest_invalid_playlist_id_is_400() {
    let app = router().await;

    let response = app
        .oneshot(manifest_request("bad%2Fid..", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stream_full_object() {
    let app = router().await;

    let response = app.oneshot(stream_request("t1", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CONTENT_LENGTH).unwrap(), "2048");
    assert_eq!(response.headers().get(header::ACCEPT_RANGES).unwrap(), "bytes");
    assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "audio/mpeg");
    assert!(response.headers().get(header::CONTENT_RANGE).is_none());

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.as_ref(), blob(2048).as_slice());
}

#[tokio::test]
async fn test_stream_range_returns_partial_content() {
    let app = router().await;

    let response = app
        .oneshot(stream_request("t1", Some("bytes=0-1023")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers().get(header::CONTENT_RANGE).unwrap(),
        "bytes 0-1023/2048"
    );
    assert_eq!(response.headers().get(header::CONTENT_LENGTH).unwrap(), "1024");

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.as_ref(), &blob(2048)[..1024]);
}

#[tokio::test]
async fn test_stream_open_ended_range() {
    let app = router().await;

    let response = app
        .oneshot(stream_request("t1", Some("bytes=1024-")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers().get(header::CONTENT_RANGE).unwrap(),
        "bytes 1024-2047/2048"
    );

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.as_ref(), &blob(2048)[1024..]);
}

#[tokio::test]
async fn test_stream_unsatisfiable_range_is_416_with_size() {
    let app = router().await;

    let response = app
        .oneshot(stream_request("t1", Some("bytes=9999-")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(
        response.headers().get(header::CONTENT_RANGE).unwrap(),
        "bytes */2048"
    );

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn test_stream_malformed_range_is_400() {
    let app = router().await;

    let response = app
        .oneshot(stream_request("t1", Some("bytes=abc-def")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stream_unknown_track_is_404() {
    let app = router().await;

    let response = app.oneshot(stream_request("ghost", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stream_missing_object_is_404() {
    // t3 is in the catalog but its object is gone from the store.
    let app = router().await;

    let response = app.oneshot(stream_request("t3", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_play_url_issues_presigned_url() {
    let app = router().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/tracks/t1/play-url")
        .header("X-Caller-Id", "student-1")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let url = body["url"].as_str().unwrap();
    assert!(url.contains("lectures/intro.mp3"));
    assert!(url.contains("X-Amz-Signature"));
    assert_eq!(body["expires_in_secs"], 14_400);
    assert_eq!(body["content_type"], "audio/mpeg");
    assert_eq!(body["track"]["file_size_bytes"], 2048);
}

#[tokio::test]
async fn test_security_headers_present() {
    let app = router().await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(
        response.headers().get("X-Content-Type-Options").unwrap(),
        "nosniff"
    );
    assert!(response.headers().contains_key("X-Request-ID"));
}
