//! Parallel manifest building.
//!
//! Signs every track of a playlist concurrently under a bounded fan-out
//! and joins the results in request order. Completion is all-or-nothing:
//! a manifest with fewer entries than requested tracks is never produced.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{debug, warn};

use lectio_models::{PlaylistId, PlaylistManifest, ResolvedTrack, SignedUrl, TrackId, TrackManifestEntry};

use crate::client::StoreClient;
use crate::error::{StorageError, StorageResult};

/// Default expiry window for signed URLs (4 hours).
pub const DEFAULT_EXPIRY_WINDOW_SECS: u64 = 14_400;

/// Maximum allowed expiry (7 days) to prevent long-lived URL leakage.
pub const MAX_EXPIRY_SECS: u64 = 604_800;

/// Default fan-out limit for concurrent signing.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Default safety margin between cache TTL and the expiry window (30 min).
pub const DEFAULT_SAFETY_MARGIN_SECS: u64 = 1_800;

/// Delivery configuration: expiry window, fan-out limit, cache sizing.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// How long signed URLs stay valid.
    pub expiry_window: Duration,
    /// Concurrency limit for manifest signing fan-out.
    pub concurrency: usize,
    /// Whether the manifest cache is enabled at all.
    pub cache_enabled: bool,
    /// Requested cache TTL; the effective TTL is clamped below the
    /// expiry window by the safety margin.
    pub cache_ttl: Duration,
    /// Margin keeping cached manifests from outliving their URLs.
    pub cache_safety_margin: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        let expiry_window = Duration::from_secs(DEFAULT_EXPIRY_WINDOW_SECS);
        let cache_safety_margin = Duration::from_secs(DEFAULT_SAFETY_MARGIN_SECS);
        Self {
            expiry_window,
            concurrency: DEFAULT_CONCURRENCY,
            cache_enabled: true,
            cache_ttl: expiry_window - cache_safety_margin,
            cache_safety_margin,
        }
    }
}

impl DeliveryConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let expiry_window = Duration::from_secs(
            std::env::var("SIGNED_URL_EXPIRY_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_EXPIRY_WINDOW_SECS)
                .min(MAX_EXPIRY_SECS),
        );
        let cache_safety_margin = Duration::from_secs(
            std::env::var("CACHE_SAFETY_MARGIN_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SAFETY_MARGIN_SECS),
        );
        let cache_ttl = std::env::var("MANIFEST_CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| expiry_window.saturating_sub(cache_safety_margin));

        Self {
            expiry_window,
            concurrency: std::env::var("MANIFEST_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_CONCURRENCY)
                .max(1),
            cache_enabled: std::env::var("MANIFEST_CACHE_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            cache_ttl,
            cache_safety_margin,
        }
    }

    /// TTL actually used for cache entries.
    ///
    /// Strictly less than the expiry window, so a cache hit can never
    /// hand out already-expired URLs. The margin is floored at one
    /// second: a configured margin of zero must not let the TTL reach
    /// the window itself.
    pub fn effective_cache_ttl(&self) -> Duration {
        let margin = self.cache_safety_margin.max(Duration::from_secs(1));
        let ceiling = self.expiry_window.saturating_sub(margin);
        self.cache_ttl.min(ceiling)
    }
}

/// Seam for URL signing, so manifest assembly can be exercised without a
/// live store.
#[async_trait]
pub trait UrlSigner: Send + Sync {
    async fn sign(&self, key: &str, expires_in: Duration) -> StorageResult<SignedUrl>;
}

#[async_trait]
impl UrlSigner for StoreClient {
    async fn sign(&self, key: &str, expires_in: Duration) -> StorageResult<SignedUrl> {
        self.presign_get(key, expires_in).await
    }
}

/// Errors from manifest building.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// One or more tracks could not be signed. Names every failing track;
    /// no partial manifest is observable.
    #[error("Failed to sign {} track(s)", failing.len())]
    PartialFailure { failing: Vec<TrackId> },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Builds complete playlist manifests by concurrent fan-out signing.
pub struct ManifestBuilder<S: UrlSigner + ?Sized> {
    signer: Arc<S>,
    config: DeliveryConfig,
}

impl<S: UrlSigner + ?Sized> ManifestBuilder<S> {
    pub fn new(signer: Arc<S>, config: DeliveryConfig) -> Self {
        Self { signer, config }
    }

    /// Sign all tracks and assemble the manifest.
    ///
    /// Up to `concurrency` signing calls run at once; `buffered` yields
    /// results in input order regardless of completion order, which is
    /// what keeps `entries` aligned with the request. If any track fails,
    /// the whole call fails with every failing track named.
    pub async fn build(
        &self,
        playlist_id: &PlaylistId,
        tracks: &[ResolvedTrack],
    ) -> Result<PlaylistManifest, ManifestError> {
        let generated_at = Utc::now();
        let expires_at =
            generated_at + chrono::Duration::seconds(self.config.expiry_window.as_secs() as i64);

        let expiry = self.config.expiry_window;
        let results: Vec<(ResolvedTrack, StorageResult<SignedUrl>)> =
            stream::iter(tracks.iter().cloned())
                .map(|track| {
                    let signer = Arc::clone(&self.signer);
                    async move {
                        let signed = signer.sign(&track.key, expiry).await;
                        (track, signed)
                    }
                })
                .buffered(self.config.concurrency.max(1))
                .collect()
                .await;

        let mut entries = Vec::with_capacity(results.len());
        let mut failing = Vec::new();

        for (track, result) in results {
            match result {
                Ok(signed) => entries.push(TrackManifestEntry {
                    track_id: track.track_id,
                    audio_url: signed.url,
                    expires_at,
                    duration_seconds: track.duration_seconds,
                }),
                Err(e) => {
                    warn!(track_id = %track.track_id, key = %track.key, error = %e, "Track signing failed");
                    failing.push(track.track_id);
                }
            }
        }

        if !failing.is_empty() {
            return Err(ManifestError::PartialFailure { failing });
        }

        debug!(
            playlist_id = %playlist_id,
            tracks = entries.len(),
            expires_at = %expires_at,
            "Manifest built"
        );

        Ok(PlaylistManifest {
            playlist_id: playlist_id.clone(),
            total_duration_seconds: entries.iter().map(|e| e.duration_seconds).sum(),
            entries,
            generated_at,
            expires_at,
            cached: false,
        })
    }
}
