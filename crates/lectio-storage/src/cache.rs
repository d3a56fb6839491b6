//! Short-TTL in-process manifest cache.
//!
//! Strictly optional: every caller must behave identically (minus
//! latency) when the cache is absent or bypassed. There is no active
//! invalidation; correctness rests on the TTL staying below the signed
//! URL expiry window, which holds because stored audio at a given key is
//! immutable once published.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use lectio_models::{PlaylistId, PlaylistManifest, TrackId};

/// Maximum number of manifests kept resident.
const MAX_CACHE_ENTRIES: usize = 1_024;

/// Cache key for one playlist request.
///
/// Digests the playlist id together with the ordered track ids, so a
/// playlist whose track list or ordering changed never hits a stale
/// manifest.
pub fn manifest_cache_key(playlist_id: &PlaylistId, track_ids: &[TrackId]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(playlist_id.as_str().as_bytes());
    for id in track_ids {
        hasher.update([0u8]);
        hasher.update(id.as_str().as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

struct CacheSlot {
    manifest: PlaylistManifest,
    stored_at: Instant,
}

/// TTL-bounded manifest cache.
pub struct ManifestCache {
    entries: RwLock<HashMap<String, CacheSlot>>,
    ttl: Duration,
}

impl ManifestCache {
    /// Create a cache with the given entry TTL.
    ///
    /// Callers pass `DeliveryConfig::effective_cache_ttl()`, which is
    /// already clamped below the expiry window by the safety margin.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Look up a manifest. Hits come back with `cached = true`.
    pub async fn get(&self, key: &str) -> Option<PlaylistManifest> {
        {
            let entries = self.entries.read().await;
            let slot = entries.get(key)?;
            if slot.stored_at.elapsed() < self.ttl {
                debug!(key = %key, "Manifest cache hit");
                let mut manifest = slot.manifest.clone();
                manifest.cached = true;
                return Some(manifest);
            }
        }

        // Entry expired; drop it so the map does not accumulate stale slots.
        let mut entries = self.entries.write().await;
        if let Some(slot) = entries.get(key) {
            if slot.stored_at.elapsed() >= self.ttl {
                entries.remove(key);
            }
        }
        None
    }

    /// Store a freshly built manifest.
    pub async fn put(&self, key: String, manifest: PlaylistManifest) {
        let mut entries = self.entries.write().await;

        if entries.len() >= MAX_CACHE_ENTRIES {
            let now = Instant::now();
            let ttl = self.ttl;
            entries.retain(|_, slot| now.duration_since(slot.stored_at) < ttl);

            // Still full of live entries: evict oldest first.
            if entries.len() >= MAX_CACHE_ENTRIES {
                let mut by_age: Vec<_> = entries
                    .iter()
                    .map(|(k, slot)| (k.clone(), slot.stored_at))
                    .collect();
                by_age.sort_by_key(|(_, stored_at)| *stored_at);

                let to_remove = entries.len() + 1 - MAX_CACHE_ENTRIES;
                for (k, _) in by_age.into_iter().take(to_remove) {
                    entries.remove(&k);
                }
                warn!("Manifest cache exceeded capacity, evicted {} entries", to_remove);
            }
        }

        entries.insert(
            key,
            CacheSlot {
                manifest,
                stored_at: Instant::now(),
            },
        );
    }

    /// Number of resident entries (expired or not).
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache currently holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn manifest(playlist: &str) -> PlaylistManifest {
        let now = Utc::now();
        PlaylistManifest {
            playlist_id: PlaylistId::from(playlist),
            entries: vec![],
            total_duration_seconds: 0.0,
            generated_at: now,
            expires_at: now + chrono::Duration::seconds(14_400),
            cached: false,
        }
    }

    #[tokio::test]
    async fn test_hit_sets_cached_flag() {
        let cache = ManifestCache::new(Duration::from_secs(60));
        cache.put("k1".to_string(), manifest("pl")).await;

        let hit = cache.get("k1").await.expect("should hit");
        assert!(hit.cached);

        // Stored copy stays pristine for the next hit.
        let again = cache.get("k1").await.expect("should hit again");
        assert!(again.cached);
    }

    #[tokio::test]
    async fn test_miss_on_unknown_key() {
        let cache = ManifestCache::new(Duration::from_secs(60));
        assert!(cache.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss_and_removed() {
        let cache = ManifestCache::new(Duration::ZERO);
        cache.put("k1".to_string(), manifest("pl")).await;

        assert!(cache.get("k1").await.is_none());
        assert!(cache.is_empty().await);
    }

    #[test]
    fn test_cache_key_depends_on_order_and_content() {
        let pl = PlaylistId::from("pl");
        let a = manifest_cache_key(&pl, &[TrackId::from("t1"), TrackId::from("t2")]);
        let b = manifest_cache_key(&pl, &[TrackId::from("t2"), TrackId::from("t1")]);
        let c = manifest_cache_key(&pl, &[TrackId::from("t1"), TrackId::from("t2")]);
        assert_ne!(a, b);
        assert_eq!(a, c);

        let other = manifest_cache_key(&PlaylistId::from("pl2"), &[TrackId::from("t1")]);
        assert_ne!(a, other);
    }

    #[test]
    fn test_cache_key_is_unambiguous_across_boundaries() {
        // "ab" + "c" must not collide with "a" + "bc".
        let pl = PlaylistId::from("pl");
        let a = manifest_cache_key(&pl, &[TrackId::from("ab"), TrackId::from("c")]);
        let b = manifest_cache_key(&pl, &[TrackId::from("a"), TrackId::from("bc")]);
        assert_ne!(a, b);
    }
}
