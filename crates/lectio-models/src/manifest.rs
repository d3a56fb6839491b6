//! Playlist manifest types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{PlaylistId, TrackId};

/// A track whose object key and duration have been resolved by the
/// external catalog. Input to the manifest builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedTrack {
    /// Track identifier from the request.
    pub track_id: TrackId,
    /// Object key in the store.
    pub key: String,
    /// Catalog-supplied duration in seconds, `0.0` when unknown.
    /// Informational only; never derived from the audio bytes.
    pub duration_seconds: f64,
}

/// One signed track inside a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackManifestEntry {
    /// Track identifier from the request.
    pub track_id: TrackId,
    /// Presigned playback URL.
    pub audio_url: String,
    /// Shared expiry of the whole manifest.
    pub expires_at: DateTime<Utc>,
    /// Catalog-supplied duration in seconds.
    #[serde(rename = "duration")]
    pub duration_seconds: f64,
}

/// A complete, gapless manifest for one playlist.
///
/// `entries` is bit-for-bit in request order; entry count always equals
/// the request count (partial manifests are never constructed).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistManifest {
    pub playlist_id: PlaylistId,
    pub entries: Vec<TrackManifestEntry>,
    pub total_duration_seconds: f64,
    pub generated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// `true` only when served from the manifest cache.
    pub cached: bool,
}

impl PlaylistManifest {
    /// Aggregate metadata block for the wire response.
    pub fn metadata(&self) -> ManifestMetadata {
        ManifestMetadata {
            total_tracks: self.entries.len(),
            total_duration: self.total_duration_seconds,
            generated_at: self.generated_at,
            expires_at: self.expires_at,
            cached: self.cached,
        }
    }
}

/// Aggregate manifest metadata as exposed on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestMetadata {
    pub total_tracks: usize,
    pub total_duration: f64,
    pub generated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub cached: bool,
}

/// Wire representation of a built manifest.
///
/// Splits the flat internal manifest into the track list plus an
/// aggregate `metadata` block, under the collection id the caller asked
/// about.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestResponse {
    pub collection_id: PlaylistId,
    pub tracks: Vec<TrackManifestEntry>,
    pub metadata: ManifestMetadata,
}

impl From<PlaylistManifest> for ManifestResponse {
    fn from(manifest: PlaylistManifest) -> Self {
        let metadata = manifest.metadata();
        Self {
            collection_id: manifest.playlist_id,
            tracks: manifest.entries,
            metadata,
        }
    }
}
