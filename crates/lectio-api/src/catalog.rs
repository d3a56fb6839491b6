//! Track and playlist catalog.
//!
//! The catalog maps public track ids to object keys and durations, and
//! playlist ids to ordered track lists. Production deployments load a
//! JSON snapshot exported by the ingest pipeline; tests build one
//! in memory.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use lectio_models::{PlaylistId, ResolvedTrack, TrackId};

/// Lookup seam for track and playlist resolution.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Resolve a track id to its object key and duration.
    async fn track(&self, id: &TrackId) -> Option<ResolvedTrack>;

    /// Ordered track ids of a playlist, if the playlist exists.
    async fn playlist(&self, id: &PlaylistId) -> Option<Vec<TrackId>>;

    /// Number of known tracks, for readiness reporting.
    async fn track_count(&self) -> usize;
}

#[derive(Debug, Deserialize)]
struct CatalogTrack {
    #[serde(rename = "trackId")]
    track_id: TrackId,
    key: String,
    #[serde(rename = "durationSeconds")]
    duration_seconds: f64,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    tracks: Vec<CatalogTrack>,
    #[serde(default)]
    playlists: HashMap<String, Vec<String>>,
}

/// In-memory catalog backed by a JSON snapshot.
pub struct StaticCatalog {
    tracks: HashMap<TrackId, ResolvedTrack>,
    playlists: HashMap<PlaylistId, Vec<TrackId>>,
}

impl StaticCatalog {
    /// Catalog with no tracks. Every lookup misses.
    pub fn empty() -> Self {
        Self {
            tracks: HashMap::new(),
            playlists: HashMap::new(),
        }
    }

    /// Load a catalog snapshot from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
        let file: CatalogFile = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse catalog file {}", path.display()))?;

        let catalog = Self::from_parsed(file);
        info!(
            path = %path.display(),
            tracks = catalog.tracks.len(),
            playlists = catalog.playlists.len(),
            "Catalog loaded"
        );
        Ok(catalog)
    }

    /// Build a catalog directly from track entries.
    pub fn from_tracks(
        tracks: impl IntoIterator<Item = ResolvedTrack>,
        playlists: impl IntoIterator<Item = (PlaylistId, Vec<TrackId>)>,
    ) -> Self {
        Self {
            tracks: tracks
                .into_iter()
                .map(|t| (t.track_id.clone(), t))
                .collect(),
            playlists: playlists.into_iter().collect(),
        }
    }

    fn from_parsed(file: CatalogFile) -> Self {
        let tracks = file
            .tracks
            .into_iter()
            .map(|t| {
                (
                    t.track_id.clone(),
                    ResolvedTrack {
                        track_id: t.track_id,
                        key: t.key,
                        duration_seconds: t.duration_seconds,
                    },
                )
            })
            .collect();
        let playlists = file
            .playlists
            .into_iter()
            .map(|(id, tracks)| {
                (
                    PlaylistId::from(id),
                    tracks.into_iter().map(TrackId::from).collect(),
                )
            })
            .collect();
        Self { tracks, playlists }
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    async fn track(&self, id: &TrackId) -> Option<ResolvedTrack> {
        self.tracks.get(id).cloned()
    }

    async fn playlist(&self, id: &PlaylistId) -> Option<Vec<TrackId>> {
        self.playlists.get(id).cloned()
    }

    async fn track_count(&self) -> usize {
        self.tracks.len()
    }
}
