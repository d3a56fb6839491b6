//! Shared data models for the lectio delivery backend.
//!
//! This crate provides Serde-serializable types for:
//! - Track and playlist identifiers
//! - Object store metadata snapshots and signed URLs
//! - Playlist manifests and their wire representation

pub mod ids;
pub mod manifest;
pub mod media;

// Re-export common types
pub use ids::{PlaylistId, TrackId};
pub use manifest::{
    ManifestMetadata, ManifestResponse, PlaylistManifest, ResolvedTrack, TrackManifestEntry,
};
pub use media::{MediaObject, SignedUrl};
