//! Playlist manifest handler.
//!
//! Builds the full set of signed URLs for a playlist in one response.
//! Signing fans out concurrently and the result is cached briefly, so
//! a classroom of players requesting the same playlist does not hammer
//! the signer.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use tracing::{debug, info, warn};

use lectio_models::{ManifestResponse, PlaylistId, ResolvedTrack, TrackId};
use lectio_storage::{manifest_cache_key, ManifestBuilder};

use crate::auth::CallerId;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::security::{is_valid_playlist_id, is_valid_track_id};
use crate::state::AppState;

/// Request body for manifest builds.
///
/// `orderedTrackIds` overrides the catalog's playlist ordering; when
/// omitted, the playlist must exist in the catalog.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestRequest {
    #[serde(default)]
    pub ordered_track_ids: Option<Vec<TrackId>>,
}

/// Maximum tracks accepted per manifest request.
const MAX_MANIFEST_TRACKS: usize = 500;

/// Build a signed manifest for a playlist.
///
/// POST /api/playlists/{playlist_id}/manifest
///
/// The response names every track in request order under `tracks`, each
/// with its own presigned URL, plus an aggregate `metadata` block with
/// the shared expiry. Either every track signs or the request fails
/// listing every failing track; clients never see a partially playable
/// playlist.
pub async fn build_manifest(
    State(state): State<AppState>,
    Path(playlist_id): Path<String>,
    caller: CallerId,
    body: Option<Json<ManifestRequest>>,
) -> ApiResult<Json<ManifestResponse>> {
    if !is_valid_playlist_id(&playlist_id) {
        return Err(ApiError::bad_request("Invalid playlist ID format"));
    }
    let playlist_id = PlaylistId::from(playlist_id);

    let track_ids = match body.and_then(|Json(b)| b.ordered_track_ids) {
        Some(ids) => ids,
        None => state
            .catalog
            .playlist(&playlist_id)
            .await
            .ok_or_else(|| {
                ApiError::not_found(format!("Playlist '{}' not found", playlist_id))
            })?,
    };

    if track_ids.len() > MAX_MANIFEST_TRACKS {
        return Err(ApiError::bad_request(format!(
            "Too many tracks: {} exceeds the limit of {}",
            track_ids.len(),
            MAX_MANIFEST_TRACKS
        )));
    }
    for id in &track_ids {
        if !is_valid_track_id(id.as_str()) {
            return Err(ApiError::bad_request(format!("Invalid track ID '{}'", id)));
        }
    }

    // Cache is keyed by playlist and exact track order; a reordered
    // request is a different manifest.
    let cache_key = manifest_cache_key(&playlist_id, &track_ids);
    if let Some(cache) = &state.manifest_cache {
        if let Some(manifest) = cache.get(&cache_key).await {
            metrics::record_manifest_cache(true);
            debug!(playlist_id = %playlist_id, "Manifest cache hit");
            return Ok(Json(manifest.into()));
        }
        metrics::record_manifest_cache(false);
    }

    let tracks = resolve_tracks(&state, &track_ids).await?;

    let start = Instant::now();
    let builder = ManifestBuilder::new(Arc::clone(&state.signer), state.delivery.clone());
    let manifest = builder.build(&playlist_id, &tracks).await.map_err(|e| {
        warn!(playlist_id = %playlist_id, error = %e, "Manifest build failed");
        e
    })?;
    metrics::record_manifest_built(start.elapsed().as_secs_f64());

    if let Some(cache) = &state.manifest_cache {
        cache.put(cache_key, manifest.clone()).await;
    }

    info!(
        playlist_id = %playlist_id,
        caller = %caller.as_str(),
        tracks = manifest.entries.len(),
        expires_at = %manifest.expires_at,
        "Manifest built"
    );

    Ok(Json(manifest.into()))
}

/// Resolve every requested track in the catalog.
///
/// Unknown tracks fail the whole request, with every missing id named,
/// mirroring the all-or-nothing signing contract.
async fn resolve_tracks(
    state: &AppState,
    track_ids: &[TrackId],
) -> ApiResult<Vec<ResolvedTrack>> {
    let mut tracks = Vec::with_capacity(track_ids.len());
    let mut missing = Vec::new();

    for id in track_ids {
        match state.catalog.track(id).await {
            Some(track) => tracks.push(track),
            None => missing.push(id.clone()),
        }
    }

    if !missing.is_empty() {
        return Err(ApiError::PartialFailure { failing: missing });
    }
    Ok(tracks)
}
