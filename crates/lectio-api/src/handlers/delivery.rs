//! Single-track delivery handlers.
//!
//! Issue short-lived presigned URLs for playback and download. Clients
//! fetch audio straight from the object store; this server only signs.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use lectio_models::TrackId;

use crate::auth::CallerId;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::security::{is_valid_track_id, sanitize_download_filename};
use crate::state::AppState;

/// Response for playback/download URL requests.
#[derive(Debug, Serialize)]
pub struct PlayUrlResponse {
    /// The presigned URL.
    pub url: String,
    /// When this URL expires (ISO 8601).
    pub expires_at: DateTime<Utc>,
    /// Expiry in seconds from now.
    pub expires_in_secs: u64,
    /// Content type.
    pub content_type: String,
    /// Track metadata.
    pub track: TrackSummary,
}

/// Summary of track metadata for delivery responses.
#[derive(Debug, Serialize)]
pub struct TrackSummary {
    pub track_id: TrackId,
    pub key: String,
    pub duration_seconds: f64,
    pub file_size_bytes: u64,
}

/// Request body for download URL (optional filename override).
#[derive(Debug, Deserialize)]
pub struct DownloadUrlRequest {
    /// Custom filename for the download.
    #[serde(default)]
    pub filename: Option<String>,
}

/// Generate a short-lived playback URL for a track.
///
/// POST /api/tracks/{track_id}/play-url
pub async fn get_play_url(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
    caller: CallerId,
) -> ApiResult<Json<PlayUrlResponse>> {
    let (track, object) = resolve_track(&state, &track_id).await?;

    let expiry = state.delivery.expiry_window;
    let signed = state.storage.presign_get(&track.key, expiry).await.map_err(|e| {
        warn!(track_id = %track.track_id, error = %e, "Failed to generate playback URL");
        e
    })?;

    metrics::record_signed_url_issued("play");
    info!(track_id = %track.track_id, caller = %caller.as_str(), "Generated playback URL");

    Ok(Json(PlayUrlResponse {
        url: signed.url,
        expires_at: signed.expires_at,
        expires_in_secs: expiry.as_secs(),
        content_type: object.content_type,
        track: TrackSummary {
            track_id: track.track_id,
            key: track.key,
            duration_seconds: track.duration_seconds,
            file_size_bytes: object.size_bytes,
        },
    }))
}

/// Generate a short-lived download URL for a track.
///
/// POST /api/tracks/{track_id}/download-url
///
/// Request body (optional): `{ "filename": "week-1-intro.mp3" }`
pub async fn get_download_url(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
    caller: CallerId,
    body: Option<Json<DownloadUrlRequest>>,
) -> ApiResult<Json<PlayUrlResponse>> {
    let (track, object) = resolve_track(&state, &track_id).await?;

    let filename = body
        .as_ref()
        .and_then(|b| b.filename.as_deref())
        .map(sanitize_download_filename)
        .unwrap_or_else(|| default_filename(&track.key));

    let expiry = state.delivery.expiry_window;
    let signed = state
        .storage
        .presign_download(&track.key, expiry, &filename)
        .await
        .map_err(|e| {
            warn!(track_id = %track.track_id, error = %e, "Failed to generate download URL");
            e
        })?;

    metrics::record_signed_url_issued("download");
    info!(track_id = %track.track_id, caller = %caller.as_str(), "Generated download URL");

    Ok(Json(PlayUrlResponse {
        url: signed.url,
        expires_at: signed.expires_at,
        expires_in_secs: expiry.as_secs(),
        content_type: object.content_type,
        track: TrackSummary {
            track_id: track.track_id,
            key: track.key,
            duration_seconds: track.duration_seconds,
            file_size_bytes: object.size_bytes,
        },
    }))
}

/// Validate the id, resolve it in the catalog, and head the object.
async fn resolve_track(
    state: &AppState,
    track_id: &str,
) -> ApiResult<(lectio_models::ResolvedTrack, lectio_models::MediaObject)> {
    if !is_valid_track_id(track_id) {
        return Err(ApiError::bad_request("Invalid track ID format"));
    }
    let track_id = TrackId::from(track_id);

    let track = state
        .catalog
        .track(&track_id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("Track '{}' not found", track_id)))?;

    let object = state.reader.metadata(&track.key).await?;
    Ok((track, object))
}

fn default_filename(key: &str) -> String {
    key.rsplit('/')
        .next()
        .filter(|n| !n.is_empty())
        .map(|n| n.to_string())
        .unwrap_or_else(|| "audio.mp3".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filename_from_key() {
        assert_eq!(default_filename("lectures/week-1/intro.mp3"), "intro.mp3");
        assert_eq!(default_filename("intro.mp3"), "intro.mp3");
        assert_eq!(default_filename("lectures/"), "audio.mp3");
    }
}
