//! Range-aware audio streaming.
//!
//! Serves stored objects straight through the server with HTTP range
//! semantics, so seek bars work even for clients that cannot follow
//! presigned redirects. Bodies are passed through chunk by chunk; a
//! whole object is never buffered in memory.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use lectio_models::TrackId;

use crate::auth::CallerId;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::security::is_valid_track_id;
use crate::state::AppState;

/// Outcome of parsing a `Range` header against a known object size.
#[derive(Debug, PartialEq, Eq)]
pub enum RangeParse {
    /// A servable byte window, inclusive on both ends.
    Satisfiable { start: u64, end: u64 },
    /// Syntactically valid but outside the object.
    Unsatisfiable,
    /// Not a byte range this server understands.
    Malformed,
}

/// Parse a single-range `Range` header.
///
/// Accepts `bytes=start-end`, open-ended `bytes=start-`, and suffix
/// `bytes=-n` forms. Multi-range requests are rejected as malformed;
/// audio players never send them and coalescing windows is not worth
/// the multipart response machinery.
pub fn parse_range_header(value: &str, size: u64) -> RangeParse {
    let Some(spec) = value.trim().strip_prefix("bytes=") else {
        return RangeParse::Malformed;
    };
    if spec.contains(',') {
        return RangeParse::Malformed;
    }

    let Some((start_str, end_str)) = spec.split_once('-') else {
        return RangeParse::Malformed;
    };
    let start_str = start_str.trim();
    let end_str = end_str.trim();

    // Suffix form: last n bytes.
    if start_str.is_empty() {
        let Ok(suffix) = end_str.parse::<u64>() else {
            return RangeParse::Malformed;
        };
        if suffix == 0 || size == 0 {
            return RangeParse::Unsatisfiable;
        }
        let start = size.saturating_sub(suffix);
        return RangeParse::Satisfiable { start, end: size - 1 };
    }

    let Ok(start) = start_str.parse::<u64>() else {
        return RangeParse::Malformed;
    };

    let end = if end_str.is_empty() {
        None
    } else {
        match end_str.parse::<u64>() {
            Ok(end) => Some(end),
            Err(_) => return RangeParse::Malformed,
        }
    };

    // An inverted range is a syntax error, not a miss.
    if let Some(end) = end {
        if end < start {
            return RangeParse::Malformed;
        }
    }
    if start >= size {
        return RangeParse::Unsatisfiable;
    }

    let end = end.map_or(size - 1, |e| e.min(size - 1));
    RangeParse::Satisfiable { start, end }
}

/// Infer a content type from the object key extension.
///
/// Used when the store reports the generic `application/octet-stream`,
/// which some upload paths leave behind.
pub fn content_type_for_key(key: &str) -> &'static str {
    match key.rsplit('.').next().map(|e| e.to_ascii_lowercase()).as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("aac") => "audio/aac",
        Some("flac") => "audio/flac",
        Some("ogg") | Some("oga") => "audio/ogg",
        Some("opus") => "audio/opus",
        Some("wav") => "audio/wav",
        _ => "application/octet-stream",
    }
}

/// Stream a track, honoring a single `Range` header.
///
/// GET /api/tracks/{track_id}/stream
///
/// Returns 200 with the whole object when no range is given, 206 with
/// `Content-Range` for a satisfiable range, 400 for a malformed range,
/// 416 for a range outside the object, 404 for unknown tracks.
pub async fn stream_track(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
    caller: CallerId,
    headers: HeaderMap,
) -> ApiResult<Response> {
    if !is_valid_track_id(&track_id) {
        return Err(ApiError::bad_request("Invalid track ID format"));
    }
    let track_id = TrackId::from(track_id);

    let track = state
        .catalog
        .track(&track_id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("Track '{}' not found", track_id)))?;

    // Existence and size come from a head call; a missing object is a
    // 404 even when the catalog still lists the track.
    let object = state.reader.metadata(&track.key).await?;
    let size = object.size_bytes;

    let range = headers
        .get(header::RANGE)
        .map(|v| v.to_str().map_err(|_| ApiError::invalid_range("Range header is not valid UTF-8")))
        .transpose()?
        .map(|v| parse_range_header(v, size));

    let content_type = if object.content_type == "application/octet-stream" {
        content_type_for_key(&track.key).to_string()
    } else {
        object.content_type.clone()
    };

    let (status, range_header, window) = match range {
        None => (StatusCode::OK, None, None),
        Some(RangeParse::Satisfiable { start, end }) => (
            StatusCode::PARTIAL_CONTENT,
            Some(format!("bytes {}-{}/{}", start, end, size)),
            Some((start, end)),
        ),
        Some(RangeParse::Unsatisfiable) => {
            debug!(track_id = %track_id, size, "Unsatisfiable range");
            return Err(ApiError::UnsatisfiableRange { size });
        }
        Some(RangeParse::Malformed) => {
            return Err(ApiError::invalid_range("Malformed Range header"));
        }
    };

    metrics::record_stream_request(window.is_some());

    let store_range = window.map(|(start, end)| format!("bytes={}-{}", start, end));
    let byte_stream = state
        .reader
        .get_object(&track.key, store_range.as_deref())
        .await
        .map_err(|e| {
            warn!(track_id = %track_id, key = %track.key, error = %e, "Failed to open object stream");
            e
        })?;

    let content_length = match window {
        Some((start, end)) => end - start + 1,
        None => size,
    };

    let body = Body::from_stream(ReaderStream::new(byte_stream.into_async_read()));

    debug!(
        track_id = %track_id,
        caller = %caller.as_str(),
        status = %status,
        bytes = content_length,
        "Streaming track"
    );

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, content_length)
        .header(header::ACCEPT_RANGES, "bytes")
        // Published audio at a key is immutable, so long-lived caching
        // is safe.
        .header(header::CACHE_CONTROL, "public, max-age=31536000");

    if let Some(content_range) = range_header {
        builder = builder.header(header::CONTENT_RANGE, content_range);
    }

    builder
        .body(body)
        .map_err(|e| ApiError::internal(format!("Failed to build response: {}", e)))
}
