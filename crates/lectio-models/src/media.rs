//! Object store snapshots and signed URLs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable metadata snapshot of one stored object.
///
/// Fetched on demand from the store and discarded after the request;
/// never cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaObject {
    /// Object key in the bucket.
    pub key: String,
    /// Exact size in bytes.
    pub size_bytes: u64,
    /// Content type as recorded by the store.
    pub content_type: String,
    /// Last modification time, when the store reports one.
    pub last_modified: Option<DateTime<Utc>>,
}

/// A time-limited presigned URL for one object.
///
/// Ephemeral, generated per call, owned solely by the caller that
/// requested it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedUrl {
    /// The presigned URL, already normalized to the configured style.
    pub url: String,
    /// Object key the URL grants access to.
    pub key: String,
    /// When the URL stops working.
    pub expires_at: DateTime<Utc>,
}
