//! Provider URL style normalization.
//!
//! Some S3-compatible providers emit virtual-hosted presigned URLs
//! (`bucket.endpoint/key`) while others only accept path style
//! (`endpoint/bucket/key`). The strategy is picked once at startup and
//! applied as a pure rewrite on every presigned URL, so provider quirks
//! never leak into the signing or streaming logic.

use std::str::FromStr;

use url::Url;

use crate::error::{StorageError, StorageResult};

/// Desired URL style for outgoing presigned URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UrlStyle {
    /// `endpoint/bucket/key`
    #[default]
    Path,
    /// `bucket.endpoint/key`
    VirtualHosted,
}

impl FromStr for UrlStyle {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "path" => Ok(Self::Path),
            "virtual" | "virtual-hosted" | "vhost" => Ok(Self::VirtualHosted),
            other => Err(StorageError::config_error(format!(
                "Unknown URL style '{}', expected 'path' or 'virtual'",
                other
            ))),
        }
    }
}

impl UrlStyle {
    /// Rewrite `raw` into this style for the given bucket.
    ///
    /// URLs already in the target style pass through unchanged, query
    /// parameters (including the signature) are preserved verbatim.
    pub fn normalize(&self, bucket: &str, raw: &str) -> StorageResult<String> {
        let mut parsed =
            Url::parse(raw).map_err(|e| StorageError::InvalidUrl(format!("{}: {}", raw, e)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| StorageError::InvalidUrl(format!("URL has no host: {}", raw)))?
            .to_string();

        match self {
            UrlStyle::Path => {
                let Some(parent) = host.strip_prefix(&format!("{}.", bucket)) else {
                    return Ok(parsed.into());
                };
                let parent = parent.to_string();
                let new_path = format!("/{}{}", bucket, parsed.path());
                parsed
                    .set_host(Some(&parent))
                    .map_err(|e| StorageError::InvalidUrl(e.to_string()))?;
                parsed.set_path(&new_path);
            }
            UrlStyle::VirtualHosted => {
                if host.starts_with(&format!("{}.", bucket)) {
                    return Ok(parsed.into());
                }
                let Some(rest) = parsed.path().strip_prefix(&format!("/{}", bucket)) else {
                    return Ok(parsed.into());
                };
                // Reject keys like "bucketsuffix/..." masquerading as the bucket segment.
                if !rest.is_empty() && !rest.starts_with('/') {
                    return Ok(parsed.into());
                }
                let rest = if rest.is_empty() { "/".to_string() } else { rest.to_string() };
                parsed
                    .set_host(Some(&format!("{}.{}", bucket, host)))
                    .map_err(|e| StorageError::InvalidUrl(e.to_string()))?;
                parsed.set_path(&rest);
            }
        }

        Ok(parsed.into())
    }
}
