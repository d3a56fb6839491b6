//! Object store gateway for the lectio backend.
//!
//! This crate provides:
//! - An immutable-after-init S3-compatible client wrapper (existence,
//!   metadata, ranged reads, listing, local presigning)
//! - Provider URL style normalization (path vs virtual-hosted)
//! - Bounded retry with backoff for transient read errors
//! - The parallel manifest builder and its short-TTL cache

pub mod cache;
pub mod client;
pub mod error;
pub mod manifest;
pub mod retry;
pub mod url_style;

pub use aws_sdk_s3::primitives::ByteStream;

pub use cache::{manifest_cache_key, ManifestCache};
pub use client::{ObjectInfo, ObjectReader, StoreClient, StoreConfig};
pub use error::{StorageError, StorageResult};
pub use manifest::{DeliveryConfig, ManifestBuilder, ManifestError, UrlSigner};
pub use retry::RetryPolicy;
pub use url_style::UrlStyle;
