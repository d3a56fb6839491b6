//! S3-compatible store client.

use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use lectio_models::{MediaObject, SignedUrl};

use crate::error::{StorageError, StorageResult};
use crate::retry::{with_retry, RetryPolicy};
use crate::url_style::UrlStyle;

/// Configuration for the store client.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// S3 API endpoint URL
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region ("auto" works for most S3-compatible providers)
    pub region: String,
    /// Style for outgoing presigned URLs
    pub url_style: UrlStyle,
    /// Retry policy for transient read errors
    pub retry: RetryPolicy,
}

impl StoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let url_style = match std::env::var("S3_URL_STYLE") {
            Ok(s) => s.parse()?,
            Err(_) => UrlStyle::default(),
        };

        Ok(Self {
            endpoint_url: std::env::var("S3_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("S3_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("S3_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("S3_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("S3_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("S3_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("S3_BUCKET_NAME")
                .map_err(|_| StorageError::config_error("S3_BUCKET_NAME not set"))?,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "auto".to_string()),
            url_style,
            retry: RetryPolicy::from_env(),
        })
    }
}

/// Gateway to the S3-compatible object store.
///
/// Holds only immutable configuration after construction, so one instance
/// is safely shared across arbitrarily many concurrent requests without
/// locks.
#[derive(Clone)]
pub struct StoreClient {
    client: Client,
    bucket: String,
    url_style: UrlStyle,
    retry: RetryPolicy,
}

impl StoreClient {
    /// Create a new client from configuration.
    pub async fn new(config: StoreConfig) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "lectio",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        let client = Client::from_conf(sdk_config);

        Ok(Self {
            client,
            bucket: config.bucket_name,
            url_style: config.url_style,
            retry: config.retry,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = StoreConfig::from_env()?;
        Self::new(config).await
    }

    /// Check whether an object exists.
    ///
    /// Not-found is swallowed into `false`; every other error propagates.
    pub async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self.metadata(key).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Fetch the metadata snapshot of one object.
    pub async fn metadata(&self, key: &str) -> StorageResult<MediaObject> {
        let output = with_retry(&self.retry, "head_object", || async {
            self.client
                .head_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| head_error(key, e))
        })
        .await?;

        Ok(MediaObject {
            key: key.to_string(),
            size_bytes: output.content_length().unwrap_or(0).max(0) as u64,
            content_type: output
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string(),
            last_modified: output
                .last_modified()
                .and_then(|t| t.to_millis().ok())
                .and_then(DateTime::<Utc>::from_timestamp_millis),
        })
    }

    /// Open an object for reading, optionally restricted to a byte range.
    ///
    /// `range` takes a raw `bytes=start-end` header value. The returned
    /// stream is forwarded incrementally by callers; nothing is buffered
    /// here.
    pub async fn get_object(&self, key: &str, range: Option<&str>) -> StorageResult<ByteStream> {
        let output = with_retry(&self.retry, "get_object", || async {
            let mut request = self.client.get_object().bucket(&self.bucket).key(key);
            if let Some(r) = range {
                request = request.range(r);
            }
            request.send().await.map_err(|e| get_error(key, e))
        })
        .await?;

        Ok(output.body)
    }

    /// Generate a presigned GET URL.
    ///
    /// Purely local cryptographic computation; no network round-trip.
    pub async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<SignedUrl> {
        self.presign(key, expires_in, None).await
    }

    /// Generate a presigned GET URL that downloads as an attachment with
    /// the given filename. The disposition is part of the signed query, so
    /// clients cannot strip or alter it.
    pub async fn presign_download(
        &self,
        key: &str,
        expires_in: Duration,
        filename: &str,
    ) -> StorageResult<SignedUrl> {
        self.presign(key, expires_in, Some(filename)).await
    }

    async fn presign(
        &self,
        key: &str,
        expires_in: Duration,
        filename: Option<&str>,
    ) -> StorageResult<SignedUrl> {
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let mut request = self.client.get_object().bucket(&self.bucket).key(key);
        if let Some(name) = filename {
            request = request
                .response_content_disposition(format!("attachment; filename=\"{}\"", name));
        }

        let presigned = request
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(format!("{}", DisplayErrorContext(&e))))?;

        let url = self.url_style.normalize(&self.bucket, &presigned.uri().to_string())?;

        Ok(SignedUrl {
            url,
            key: key.to_string(),
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in.as_secs() as i64),
        })
    }

    /// List objects under a prefix. Finite: follows continuation tokens
    /// until the store reports the listing complete.
    pub async fn list_keys(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        debug!("Listing objects with prefix: {}", prefix);

        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let token = continuation_token.clone();
            let response = with_retry(&self.retry, "list_objects_v2", || {
                let token = token.clone();
                async {
                    let mut request = self
                        .client
                        .list_objects_v2()
                        .bucket(&self.bucket)
                        .prefix(prefix);
                    if let Some(t) = token {
                        request = request.continuation_token(t);
                    }
                    request.send().await.map_err(|e| {
                        if is_transient(&e) {
                            StorageError::transient(format!("{}", DisplayErrorContext(&e)))
                        } else {
                            StorageError::ListFailed(format!("{}", DisplayErrorContext(&e)))
                        }
                    })
                }
            })
            .await?;

            if let Some(ref contents) = response.contents {
                for obj in contents {
                    objects.push(ObjectInfo {
                        key: obj.key.clone().unwrap_or_default(),
                        size_bytes: obj.size.unwrap_or(0).max(0) as u64,
                        last_modified: obj
                            .last_modified
                            .as_ref()
                            .and_then(|t| t.to_millis().ok())
                            .and_then(DateTime::<Utc>::from_timestamp_millis),
                    });
                }
            }

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token;
            } else {
                break;
            }
        }

        Ok(objects)
    }

    /// Check connectivity to the store via a head-bucket call.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| {
                StorageError::read_failed(format!(
                    "Store connectivity check failed: {}",
                    DisplayErrorContext(&e)
                ))
            })?;
        Ok(())
    }

    /// Bucket this client is bound to.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// Read-side seam over the store, so responders that head and stream
/// objects can be exercised without a live bucket.
#[async_trait]
pub trait ObjectReader: Send + Sync {
    /// Metadata snapshot of one object.
    async fn metadata(&self, key: &str) -> StorageResult<MediaObject>;

    /// Open an object for reading, optionally restricted to a byte range
    /// given as a raw `bytes=start-end` header value.
    async fn get_object(&self, key: &str, range: Option<&str>) -> StorageResult<ByteStream>;
}

#[async_trait]
impl ObjectReader for StoreClient {
    async fn metadata(&self, key: &str) -> StorageResult<MediaObject> {
        StoreClient::metadata(self, key).await
    }

    async fn get_object(&self, key: &str, range: Option<&str>) -> StorageResult<ByteStream> {
        StoreClient::get_object(self, key, range).await
    }
}

/// Listing entry for one stored object.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    /// Object key
    pub key: String,
    /// Size in bytes
    pub size_bytes: u64,
    /// Last modified timestamp
    pub last_modified: Option<DateTime<Utc>>,
}

fn is_transient<E, R>(err: &SdkError<E, R>) -> bool {
    matches!(
        err,
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_)
    )
}

fn head_error(key: &str, err: SdkError<HeadObjectError>) -> StorageError {
    match &err {
        SdkError::ServiceError(ctx) if ctx.err().is_not_found() => StorageError::not_found(key),
        _ if is_transient(&err) => {
            StorageError::transient(format!("{}", DisplayErrorContext(&err)))
        }
        _ => StorageError::read_failed(format!("{}", DisplayErrorContext(&err))),
    }
}

fn get_error(key: &str, err: SdkError<GetObjectError>) -> StorageError {
    match &err {
        SdkError::ServiceError(ctx) if ctx.err().is_no_such_key() => StorageError::not_found(key),
        _ if is_transient(&err) => {
            StorageError::transient(format!("{}", DisplayErrorContext(&err)))
        }
        _ => StorageError::read_failed(format!("{}", DisplayErrorContext(&err))),
    }
}
