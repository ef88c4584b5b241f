//! S3-compatible object store backend
//!
//! Works against AWS S3 and compatibles (MinIO, Ceph, R2). A custom endpoint
//! switches the client to path-style addressing.

use super::{BackendError, BackendResult, ListPage, ObjectMeta, ObjectStore, Operation};
use crate::common::{Config, Result};
use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Error codes S3 and compatibles use for a missing object
const NOT_FOUND_CODES: &[&str] = &["NoSuchKey", "NotFound"];

/// Region used for custom endpoints when none is configured
const FALLBACK_REGION: &str = "us-east-1";

/// S3 backend bound to a single bucket
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Build a client from configuration (region, credentials, endpoint)
    pub async fn connect(config: &Config) -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        match (config.region(), config.endpoint()) {
            (Some(region), _) => loader = loader.region(Region::new(region.to_string())),
            (None, Some(_)) => loader = loader.region(Region::new(FALLBACK_REGION)),
            (None, None) => tracing::warn!(
                "Region not specified, relying on SDK discovery; setting it explicitly is recommended for AWS S3"
            ),
        }

        match config.static_credentials() {
            Some((access_key_id, secret_access_key)) => {
                loader = loader.credentials_provider(Credentials::new(
                    access_key_id,
                    secret_access_key,
                    None,
                    None,
                    "s3vault-static",
                ));
                tracing::info!("Using explicit AWS credentials");
            }
            None => tracing::info!(
                "Using default AWS credential chain (IAM role, env vars, or shared config)"
            ),
        }

        let sdk_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = config.endpoint() {
            tracing::info!("Using custom S3 endpoint {}", endpoint);
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self::from_client(
            Client::from_conf(builder.build()),
            config.bucket.clone(),
        ))
    }

    /// Wrap an existing client
    pub fn from_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// Map an SDK failure onto the backend error space
fn classify<E, R>(op: Operation, key: &str, err: SdkError<E, R>) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    if err
        .code()
        .map(|code| NOT_FOUND_CODES.contains(&code))
        .unwrap_or(false)
    {
        return BackendError::not_found(key);
    }
    BackendError::service(op, key, DisplayErrorContext(&err).to_string())
}

fn to_chrono(dt: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(dt.secs(), dt.subsec_nanos())
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, key: &str, body: Bytes, content_length: u64) -> BackendResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_length(content_length as i64)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| classify(Operation::Put, key, e))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> BackendResult<Bytes> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(Operation::Get, key, e))?;

        let data = resp.body.collect().await.map_err(|e| {
            BackendError::service(Operation::Get, key, format!("reading body: {}", e))
        })?;
        Ok(data.into_bytes())
    }

    async fn head(&self, key: &str) -> BackendResult<ObjectMeta> {
        let resp = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(Operation::Head, key, e))?;

        Ok(ObjectMeta {
            key: key.to_string(),
            size: resp.content_length().unwrap_or(0).max(0) as u64,
            last_modified: resp.last_modified().and_then(to_chrono),
        })
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(Operation::Delete, key, e))?;
        Ok(())
    }

    async fn list_page(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        token: Option<String>,
    ) -> BackendResult<ListPage> {
        let mut req = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix);
        if let Some(delimiter) = delimiter {
            req = req.delimiter(delimiter);
        }
        if let Some(token) = token {
            req = req.continuation_token(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| classify(Operation::List, prefix, e))?;

        let next_token = if resp.is_truncated().unwrap_or(false) {
            resp.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage {
            objects: resp
                .contents()
                .iter()
                .filter_map(|obj| obj.key().map(str::to_string))
                .collect(),
            common_prefixes: resp
                .common_prefixes()
                .iter()
                .filter_map(|cp| cp.prefix().map(str::to_string))
                .collect(),
            next_token,
        })
    }

    fn describe(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}
