//! Storage facade
//!
//! Public key/value operations over an [`ObjectStore`], with payloads passed
//! through the configured [`Codec`]. Store-level "not found" outcomes are
//! translated into [`Error::NotFound`] here and never leak as backend types.
//!
//! The facade does not take locks itself; callers wrap critical sections in
//! [`Storage::lock`] / [`Storage::unlock`] for the same logical key.

use crate::backend::ObjectStore;
use crate::codec::{self, Codec};
use crate::common::{is_lock_key, Config, Error, KeyMapper, LockConfig, Result};
use crate::lock::LockManager;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Metadata about a stored key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInfo {
    /// Logical key, without the namespace prefix
    pub key: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    /// Always true: directories only exist as groupings in [`Storage::list`]
    pub is_terminal: bool,
}

/// Object store backed key/value storage
#[derive(Clone)]
pub struct Storage {
    backend: Arc<dyn ObjectStore>,
    codec: Arc<dyn Codec>,
    keys: KeyMapper,
    locks: LockManager,
}

impl Storage {
    pub fn new(
        backend: Arc<dyn ObjectStore>,
        codec: Arc<dyn Codec>,
        keys: KeyMapper,
        lock_config: LockConfig,
    ) -> Self {
        let locks = LockManager::new(backend.clone(), keys.clone(), lock_config);
        Self {
            backend,
            codec,
            keys,
            locks,
        }
    }

    /// Build from configuration on top of an existing backend
    pub fn with_backend(config: &Config, backend: Arc<dyn ObjectStore>) -> Result<Self> {
        config.validate()?;
        let codec = codec::from_key(config.encryption_key_bytes()?);
        let keys = KeyMapper::new(&config.key_prefix());

        tracing::info!(
            "Storage provisioned: bucket={}, region={}, prefix={}, encryption_enabled={}",
            config.bucket,
            config.region().unwrap_or("<discovered>"),
            keys.prefix(),
            codec.is_encrypted()
        );
        Ok(Self::new(backend, codec, keys, config.lock))
    }

    /// Connect to the configured S3 bucket
    #[cfg(feature = "s3")]
    pub async fn connect(config: &Config) -> Result<Self> {
        config.validate()?;
        let backend = crate::backend::S3Store::connect(config).await?;
        Self::with_backend(config, Arc::new(backend))
    }

    pub fn keys(&self) -> &KeyMapper {
        &self.keys
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// Store `value` at `key`, overwriting whatever is there
    pub async fn store(&self, key: &str, value: &[u8]) -> Result<()> {
        let object_key = self.keys.object_key(key);
        tracing::debug!("Storing {} ({}), {} bytes", key, object_key, value.len());

        let payload = self.codec.encode(value).map_err(|source| Error::Encode {
            key: key.to_string(),
            source,
        })?;

        self.backend
            .put(&object_key, payload.body, payload.content_length)
            .await
            .map_err(|e| Error::backend("storing", key, e))
    }

    /// Load and decode the value at `key`
    pub async fn load(&self, key: &str) -> Result<Vec<u8>> {
        let object_key = self.keys.object_key(key);
        tracing::debug!("Loading {} ({})", key, object_key);

        let body = match self.backend.get(&object_key).await {
            Ok(body) => body,
            Err(e) if e.is_not_found() => return Err(Error::NotFound(key.to_string())),
            Err(e) => return Err(Error::backend("loading", key, e)),
        };

        let mut reader: &[u8] = &body;
        self.codec
            .decode(&mut reader)
            .map_err(|source| Error::Corrupted {
                key: key.to_string(),
                source,
            })
    }

    /// Delete `key`. Never fails: a missing object is fine and any other
    /// error is logged and swallowed.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let object_key = self.keys.object_key(key);
        tracing::debug!("Deleting {} ({})", key, object_key);

        match self.backend.delete(&object_key).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!("Nothing to delete for {}", key);
            }
            Err(e) => {
                tracing::warn!(
                    "Error deleting {} ({}), may or may not be an issue depending on context: {}",
                    key,
                    self.backend.describe(&object_key),
                    e
                );
            }
        }
        Ok(())
    }

    /// Does `key` exist? Errors other than "not found" are logged and read as false.
    pub async fn exists(&self, key: &str) -> bool {
        let object_key = self.keys.object_key(key);
        tracing::debug!("Checking exists {} ({})", key, object_key);

        match self.backend.head(&object_key).await {
            Ok(_) => true,
            Err(e) if e.is_not_found() => false,
            Err(e) => {
                tracing::error!("Error checking existence for {}: {}", key, e);
                false
            }
        }
    }

    /// Keys under `prefix`. Non-recursive listings return one hierarchy
    /// level, with deeper keys grouped into their directory name.
    pub async fn list(&self, prefix: &str, recursive: bool) -> Result<Vec<String>> {
        let list_prefix = self.keys.list_prefix(prefix);
        let delimiter = if recursive { None } else { Some("/") };
        tracing::debug!(
            "Listing {:?} as {:?} (recursive: {})",
            prefix,
            list_prefix,
            recursive
        );

        let mut keys = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .backend
                .list_page(&list_prefix, delimiter, token)
                .await
                .map_err(|e| Error::backend("listing", prefix, e))?;

            for group in &page.common_prefixes {
                let key = self.keys.logical_key(group).trim_end_matches('/');
                if !key.is_empty() && !is_lock_key(key) {
                    keys.push(key.to_string());
                }
            }

            for object in &page.objects {
                // Directory marker object standing for the prefix itself
                if *object == list_prefix && list_prefix.ends_with('/') {
                    continue;
                }
                let key = self.keys.logical_key(object);
                if !key.is_empty() && !is_lock_key(key) {
                    keys.push(key.to_string());
                }
            }

            token = page.next_token;
            if token.is_none() {
                break;
            }
        }
        Ok(keys)
    }

    /// Metadata for `key`
    pub async fn stat(&self, key: &str) -> Result<KeyInfo> {
        let object_key = self.keys.object_key(key);
        tracing::debug!("Stat {} ({})", key, object_key);

        match self.backend.head(&object_key).await {
            Ok(meta) => Ok(KeyInfo {
                key: key.to_string(),
                size: meta.size,
                modified: meta.last_modified,
                is_terminal: true,
            }),
            Err(e) if e.is_not_found() => Err(Error::NotFound(key.to_string())),
            Err(e) => Err(Error::backend("stat", key, e)),
        }
    }

    /// Acquire the lock for `key`; see [`LockManager::acquire`]
    pub async fn lock(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        self.locks.acquire(key, cancel).await
    }

    /// Release the lock for `key`; see [`LockManager::release`]
    pub async fn unlock(&self, key: &str) -> Result<()> {
        self.locks.release(key).await
    }
}
