//! Configuration for s3vault
//!
//! Settings come from an optional TOML file layered under `S3VAULT_*`
//! environment variables (`S3VAULT_LOCK__TIMEOUT_MS=5000` sets `lock.timeout_ms`).

use crate::common::{Error, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "S3VAULT_CONFIG";

/// Prefix applied when none is configured
pub const DEFAULT_PREFIX: &str = "certmagic";

/// Size of the symmetric encryption key in bytes
pub const ENCRYPTION_KEY_SIZE: usize = 32;

/// Marks an encryption key given as base64 rather than raw bytes
const BASE64_KEY_PREFIX: &str = "base64:";

/// Global configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Bucket holding all objects
    #[serde(default)]
    pub bucket: String,

    /// Bucket region
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Key namespace prefix; `None` means [`DEFAULT_PREFIX`], empty means none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,

    /// Custom endpoint for S3-compatible services
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// 32-byte key, raw or `base64:`-prefixed; absent disables encryption
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<String>,

    #[serde(default)]
    pub lock: LockConfig,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Lock timing knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Age after which an unreleased lock is considered abandoned
    #[serde(default = "default_lock_expiration")]
    pub expiration_ms: u64,

    /// Sleep between acquisition attempts
    #[serde(default = "default_lock_poll_interval")]
    pub poll_interval_ms: u64,

    /// Total time budget for one acquisition
    #[serde(default = "default_lock_timeout")]
    pub timeout_ms: u64,
}

fn default_lock_expiration() -> u64 {
    120_000
}
fn default_lock_poll_interval() -> u64 {
    1_000
}
fn default_lock_timeout() -> u64 {
    30_000
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            expiration_ms: default_lock_expiration(),
            poll_interval_ms: default_lock_poll_interval(),
            timeout_ms: default_lock_timeout(),
        }
    }
}

impl LockConfig {
    pub fn expiration(&self) -> Duration {
        Duration::from_millis(self.expiration_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration_ms = saturating_millis(expiration);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = saturating_millis(interval);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = saturating_millis(timeout);
        self
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Config {
    /// Minimal configuration for a bucket, everything else defaulted
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            log_level: default_log_level(),
            ..Default::default()
        }
    }

    /// Load from `path` (or `$S3VAULT_CONFIG`) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path: Option<PathBuf> = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

        let mut builder = config::Config::builder();
        if let Some(path) = &path {
            tracing::debug!("Loading configuration from {:?}", path);
            builder = builder.add_source(config::File::from(path.as_path()).required(true));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix("S3VAULT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        Ok(config)
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(Error::InvalidConfig("bucket must be specified".into()));
        }
        if self.lock.poll_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "lock poll interval must be positive".into(),
            ));
        }
        self.encryption_key_bytes()?;
        Ok(())
    }

    /// Effective key prefix, without leading or trailing slashes
    pub fn key_prefix(&self) -> String {
        self.prefix
            .as_deref()
            .unwrap_or(DEFAULT_PREFIX)
            .trim_matches('/')
            .to_string()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref().filter(|r| !r.is_empty())
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref().filter(|e| !e.is_empty())
    }

    /// Explicit credentials, only when both halves are present
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (
            self.access_key_id.as_deref(),
            self.secret_access_key.as_deref(),
        ) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Some((id, secret)),
            _ => None,
        }
    }

    /// Decoded encryption key, `None` when encryption is disabled
    pub fn encryption_key_bytes(&self) -> Result<Option<[u8; ENCRYPTION_KEY_SIZE]>> {
        let raw = match self.encryption_key.as_deref() {
            None | Some("") => return Ok(None),
            Some(raw) => raw,
        };

        let bytes = match raw.strip_prefix(BASE64_KEY_PREFIX) {
            Some(encoded) => BASE64
                .decode(encoded)
                .map_err(|e| Error::InvalidConfig(format!("invalid base64 encryption key: {}", e)))?,
            None => raw.as_bytes().to_vec(),
        };

        let key: [u8; ENCRYPTION_KEY_SIZE] = bytes.as_slice().try_into().map_err(|_| {
            Error::InvalidConfig(format!(
                "encryption key must have exactly {} bytes, got {}",
                ENCRYPTION_KEY_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Some(key))
    }
}
