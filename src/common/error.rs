//! Error types for s3vault

use crate::backend::BackendError;
use crate::codec::CodecError;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === Lookup Errors ===
    #[error("Key not found: {0}")]
    NotFound(String),

    // === Data Errors ===
    #[error("Corrupted data for {key}: {source}")]
    Corrupted {
        key: String,
        #[source]
        source: CodecError,
    },

    #[error("Preparing data for storing {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: CodecError,
    },

    // === Lock Errors ===
    #[error("Timeout acquiring lock for {key}: {source}")]
    LockTimeout {
        key: String,
        #[source]
        source: Contention,
    },

    #[error("Lock attempt for {key} cancelled")]
    Cancelled { key: String },

    // === Store Errors ===
    #[error("{op} {key}: {source}")]
    Backend {
        op: &'static str,
        key: String,
        #[source]
        source: BackendError,
    },

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config source error: {0}")]
    ConfigSource(#[from] config::ConfigError),
}

/// Why a lock could not be taken before the acquisition timeout.
#[derive(Error, Debug)]
pub enum Contention {
    #[error("lock held by another process (last modified {last_modified})")]
    Held { last_modified: DateTime<Utc> },

    #[error("failed to write lock object: {0}")]
    WriteFailed(#[source] BackendError),
}

impl Error {
    /// Is this the not-found sentinel?
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Attach operation and key context to a backend failure.
    pub(crate) fn backend(op: &'static str, key: &str, source: BackendError) -> Self {
        Error::Backend {
            op,
            key: key.to_string(),
            source,
        }
    }
}
