//! Object store abstraction
//!
//! The rest of the crate only talks to remote storage through [`ObjectStore`].
//! Backends translate their own "missing object" shapes into
//! [`BackendError::NotFound`] so lock and facade logic never inspect SDK types.

pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;

pub use memory::MemStore;
#[cfg(feature = "s3")]
pub use s3::S3Store;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Object store round trips, used for error context and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Put,
    Get,
    Head,
    Delete,
    List,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Put => write!(f, "put"),
            Operation::Get => write!(f, "get"),
            Operation::Head => write!(f, "head"),
            Operation::Delete => write!(f, "delete"),
            Operation::List => write!(f, "list"),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum BackendError {
    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("{op} {key} failed: {message}")]
    Service {
        op: Operation,
        key: String,
        message: String,
    },
}

impl BackendError {
    pub fn not_found(key: &str) -> Self {
        BackendError::NotFound {
            key: key.to_string(),
        }
    }

    pub fn service(op: Operation, key: &str, message: impl Into<String>) -> Self {
        BackendError::Service {
            op,
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// Did the store definitively report the object as absent?
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound { .. })
    }
}

/// Metadata returned by a HEAD-style probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    /// Store-assigned; `None` if the backend did not report it
    pub last_modified: Option<DateTime<Utc>>,
}

/// One page of a listing
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Full object keys directly under the prefix
    pub objects: Vec<String>,
    /// Grouped prefixes (with trailing delimiter), only when a delimiter was given
    pub common_prefixes: Vec<String>,
    /// Token to fetch the next page, `None` on the last page
    pub next_token: Option<String>,
}

/// Trait for object store backends
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, body: Bytes, content_length: u64) -> BackendResult<()>;

    async fn get(&self, key: &str) -> BackendResult<Bytes>;

    async fn head(&self, key: &str) -> BackendResult<ObjectMeta>;

    async fn delete(&self, key: &str) -> BackendResult<()>;

    async fn list_page(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        token: Option<String>,
    ) -> BackendResult<ListPage>;

    /// Human readable location of an object, for diagnostics
    fn describe(&self, key: &str) -> String {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(BackendError::not_found("a").is_not_found());
        assert!(!BackendError::service(Operation::Head, "a", "denied").is_not_found());
    }

    #[test]
    fn test_error_display() {
        let err = BackendError::service(Operation::Delete, "p/k.lock", "slow down");
        assert_eq!(err.to_string(), "delete p/k.lock failed: slow down");
    }
}
