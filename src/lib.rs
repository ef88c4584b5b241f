//! # s3vault
//!
//! Durable key/value storage on top of an object store (S3 and compatibles):
//! - CRUD over opaque byte blobs addressed by slash-delimited keys
//! - Best-effort distributed locks built from HEAD/PUT/DELETE alone
//! - Optional encryption at rest (XSalsa20-Poly1305 secretbox, 24-byte random nonces)
//!
//! ## Architecture
//!
//! ```text
//!   caller ──► Storage ──► Codec ──► ObjectStore ──► bucket
//!     │                                  ▲
//!     └──────► LockManager ──────────────┘
//!              (<prefix>/<key>.lock)
//! ```
//!
//! The facade never takes locks on its own; callers bracket their critical
//! sections with [`Storage::lock`] and [`Storage::unlock`].
//!
//! ## Usage
//!
//! ```no_run
//! use s3vault::{Config, Storage};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> s3vault::Result<()> {
//! let storage = Storage::connect(&Config::new("my-bucket")).await?;
//! let cancel = CancellationToken::new();
//!
//! storage.lock("certificates/example.com", &cancel).await?;
//! storage.store("certificates/example.com/example.com.crt", b"PEM").await?;
//! storage.unlock("certificates/example.com").await?;
//!
//! match storage.load("certificates/other.com/other.com.crt").await {
//!     Err(e) if e.is_not_found() => println!("not issued yet"),
//!     other => println!("{:?}", other.map(|v| v.len())),
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod codec;
pub mod common;
pub mod lock;
pub mod storage;

// Re-export commonly used types
pub use backend::{BackendError, MemStore, ObjectStore};
pub use codec::{Codec, CodecError, EncryptedCodec, IdentityCodec};
pub use common::{Config, Contention, Error, KeyMapper, LockConfig, Result};
pub use lock::LockManager;
pub use storage::{KeyInfo, Storage};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
