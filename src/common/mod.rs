//! Common utilities and types shared across s3vault

pub mod config;
pub mod error;
pub mod keys;
pub mod utils;

pub use config::{Config, LockConfig};
pub use error::{Contention, Error, Result};
pub use keys::{is_lock_key, KeyMapper, LOCK_SUFFIX};
pub use utils::{format_bytes, parse_duration, timestamp_now, validate_key};
