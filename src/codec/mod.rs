//! Payload codecs
//!
//! A codec sits between the plaintext a caller stores and the bytes that land
//! in the object store:
//! - [`IdentityCodec`] stores payloads as-is
//! - [`EncryptedCodec`] seals payloads with XSalsa20-Poly1305 (NaCl secretbox)
//!   under a fixed 32-byte key, framing them as `[24-byte nonce][tag][ciphertext]`
//!
//! Decoding is all-or-nothing: a codec either yields the whole plaintext or an
//! error, never a prefix of it.

pub mod encrypted;
pub mod identity;

pub use encrypted::{EncryptedCodec, NONCE_SIZE};
pub use identity::IdentityCodec;

use crate::common::config::ENCRYPTION_KEY_SIZE;
use bytes::Bytes;
use std::io::Read;
use std::sync::Arc;
use thiserror::Error;

pub type CodecResult<T> = std::result::Result<T, CodecError>;

#[derive(Error, Debug)]
pub enum CodecError {
    /// Stream ended before a full nonce could be read
    #[error("failed to read full nonce (short stream): got {got} of {expected} bytes")]
    ShortFrame { got: usize, expected: usize },

    /// Authentication failed: wrong key, corrupted or truncated ciphertext
    #[error("failed to decrypt data")]
    Decryption,

    #[error("failed to encrypt data: {0}")]
    Encryption(String),

    #[error("encryption key must have exactly {expected} bytes, got {got}")]
    InvalidKey { got: usize, expected: usize },

    #[error("reading payload: {0}")]
    Io(#[from] std::io::Error),
}

/// Bytes ready to hand to the object store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    pub body: Bytes,
    /// Length the store must be told to expect
    pub content_length: u64,
}

impl EncodedPayload {
    pub fn new(body: impl Into<Bytes>) -> Self {
        let body = body.into();
        let content_length = body.len() as u64;
        Self {
            body,
            content_length,
        }
    }
}

/// Transform between plaintext and stored bytes
pub trait Codec: Send + Sync {
    fn encode(&self, plaintext: &[u8]) -> CodecResult<EncodedPayload>;

    fn decode(&self, reader: &mut dyn Read) -> CodecResult<Vec<u8>>;

    /// Short name for logs
    fn name(&self) -> &'static str;

    fn is_encrypted(&self) -> bool {
        false
    }
}

/// Codec for an optional encryption key: identity without one
pub fn from_key(key: Option<[u8; ENCRYPTION_KEY_SIZE]>) -> Arc<dyn Codec> {
    match key {
        Some(key) => {
            tracing::info!("Encrypted storage active");
            Arc::new(EncryptedCodec::new(key))
        }
        None => {
            tracing::info!("Clear text storage active");
            Arc::new(IdentityCodec)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_key_selects_codec() {
        assert!(!from_key(None).is_encrypted());
        assert_eq!(from_key(None).name(), "identity");

        let codec = from_key(Some([1u8; ENCRYPTION_KEY_SIZE]));
        assert!(codec.is_encrypted());

        let encoded = codec.encode(b"cert").unwrap();
        let mut reader: &[u8] = &encoded.body;
        assert_eq!(codec.decode(&mut reader).unwrap(), b"cert");
    }

    #[test]
    fn test_encoded_payload_length() {
        let payload = EncodedPayload::new(vec![0u8; 10]);
        assert_eq!(payload.content_length, 10);
    }
}
