//! Encryption at rest
//!
//! Payloads are sealed with XSalsa20-Poly1305 (NaCl `secretbox`) under a
//! single 32-byte key. Every encode draws a fresh random 24-byte nonce, large
//! enough that random nonces never realistically collide.
//!
//! Frame layout, with no version byte or length prefix. The tag comes first,
//! as NaCl `secretbox` writes it, so frames from other secretbox users open
//! here unchanged:
//!
//! ```text
//! [NONCE:24][TAG:16][CIPHERTEXT:n]
//! ```

use super::{Codec, CodecError, CodecResult, EncodedPayload};
use crate::common::config::ENCRYPTION_KEY_SIZE;
use crypto_secretbox::{
    aead::{generic_array::GenericArray, Aead, KeyInit},
    XSalsa20Poly1305,
};
use rand::RngCore;
use std::fmt;
use std::io::{ErrorKind, Read};

/// Size of the random nonce prefixing every frame
pub const NONCE_SIZE: usize = 24;

/// Size of the Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;

/// Seals payloads under a fixed symmetric key
pub struct EncryptedCodec {
    cipher: XSalsa20Poly1305,
}

impl EncryptedCodec {
    pub fn new(key: [u8; ENCRYPTION_KEY_SIZE]) -> Self {
        Self {
            cipher: XSalsa20Poly1305::new(GenericArray::from_slice(&key)),
        }
    }

    /// Build from an arbitrary slice, rejecting anything but 32 bytes
    pub fn from_slice(key: &[u8]) -> CodecResult<Self> {
        let key: [u8; ENCRYPTION_KEY_SIZE] =
            key.try_into().map_err(|_| CodecError::InvalidKey {
                got: key.len(),
                expected: ENCRYPTION_KEY_SIZE,
            })?;
        Ok(Self::new(key))
    }

    /// Generate a new random key (for initial setup)
    pub fn generate_key() -> [u8; ENCRYPTION_KEY_SIZE] {
        let mut key = [0u8; ENCRYPTION_KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut key);
        key
    }
}

impl fmt::Debug for EncryptedCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedCodec").finish_non_exhaustive()
    }
}

/// Read the nonce, telling a short stream apart from other I/O failures
fn read_nonce(reader: &mut dyn Read) -> CodecResult<[u8; NONCE_SIZE]> {
    let mut nonce = [0u8; NONCE_SIZE];
    let mut got = 0;
    while got < NONCE_SIZE {
        match reader.read(&mut nonce[got..]) {
            Ok(0) => {
                return Err(CodecError::ShortFrame {
                    got,
                    expected: NONCE_SIZE,
                })
            }
            Ok(n) => got += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(CodecError::Io(e)),
        }
    }
    Ok(nonce)
}

impl Codec for EncryptedCodec {
    fn encode(&self, plaintext: &[u8]) -> CodecResult<EncodedPayload> {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);

        let sealed = self
            .cipher
            .encrypt(GenericArray::from_slice(&nonce), plaintext)
            .map_err(|e| CodecError::Encryption(e.to_string()))?;

        let mut frame = Vec::with_capacity(NONCE_SIZE + sealed.len());
        frame.extend_from_slice(&nonce);
        frame.extend_from_slice(&sealed);
        Ok(EncodedPayload::new(frame))
    }

    fn decode(&self, reader: &mut dyn Read) -> CodecResult<Vec<u8>> {
        let nonce = read_nonce(reader)?;

        let mut sealed = Vec::new();
        reader.read_to_end(&mut sealed)?;

        self.cipher
            .decrypt(GenericArray::from_slice(&nonce), sealed.as_slice())
            .map_err(|_| CodecError::Decryption)
    }

    fn name(&self) -> &'static str {
        "xsalsa20poly1305"
    }

    fn is_encrypted(&self) -> bool {
        true
    }
}
