//! Pass-through codec

use super::{Codec, CodecResult, EncodedPayload};
use bytes::Bytes;
use std::io::Read;

/// Stores payloads unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCodec;

impl Codec for IdentityCodec {
    fn encode(&self, plaintext: &[u8]) -> CodecResult<EncodedPayload> {
        Ok(EncodedPayload::new(Bytes::copy_from_slice(plaintext)))
    }

    fn decode(&self, reader: &mut dyn Read) -> CodecResult<Vec<u8>> {
        let mut plaintext = Vec::new();
        reader.read_to_end(&mut plaintext)?;
        Ok(plaintext)
    }

    fn name(&self) -> &'static str {
        "identity"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_passthrough() {
        let encoded = IdentityCodec.encode(b"hello").unwrap();
        assert_eq!(encoded.body.as_ref(), b"hello");
        assert_eq!(encoded.content_length, 5);

        let mut reader: &[u8] = b"hello";
        assert_eq!(IdentityCodec.decode(&mut reader).unwrap(), b"hello");
    }

    #[test]
    fn test_identity_empty() {
        let encoded = IdentityCodec.encode(b"").unwrap();
        assert_eq!(encoded.content_length, 0);
        let mut reader: &[u8] = b"";
        assert!(IdentityCodec.decode(&mut reader).unwrap().is_empty());
    }
}
