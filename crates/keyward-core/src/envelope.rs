//! Sealed document envelope.
//!
//! The ciphertext stored on a document is a CBOR-encoded envelope carrying
//! the nonce next to the AEAD output, so a single opaque byte string is
//! enough to decrypt given the right key.

use serde::{Deserialize, Serialize};

use crate::crypto::EncryptionNonce;
use crate::error::{CoreError, Result};

/// Format identifier for sealed envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SealFormat {
    /// ChaCha20-Poly1305 with a 256-bit key and random 96-bit nonce.
    ChaCha20Poly1305 = 1,
}

/// An encrypted payload with the metadata needed to open it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedEnvelope {
    pub format: SealFormat,

    /// Unique per encryption.
    pub nonce: EncryptionNonce,

    /// AEAD output (includes the Poly1305 tag).
    pub ciphertext: Vec<u8>,
}

impl SealedEnvelope {
    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).expect("CBOR serialization into Vec cannot fail");
        buf
    }

    /// Deserialize from CBOR bytes.
    ///
    /// A token that does not parse is treated as tampered.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes)
            .map_err(|e| CoreError::IntegrityFailure(format!("malformed envelope: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_serialization() {
        let envelope = SealedEnvelope {
            format: SealFormat::ChaCha20Poly1305,
            nonce: EncryptionNonce::from_bytes([5u8; 12]),
            ciphertext: vec![1, 2, 3],
        };

        let bytes = envelope.to_bytes();
        let recovered = SealedEnvelope::from_bytes(&bytes).unwrap();
        assert_eq!(envelope, recovered);
    }

    #[test]
    fn test_garbage_is_integrity_failure() {
        let err = SealedEnvelope::from_bytes(b"definitely not cbor").unwrap_err();
        assert!(matches!(err, CoreError::IntegrityFailure(_)));
    }
}
