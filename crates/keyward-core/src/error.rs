//! Error types for Keyward core primitives.

use thiserror::Error;

/// Errors from key handling, sealing, and identifier parsing.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Authenticated decryption failed: wrong key, or the token was altered.
    #[error("integrity failure: {0}")]
    IntegrityFailure(String),

    /// Key material is not 32 bytes of hex.
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// Encryption could not be performed.
    #[error("encryption error: {0}")]
    EncryptionError(String),

    /// Key derivation parameters were rejected.
    #[error("key derivation error: {0}")]
    KeyDerivation(String),

    /// A key image was not a lowercase 64-char hex digest.
    #[error("invalid key image: {0}")]
    InvalidKeyImage(String),

    /// An identifier was empty.
    #[error("empty {0}")]
    EmptyIdentifier(&'static str),

    /// Unknown capability name.
    #[error("unknown capability: {0}")]
    UnknownCapability(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
