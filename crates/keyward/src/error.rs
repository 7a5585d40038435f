//! Error types for the engine.

use keyward_access::AccessError;
use keyward_core::{AccountId, ContentId, CoreError, KeyImage, PermissionId};
use keyward_keystore::KeyStoreError;
use keyward_store::StoreError;
use thiserror::Error;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No usable grant. No side effects.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The owner has not opted in to third-party access. No side effects.
    #[error("delegation disabled for account {0}")]
    DelegationDisabled(String),

    /// The key store has no entry for a document's key image.
    ///
    /// The document cannot be opened; this is data corruption, not a
    /// transient condition.
    #[error("key not found for image {0}")]
    KeyNotFound(KeyImage),

    /// Authenticated decryption failed, or stored key material does not
    /// match the document's key image.
    #[error("integrity failure: {0}")]
    IntegrityFailure(String),

    /// The key store backend could not be reached. May be retried.
    #[error("key store backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Another writer re-sealed the document first. May be retried.
    #[error("persistence conflict on {document}: expected image {expected}, found {current}")]
    PersistenceConflict {
        document: ContentId,
        expected: KeyImage,
        current: KeyImage,
    },

    /// Document not found.
    #[error("document not found: {0}")]
    DocumentNotFound(ContentId),

    /// Permission not found.
    #[error("permission not found: {0}")]
    PermissionNotFound(PermissionId),

    /// The account does not own the document.
    #[error("account {account} does not own document {document}")]
    NotOwner {
        account: AccountId,
        document: ContentId,
    },

    /// Empty or malformed input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Key store material is not a 32-byte hex key.
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// Encryption or key derivation failed.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Configuration rejected.
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Whether the caller may retry the same call (with backoff).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::BackendUnavailable(_) | EngineError::PersistenceConflict { .. }
        )
    }

    /// Whether the error describes the request rather than the system.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            EngineError::PermissionDenied(_)
                | EngineError::DelegationDisabled(_)
                | EngineError::DocumentNotFound(_)
                | EngineError::PermissionNotFound(_)
                | EngineError::NotOwner { .. }
                | EngineError::InvalidInput(_)
        )
    }
}

impl From<CoreError> for EngineError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::IntegrityFailure(msg) => EngineError::IntegrityFailure(msg),
            CoreError::InvalidKeyMaterial(msg) => EngineError::InvalidKeyMaterial(msg),
            CoreError::EncryptionError(msg) | CoreError::KeyDerivation(msg) => {
                EngineError::Crypto(msg)
            }
            other @ (CoreError::InvalidKeyImage(_)
            | CoreError::EmptyIdentifier(_)
            | CoreError::UnknownCapability(_)) => EngineError::InvalidInput(other.to_string()),
        }
    }
}

impl From<KeyStoreError> for EngineError {
    fn from(e: KeyStoreError) -> Self {
        match e {
            KeyStoreError::KeyNotFound(image) => EngineError::KeyNotFound(image),
            KeyStoreError::BackendUnavailable(msg) => EngineError::BackendUnavailable(msg),
            KeyStoreError::Config(msg) => EngineError::Config(msg),
        }
    }
}

impl From<AccessError> for EngineError {
    fn from(e: AccessError) -> Self {
        match e {
            AccessError::InvalidInput(inner) => EngineError::InvalidInput(inner.to_string()),
            AccessError::PermissionDenied(msg) => EngineError::PermissionDenied(msg),
            AccessError::DelegationDisabled(account) => EngineError::DelegationDisabled(account),
            AccessError::DocumentNotFound(id) => EngineError::DocumentNotFound(id),
            AccessError::Store(inner) => EngineError::Store(inner),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_flags() {
        let conflict = EngineError::PersistenceConflict {
            document: ContentId::new("doc").unwrap(),
            expected: KeyImage::of_hex("00"),
            current: KeyImage::of_hex("01"),
        };
        assert!(conflict.is_retryable());
        assert!(!conflict.is_user_facing());

        let unavailable = EngineError::from(KeyStoreError::BackendUnavailable("down".into()));
        assert!(unavailable.is_retryable());

        let missing = EngineError::from(KeyStoreError::KeyNotFound(KeyImage::of_hex("00")));
        assert!(!missing.is_retryable());
        assert!(!missing.is_user_facing());

        let denied = EngineError::from(AccessError::PermissionDenied("no grant".into()));
        assert!(denied.is_user_facing());
        assert!(!denied.is_retryable());
    }

    #[test]
    fn test_integrity_failure_maps_through() {
        let err = EngineError::from(CoreError::IntegrityFailure("tag".into()));
        assert!(matches!(err, EngineError::IntegrityFailure(_)));
        assert!(!err.is_retryable());
    }
}
