//! Error types for key store backends.

use keyward_core::KeyImage;
use thiserror::Error;

/// Errors from a key store backend.
#[derive(Debug, Error)]
pub enum KeyStoreError {
    /// No entry for this image. The document pointing at it cannot be opened.
    #[error("key not found for image {0}")]
    KeyNotFound(KeyImage),

    /// The backend could not be reached or answered unexpectedly.
    #[error("key store backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Backend configuration was rejected at construction.
    #[error("key store configuration error: {0}")]
    Config(String),
}

impl KeyStoreError {
    /// Whether a retry with backoff may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, KeyStoreError::BackendUnavailable(_))
    }
}

/// Result type for key store operations.
pub type Result<T> = std::result::Result<T, KeyStoreError>;
