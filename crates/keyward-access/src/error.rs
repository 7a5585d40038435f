//! Error types for access decisions.

use keyward_core::{ContentId, CoreError};
use keyward_store::StoreError;
use thiserror::Error;

/// Why a request was refused, or why it could not be evaluated.
#[derive(Debug, Error)]
pub enum AccessError {
    /// A request field was empty or malformed.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] CoreError),

    /// No usable grant for this third party on this document.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The owning account has not opted in to third-party access.
    #[error("delegation disabled for account {0}")]
    DelegationDisabled(String),

    /// A grant exists but the document does not.
    #[error("document not found: {0}")]
    DocumentNotFound(ContentId),

    /// The persistence collaborator failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for access decisions.
pub type Result<T> = std::result::Result<T, AccessError>;
