//! # Keyward Core
//!
//! Pure primitives for Keyward: identifiers, records, key bundles, key
//! derivation, and the sealed envelope format.
//!
//! This crate does no I/O. Key stores, persistence, and the rotation
//! protocol live in the other workspace crates.
//!
//! ## Key Types
//!
//! - [`KeyBundle`] - A document key with its [`KeyImage`] and hex encoding
//! - [`KeyImage`] - BLAKE3 handle used to look a key up without exposing it
//! - [`Document`], [`Permission`], [`Setting`] - Records held by the store
//! - [`KdfParams`] / [`Salt`] - Successor key derivation (PBKDF2-HMAC-SHA256)
//!
//! ## Usage
//!
//! ```rust
//! use keyward_core::{KeyBundle, KdfParams, Salt};
//!
//! let bundle = KeyBundle::fresh();
//! let token = bundle.encrypt(b"hello").unwrap();
//! assert_eq!(bundle.decrypt(&token).unwrap(), b"hello");
//!
//! let successor = bundle.derive(Salt::generate(), &KdfParams::default()).unwrap();
//! let next = KeyBundle::from_derivation(&successor);
//! assert_ne!(next.key_image(), bundle.key_image());
//! ```

pub mod crypto;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod record;
pub mod types;

pub use crypto::{EncryptionNonce, KeyBundle, KeyMaterial, KEY_LEN};
pub use envelope::{SealFormat, SealedEnvelope};
pub use error::{CoreError, Result};
pub use kdf::{derive, derive_fresh, Derivation, KdfParams, Salt, MIN_KDF_ITERATIONS, SALT_LEN};
pub use record::{AccountStats, Capability, Document, Permission, Setting};
pub use types::{AccountId, ContentId, KeyImage, PermissionId, ThirdPartyId, KEY_IMAGE_HEX_LEN};

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}
