//! # Keyward
//!
//! A confidentiality engine: account owners store encrypted documents and
//! grant third parties revocable, time-bounded read access.
//!
//! ## Overview
//!
//! - **Two-factor gate**: a third-party read needs an active grant *and* the
//!   owner's delegation opt-in. Refusals have no side effects.
//! - **Rotation on read**: every authorized third-party read derives a
//!   successor key (PBKDF2, fresh salt), re-encrypts, and swings the
//!   document's key image with a compare-and-swap.
//! - **Key stores**: keys live in a volatile in-memory store or in
//!   HashiCorp Vault, addressed by [`KeyImage`](core::KeyImage).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use keyward::{Engine, EngineConfig};
//! use keyward::core::{AccountId, Capability, ThirdPartyId};
//! use keyward::store::SqliteStore;
//!
//! async fn example() {
//!     let store = SqliteStore::open("keyward.db").unwrap();
//!     let engine = Engine::from_config(store, EngineConfig::default()).unwrap();
//!
//!     let owner = AccountId::new("acct-1").unwrap();
//!     let party = ThirdPartyId::new("lender-7").unwrap();
//!
//!     let doc = engine.create_document(&owner, "statement.xml", b"<x/>").await.unwrap();
//!     engine
//!         .grant_permission(&owner, &party, &doc.content_id, Capability::Read, None)
//!         .await
//!         .unwrap();
//!     engine.set_delegation(&owner, true).await.unwrap();
//!
//!     let outcome = engine
//!         .access_and_rotate(&party, &doc.content_id, &owner)
//!         .await
//!         .unwrap();
//!     assert_eq!(outcome.plaintext, b"<x/>");
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `keyward::core` - Identifiers, records, key bundles
//! - `keyward::keystore` - Key store backends
//! - `keyward::store` - Persistence collaborator
//! - `keyward::access` - Access gate

pub mod config;
pub mod engine;
pub mod error;
pub mod locks;
pub mod rotation;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use locks::DocumentLocks;
pub use rotation::AccessOutcome;

pub use keyward_access as access;
pub use keyward_core as core;
pub use keyward_keystore as keystore;
pub use keyward_store as store;

pub use keyward_access::{AccessGate, CapabilityPolicy};
pub use keyward_core::{
    AccountId, AccountStats, Capability, ContentId, Document, KeyImage, Permission, PermissionId,
    Setting, ThirdPartyId,
};
pub use keyward_keystore::{KeyStore, KeyStoreConfig, MemoryKeyStore, VaultConfig, VaultKeyStore};
pub use keyward_store::{MemoryStore, SqliteStore, Store};
