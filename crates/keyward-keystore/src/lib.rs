//! # Keyward KeyStore
//!
//! Persistence for document keys, addressed by [`KeyImage`](keyward_core::KeyImage).
//!
//! ## Key Types
//!
//! - [`KeyStore`] - The async trait every backend implements
//! - [`MemoryKeyStore`] - Volatile backend for tests and development
//! - [`VaultKeyStore`] - Durable backend on HashiCorp Vault KV v2
//! - [`KeyStoreConfig`] - Backend selection, resolved once by [`open_keystore`]
//!
//! ## Usage
//!
//! ```rust,no_run
//! use keyward_core::KeyBundle;
//! use keyward_keystore::{open_keystore, KeyStoreConfig};
//!
//! async fn example() {
//!     let store = open_keystore(&KeyStoreConfig::InMemory).unwrap();
//!     let bundle = KeyBundle::fresh();
//!
//!     store.put(bundle.key_image(), bundle.material()).await.unwrap();
//!     let material = store.get(bundle.key_image()).await.unwrap();
//!     assert_eq!(&material, bundle.material());
//! }
//! ```

pub mod config;
pub mod error;
pub mod memory;
pub mod traits;
pub mod vault;

pub use config::{open_keystore, KeyStoreConfig, VaultConfig};
pub use error::{KeyStoreError, Result};
pub use memory::MemoryKeyStore;
pub use traits::KeyStore;
pub use vault::VaultKeyStore;
