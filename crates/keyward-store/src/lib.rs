//! # Keyward Store
//!
//! Persistence collaborator for Keyward: documents, permission grants, and
//! account settings behind the [`Store`] trait.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all persistence operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`SwapResult`] - Outcome of the compare-and-swap used by rotation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use keyward_store::{SqliteStore, Store};
//! use keyward_core::AccountId;
//!
//! async fn example() {
//!     let store = SqliteStore::open("keyward.db").unwrap();
//!     let account = AccountId::new("acct-1").unwrap();
//!     let docs = store.list_documents(&account).await.unwrap();
//!     println!("{} documents", docs.len());
//! }
//! ```

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{Store, StoreExt, SwapResult};
