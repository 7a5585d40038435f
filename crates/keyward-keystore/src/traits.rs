//! KeyStore trait: key-image → key material persistence.
//!
//! The engine only ever sees `Arc<dyn KeyStore>`, chosen once at
//! construction from configuration.

use async_trait::async_trait;
use keyward_core::{KeyImage, KeyMaterial};

use crate::error::Result;

/// Async interface to a key store backend.
///
/// # Design Notes
///
/// - **Upsert**: `put` overwrites an existing entry for the same image.
/// - **No deletes**: superseded keys are retained; purging is an operator
///   concern outside the engine.
/// - **No retries**: transport failures surface as `BackendUnavailable`.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Store `material` under `image`.
    async fn put(&self, image: &KeyImage, material: &KeyMaterial) -> Result<()>;

    /// Fetch the material stored under `image`.
    ///
    /// Fails with `KeyNotFound` if there is no entry.
    async fn get(&self, image: &KeyImage) -> Result<KeyMaterial>;

    /// Short backend name, for logs.
    fn backend(&self) -> &'static str;
}
