//! Volatile in-memory key store.
//!
//! Contents are lost when the process exits. Meant for tests and local
//! development.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use keyward_core::{KeyImage, KeyMaterial};

use crate::error::{KeyStoreError, Result};
use crate::traits::KeyStore;

/// In-memory key store. Thread-safe via RwLock.
pub struct MemoryKeyStore {
    entries: RwLock<HashMap<KeyImage, KeyMaterial>>,
}

impl MemoryKeyStore {
    /// Create a new empty key store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> KeyStoreError {
    KeyStoreError::BackendUnavailable(format!("lock poisoned: {}", e))
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn put(&self, image: &KeyImage, material: &KeyMaterial) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(image.clone(), material.clone());
        Ok(())
    }

    async fn get(&self, image: &KeyImage) -> Result<KeyMaterial> {
        let entries = self.entries.read().map_err(poisoned)?;
        entries
            .get(image)
            .cloned()
            .ok_or_else(|| KeyStoreError::KeyNotFound(image.clone()))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_core::KeyBundle;

    #[tokio::test]
    async fn test_put_get() {
        let store = MemoryKeyStore::new();
        let bundle = KeyBundle::fresh();

        store.put(bundle.key_image(), bundle.material()).await.unwrap();
        let material = store.get(bundle.key_image()).await.unwrap();
        assert_eq!(&material, bundle.material());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_put_is_upsert() {
        let store = MemoryKeyStore::new();
        let bundle = KeyBundle::fresh();
        let other = KeyBundle::fresh();

        store.put(bundle.key_image(), bundle.material()).await.unwrap();
        store.put(bundle.key_image(), other.material()).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(&store.get(bundle.key_image()).await.unwrap(), other.material());
    }

    #[tokio::test]
    async fn test_missing_key() {
        let store = MemoryKeyStore::new();
        let image = KeyImage::of_hex("00");

        match store.get(&image).await {
            Err(KeyStoreError::KeyNotFound(missing)) => assert_eq!(missing, image),
            other => panic!("expected KeyNotFound, got {:?}", other),
        }
    }
}
