//! In-memory implementation of the Store trait.
//!
//! Same semantics as SQLite, no persistence. Used by tests and by the
//! testkit fixtures.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;

use keyward_core::{
    AccountId, Capability, ContentId, Document, KeyImage, Permission, PermissionId, Setting,
    ThirdPartyId,
};

use crate::error::{Result, StoreError};
use crate::traits::{Store, SwapResult};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    documents: HashMap<ContentId, Document>,
    permissions: HashMap<PermissionId, Permission>,
    settings: HashMap<(AccountId, String), Setting>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted_permissions<'a>(iter: impl Iterator<Item = &'a Permission>) -> Vec<Permission> {
    let mut out: Vec<Permission> = iter.cloned().collect();
    out.sort_by(|a, b| (a.granted_at, &a.id).cmp(&(b.granted_at, &b.id)));
    out
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_document(&self, document: &Document) -> Result<()> {
        let mut inner = self.write()?;
        if inner.documents.contains_key(&document.content_id) {
            return Err(StoreError::Duplicate {
                kind: "document",
                id: document.content_id.to_string(),
            });
        }
        inner
            .documents
            .insert(document.content_id.clone(), document.clone());
        Ok(())
    }

    async fn get_document(&self, id: &ContentId) -> Result<Option<Document>> {
        Ok(self.read()?.documents.get(id).cloned())
    }

    async fn list_documents(&self, account: &AccountId) -> Result<Vec<Document>> {
        let inner = self.read()?;
        let mut docs: Vec<Document> = inner
            .documents
            .values()
            .filter(|d| &d.account == account)
            .cloned()
            .collect();
        docs.sort_by(|a, b| (a.created_at, &a.content_id).cmp(&(b.created_at, &b.content_id)));
        Ok(docs)
    }

    async fn swap_sealed(
        &self,
        id: &ContentId,
        expected: &KeyImage,
        new_image: &KeyImage,
        ciphertext: Bytes,
    ) -> Result<SwapResult> {
        let mut inner = self.write()?;
        let Some(doc) = inner.documents.get_mut(id) else {
            return Ok(SwapResult::NotFound);
        };

        if &doc.key_image != expected {
            return Ok(SwapResult::Conflict {
                current: doc.key_image.clone(),
            });
        }

        doc.key_image = new_image.clone();
        doc.ciphertext = ciphertext;
        Ok(SwapResult::Swapped(doc.clone()))
    }

    async fn insert_permission(&self, permission: &Permission) -> Result<()> {
        let mut inner = self.write()?;
        if inner.permissions.contains_key(&permission.id) {
            return Err(StoreError::Duplicate {
                kind: "permission",
                id: permission.id.to_string(),
            });
        }
        inner
            .permissions
            .insert(permission.id.clone(), permission.clone());
        Ok(())
    }

    async fn get_permission(&self, id: &PermissionId) -> Result<Option<Permission>> {
        Ok(self.read()?.permissions.get(id).cloned())
    }

    async fn active_permissions(
        &self,
        document: &ContentId,
        third_party: &ThirdPartyId,
    ) -> Result<Vec<Permission>> {
        let inner = self.read()?;
        Ok(sorted_permissions(inner.permissions.values().filter(|p| {
            p.active && &p.document == document && &p.third_party == third_party
        })))
    }

    async fn list_permissions(&self, account: &AccountId) -> Result<Vec<Permission>> {
        let inner = self.read()?;
        Ok(sorted_permissions(
            inner.permissions.values().filter(|p| &p.account == account),
        ))
    }

    async fn set_permission_active(&self, id: &PermissionId, active: bool) -> Result<bool> {
        let mut inner = self.write()?;
        match inner.permissions.get_mut(id) {
            Some(permission) => {
                permission.active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn deactivate_permissions(
        &self,
        account: &AccountId,
        third_party: &ThirdPartyId,
        capability: Option<Capability>,
    ) -> Result<usize> {
        let mut inner = self.write()?;
        let mut changed = 0;
        for permission in inner.permissions.values_mut() {
            if permission.active
                && &permission.account == account
                && &permission.third_party == third_party
                && capability.map_or(true, |c| permission.capability == c)
            {
                permission.active = false;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn get_setting(&self, account: &AccountId, key: &str) -> Result<Option<Setting>> {
        let inner = self.read()?;
        Ok(inner
            .settings
            .get(&(account.clone(), key.to_string()))
            .cloned())
    }

    async fn upsert_setting(&self, setting: &Setting) -> Result<()> {
        let mut inner = self.write()?;
        inner.settings.insert(
            (setting.account.clone(), setting.key.clone()),
            setting.clone(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StoreExt;
    use keyward_core::KeyBundle;

    fn account() -> AccountId {
        AccountId::new("acct").unwrap()
    }

    fn party() -> ThirdPartyId {
        ThirdPartyId::new("party").unwrap()
    }

    fn make_document(created_at: i64) -> Document {
        let bundle = KeyBundle::fresh();
        Document {
            content_id: ContentId::generate(),
            name: "doc".into(),
            ciphertext: Bytes::from(bundle.encrypt(b"body").unwrap()),
            account: account(),
            key_image: bundle.key_image().clone(),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_document_insert_get() {
        let store = MemoryStore::new();
        let doc = make_document(1);

        store.insert_document(&doc).await.unwrap();
        assert_eq!(store.get_document(&doc.content_id).await.unwrap(), Some(doc.clone()));

        let err = store.insert_document(&doc).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { kind: "document", .. }));
    }

    #[tokio::test]
    async fn test_swap_sealed_compare_and_swap() {
        let store = MemoryStore::new();
        let doc = make_document(1);
        store.insert_document(&doc).await.unwrap();

        let next = KeyImage::of_hex("01");
        let swapped = store
            .swap_sealed(&doc.content_id, &doc.key_image, &next, Bytes::from_static(b"new"))
            .await
            .unwrap();
        match swapped {
            SwapResult::Swapped(updated) => {
                assert_eq!(updated.key_image, next);
                assert_eq!(updated.ciphertext.as_ref(), b"new");
                assert_eq!(updated.content_id, doc.content_id);
            }
            other => panic!("expected swap, got {:?}", other),
        }

        // Stale expectation loses.
        let stale = store
            .swap_sealed(&doc.content_id, &doc.key_image, &KeyImage::of_hex("02"), Bytes::new())
            .await
            .unwrap();
        assert_eq!(stale, SwapResult::Conflict { current: next });

        let missing = store
            .swap_sealed(&ContentId::generate(), &doc.key_image, &doc.key_image, Bytes::new())
            .await
            .unwrap();
        assert_eq!(missing, SwapResult::NotFound);
    }

    #[tokio::test]
    async fn test_permissions_lifecycle() {
        let store = MemoryStore::new();
        let doc = make_document(1);
        let grant = Permission::grant(
            Capability::Read,
            doc.content_id.clone(),
            account(),
            party(),
            None,
            10,
        );
        store.insert_permission(&grant).await.unwrap();

        let active = store.active_permissions(&doc.content_id, &party()).await.unwrap();
        assert_eq!(active, vec![grant.clone()]);

        assert!(store.set_permission_active(&grant.id, false).await.unwrap());
        assert!(store.active_permissions(&doc.content_id, &party()).await.unwrap().is_empty());
        assert!(!store
            .set_permission_active(&PermissionId::generate(), false)
            .await
            .unwrap());

        // Revoked rows are still listed.
        assert_eq!(store.list_permissions(&account()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_deactivate_by_third_party() {
        let store = MemoryStore::new();
        let other = ThirdPartyId::new("other").unwrap();
        for (i, tp) in [party(), party(), other.clone()].into_iter().enumerate() {
            let grant = Permission::grant(
                Capability::Read,
                ContentId::generate(),
                account(),
                tp,
                None,
                i as i64,
            );
            store.insert_permission(&grant).await.unwrap();
        }

        assert_eq!(store.deactivate_permissions(&account(), &party(), None).await.unwrap(), 2);
        assert_eq!(store.deactivate_permissions(&account(), &party(), None).await.unwrap(), 0);

        let stats = store.account_stats(&account()).await.unwrap();
        assert_eq!(stats.permission_count, 3);
        assert_eq!(stats.active_permission_count, 1);
    }

    #[tokio::test]
    async fn test_deactivate_by_capability() {
        let store = MemoryStore::new();
        let doc = ContentId::generate();
        let read = Permission::grant(Capability::Read, doc.clone(), account(), party(), None, 1);
        let write = Permission::grant(Capability::Write, doc.clone(), account(), party(), None, 2);
        store.insert_permission(&read).await.unwrap();
        store.insert_permission(&write).await.unwrap();

        let changed = store
            .deactivate_permissions(&account(), &party(), Some(Capability::Write))
            .await
            .unwrap();
        assert_eq!(changed, 1);
        assert_eq!(store.active_permissions(&doc, &party()).await.unwrap(), vec![read]);
    }

    #[tokio::test]
    async fn test_find_active_permission_skips_expired() {
        let store = MemoryStore::new();
        let doc = ContentId::generate();
        let expired = Permission::grant(Capability::Read, doc.clone(), account(), party(), Some(1), 0);
        let live = Permission::grant(Capability::Read, doc.clone(), account(), party(), None, 5);
        store.insert_permission(&expired).await.unwrap();
        store.insert_permission(&live).await.unwrap();

        let found = store.find_active_permission(&doc, &party(), 60_000).await.unwrap();
        assert_eq!(found.map(|p| p.id), Some(live.id));
    }

    #[tokio::test]
    async fn test_settings_upsert() {
        let store = MemoryStore::new();
        assert!(store.get_setting(&account(), "delegation").await.unwrap().is_none());

        store
            .upsert_setting(&Setting::new(account(), "delegation", true))
            .await
            .unwrap();
        store
            .upsert_setting(&Setting::new(account(), "delegation", false))
            .await
            .unwrap();

        let setting = store.get_setting(&account(), "delegation").await.unwrap().unwrap();
        assert!(!setting.value);
    }
}
