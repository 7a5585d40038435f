//! Instrumented collaborators.
//!
//! Wrappers around a real key store or store that count calls, fail on
//! demand, or lose a compare-and-swap on purpose.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use keyward_core::{
    AccountId, Capability, ContentId, Document, KeyImage, KeyMaterial, Permission, PermissionId, Setting,
    ThirdPartyId,
};
use keyward_keystore::{KeyStore, KeyStoreError, MemoryKeyStore};
use keyward_store::{Result as StoreResult, Store, SwapResult};

// ─────────────────────────────────────────────────────────────────────────────
// Key stores
// ─────────────────────────────────────────────────────────────────────────────

/// Counts `get` and `put` calls on an inner key store.
///
/// Writes can be made to fail with [`RecordingKeyStore::fail_puts`] while
/// reads keep working.
pub struct RecordingKeyStore {
    inner: Arc<dyn KeyStore>,
    gets: AtomicUsize,
    puts: AtomicUsize,
    puts_fail: AtomicBool,
}

impl RecordingKeyStore {
    pub fn new(inner: Arc<dyn KeyStore>) -> Self {
        Self {
            inner,
            gets: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
            puts_fail: AtomicBool::new(false),
        }
    }

    /// Recording wrapper over a fresh [`MemoryKeyStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKeyStore::new()))
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Total calls of either kind.
    pub fn calls(&self) -> usize {
        self.gets() + self.puts()
    }

    /// Reject every later `put` as if the backend went down.
    pub fn fail_puts(&self) {
        self.puts_fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyStore for RecordingKeyStore {
    async fn put(&self, image: &KeyImage, material: &KeyMaterial) -> keyward_keystore::Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.puts_fail.load(Ordering::SeqCst) {
            return Err(KeyStoreError::BackendUnavailable("write rejected".into()));
        }
        self.inner.put(image, material).await
    }

    async fn get(&self, image: &KeyImage) -> keyward_keystore::Result<KeyMaterial> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(image).await
    }

    fn backend(&self) -> &'static str {
        self.inner.backend()
    }
}

/// A key store whose backend is always unreachable.
#[derive(Debug, Default)]
pub struct UnreachableKeyStore;

#[async_trait]
impl KeyStore for UnreachableKeyStore {
    async fn put(&self, _image: &KeyImage, _material: &KeyMaterial) -> keyward_keystore::Result<()> {
        Err(KeyStoreError::BackendUnavailable("connection refused".into()))
    }

    async fn get(&self, _image: &KeyImage) -> keyward_keystore::Result<KeyMaterial> {
        Err(KeyStoreError::BackendUnavailable("connection refused".into()))
    }

    fn backend(&self) -> &'static str {
        "unreachable"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stores
// ─────────────────────────────────────────────────────────────────────────────

/// Counts writes (and swaps separately) on an inner store.
pub struct RecordingStore<S> {
    inner: S,
    writes: AtomicUsize,
    swaps: AtomicUsize,
}

impl<S: Store> RecordingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            writes: AtomicUsize::new(0),
            swaps: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Every mutating call, swaps included.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn swaps(&self) -> usize {
        self.swaps.load(Ordering::SeqCst)
    }

    fn wrote(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl<S: Store> Store for RecordingStore<S> {
    async fn insert_document(&self, document: &Document) -> StoreResult<()> {
        self.wrote();
        self.inner.insert_document(document).await
    }

    async fn get_document(&self, id: &ContentId) -> StoreResult<Option<Document>> {
        self.inner.get_document(id).await
    }

    async fn list_documents(&self, account: &AccountId) -> StoreResult<Vec<Document>> {
        self.inner.list_documents(account).await
    }

    async fn swap_sealed(
        &self,
        id: &ContentId,
        expected: &KeyImage,
        new_image: &KeyImage,
        ciphertext: Bytes,
    ) -> StoreResult<SwapResult> {
        self.wrote();
        self.swaps.fetch_add(1, Ordering::SeqCst);
        self.inner.swap_sealed(id, expected, new_image, ciphertext).await
    }

    async fn insert_permission(&self, permission: &Permission) -> StoreResult<()> {
        self.wrote();
        self.inner.insert_permission(permission).await
    }

    async fn get_permission(&self, id: &PermissionId) -> StoreResult<Option<Permission>> {
        self.inner.get_permission(id).await
    }

    async fn active_permissions(
        &self,
        document: &ContentId,
        third_party: &ThirdPartyId,
    ) -> StoreResult<Vec<Permission>> {
        self.inner.active_permissions(document, third_party).await
    }

    async fn list_permissions(&self, account: &AccountId) -> StoreResult<Vec<Permission>> {
        self.inner.list_permissions(account).await
    }

    async fn set_permission_active(&self, id: &PermissionId, active: bool) -> StoreResult<bool> {
        self.wrote();
        self.inner.set_permission_active(id, active).await
    }

    async fn deactivate_permissions(
        &self,
        account: &AccountId,
        third_party: &ThirdPartyId,
        capability: Option<Capability>,
    ) -> StoreResult<usize> {
        self.wrote();
        self.inner.deactivate_permissions(account, third_party, capability).await
    }

    async fn get_setting(&self, account: &AccountId, key: &str) -> StoreResult<Option<Setting>> {
        self.inner.get_setting(account, key).await
    }

    async fn upsert_setting(&self, setting: &Setting) -> StoreResult<()> {
        self.wrote();
        self.inner.upsert_setting(setting).await
    }
}

/// A store where another writer re-seals the document just before the
/// next `swap_sealed` lands, so that swap loses.
///
/// Arm it with [`ContendedStore::contend_next_swap`].
pub struct ContendedStore<S> {
    inner: S,
    armed: AtomicBool,
}

impl<S: Store> ContendedStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Make the next swap lose to a competing writer.
    pub fn contend_next_swap(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl<S: Store> Store for ContendedStore<S> {
    async fn insert_document(&self, document: &Document) -> StoreResult<()> {
        self.inner.insert_document(document).await
    }

    async fn get_document(&self, id: &ContentId) -> StoreResult<Option<Document>> {
        self.inner.get_document(id).await
    }

    async fn list_documents(&self, account: &AccountId) -> StoreResult<Vec<Document>> {
        self.inner.list_documents(account).await
    }

    async fn swap_sealed(
        &self,
        id: &ContentId,
        expected: &KeyImage,
        new_image: &KeyImage,
        ciphertext: Bytes,
    ) -> StoreResult<SwapResult> {
        if self.armed.swap(false, Ordering::SeqCst) {
            let rival = KeyImage::of_hex(&format!("rival-{}", expected));
            self.inner
                .swap_sealed(id, expected, &rival, Bytes::from_static(b"rival"))
                .await?;
        }
        self.inner.swap_sealed(id, expected, new_image, ciphertext).await
    }

    async fn insert_permission(&self, permission: &Permission) -> StoreResult<()> {
        self.inner.insert_permission(permission).await
    }

    async fn get_permission(&self, id: &PermissionId) -> StoreResult<Option<Permission>> {
        self.inner.get_permission(id).await
    }

    async fn active_permissions(
        &self,
        document: &ContentId,
        third_party: &ThirdPartyId,
    ) -> StoreResult<Vec<Permission>> {
        self.inner.active_permissions(document, third_party).await
    }

    async fn list_permissions(&self, account: &AccountId) -> StoreResult<Vec<Permission>> {
        self.inner.list_permissions(account).await
    }

    async fn set_permission_active(&self, id: &PermissionId, active: bool) -> StoreResult<bool> {
        self.inner.set_permission_active(id, active).await
    }

    async fn deactivate_permissions(
        &self,
        account: &AccountId,
        third_party: &ThirdPartyId,
        capability: Option<Capability>,
    ) -> StoreResult<usize> {
        self.inner.deactivate_permissions(account, third_party, capability).await
    }

    async fn get_setting(&self, account: &AccountId, key: &str) -> StoreResult<Option<Setting>> {
        self.inner.get_setting(account, key).await
    }

    async fn upsert_setting(&self, setting: &Setting) -> StoreResult<()> {
        self.inner.upsert_setting(setting).await
    }
}
