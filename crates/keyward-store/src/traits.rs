//! Store trait: the abstract interface to the persistence collaborator.
//!
//! Lookups are typed equality filters only. The engine never builds queries.

use async_trait::async_trait;
use bytes::Bytes;
use keyward_core::{
    AccountId, AccountStats, Capability, ContentId, Document, KeyImage, Permission, PermissionId, Setting,
    ThirdPartyId,
};

use crate::error::Result;

/// Outcome of a compare-and-swap on a document's sealed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapResult {
    /// Ciphertext and key image were replaced together.
    Swapped(Document),
    /// The document's key image was no longer the expected one.
    Conflict {
        /// The image currently stored.
        current: KeyImage,
    },
    /// No such document.
    NotFound,
}

/// The Store trait: async interface for documents, grants, and settings.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, blocking work runs under `spawn_blocking`.
///
/// # Design Notes
///
/// - **Atomic re-seal**: [`Store::swap_sealed`] replaces ciphertext and key
///   image in one step, and only if the stored image still matches.
/// - **Soft revocation**: permissions are deactivated, never deleted.
/// - **Upsert settings**: one row per `(account, key)`.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Document Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a new document. Fails with `Duplicate` if the content id exists.
    async fn insert_document(&self, document: &Document) -> Result<()>;

    /// Get a document by content id.
    async fn get_document(&self, id: &ContentId) -> Result<Option<Document>>;

    /// All documents owned by `account`, oldest first.
    async fn list_documents(&self, account: &AccountId) -> Result<Vec<Document>>;

    /// Replace ciphertext and key image if the stored image equals `expected`.
    async fn swap_sealed(
        &self,
        id: &ContentId,
        expected: &KeyImage,
        new_image: &KeyImage,
        ciphertext: Bytes,
    ) -> Result<SwapResult>;

    // ─────────────────────────────────────────────────────────────────────────
    // Permission Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a new permission. Fails with `Duplicate` if the id exists.
    async fn insert_permission(&self, permission: &Permission) -> Result<()>;

    /// Get a permission by id.
    async fn get_permission(&self, id: &PermissionId) -> Result<Option<Permission>>;

    /// Active grants for `third_party` on `document`, oldest first.
    ///
    /// Expiry is not applied here.
    async fn active_permissions(
        &self,
        document: &ContentId,
        third_party: &ThirdPartyId,
    ) -> Result<Vec<Permission>>;

    /// All grants (active or not) made by `account`, oldest first.
    async fn list_permissions(&self, account: &AccountId) -> Result<Vec<Permission>>;

    /// Set the active flag. Returns false if no such permission exists.
    async fn set_permission_active(&self, id: &PermissionId, active: bool) -> Result<bool>;

    /// Deactivate active grants from `account` to `third_party`, limited to
    /// `capability` when given.
    ///
    /// Returns the number of grants that changed.
    async fn deactivate_permissions(
        &self,
        account: &AccountId,
        third_party: &ThirdPartyId,
        capability: Option<Capability>,
    ) -> Result<usize>;

    // ─────────────────────────────────────────────────────────────────────────
    // Setting Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Get one setting.
    async fn get_setting(&self, account: &AccountId, key: &str) -> Result<Option<Setting>>;

    /// Insert or overwrite a setting.
    async fn upsert_setting(&self, setting: &Setting) -> Result<()>;
}

/// Extension trait for common store patterns.
#[async_trait]
pub trait StoreExt: Store {
    /// First active, unexpired grant for `third_party` on `document`.
    async fn find_active_permission(
        &self,
        document: &ContentId,
        third_party: &ThirdPartyId,
        now: i64,
    ) -> Result<Option<Permission>>;

    /// Document and permission counters for `account`.
    async fn account_stats(&self, account: &AccountId) -> Result<AccountStats>;
}

#[async_trait]
impl<S: Store + ?Sized> StoreExt for S {
    async fn find_active_permission(
        &self,
        document: &ContentId,
        third_party: &ThirdPartyId,
        now: i64,
    ) -> Result<Option<Permission>> {
        let grants = self.active_permissions(document, third_party).await?;
        Ok(grants.into_iter().find(|p| !p.is_expired(now)))
    }

    async fn account_stats(&self, account: &AccountId) -> Result<AccountStats> {
        let documents = self.list_documents(account).await?;
        let permissions = self.list_permissions(account).await?;

        Ok(AccountStats {
            document_count: documents.len(),
            permission_count: permissions.len(),
            active_permission_count: permissions.iter().filter(|p| p.active).count(),
        })
    }
}
