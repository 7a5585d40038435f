//! The Engine: owner operations and the shared plumbing rotation uses.

use std::sync::Arc;

use bytes::Bytes;
use keyward_access::AccessGate;
use keyward_core::{
    now_millis, AccountId, AccountStats, Capability, ContentId, Document, KeyBundle, Permission,
    PermissionId, Setting, ThirdPartyId,
};
use keyward_keystore::{open_keystore, KeyStore, KeyStoreError};
use keyward_store::{Store, StoreExt};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::locks::DocumentLocks;

/// The confidentiality engine.
///
/// Owns key lifecycle for every document in `store`, gates third-party
/// reads, and re-keys a document on every authorized third-party read.
pub struct Engine<S: Store> {
    pub(crate) store: Arc<S>,
    pub(crate) keystore: Arc<dyn KeyStore>,
    pub(crate) gate: AccessGate,
    pub(crate) config: EngineConfig,
    pub(crate) locks: DocumentLocks,
}

impl<S: Store> Engine<S> {
    /// Create an engine over an explicit key store.
    pub fn new(store: S, keystore: Arc<dyn KeyStore>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            keystore = keystore.backend(),
            policy = ?config.capability_policy,
            "engine started"
        );
        Ok(Self {
            store: Arc::new(store),
            keystore,
            gate: AccessGate::new(config.capability_policy, config.delegation_key.clone()),
            config,
            locks: DocumentLocks::new(),
        })
    }

    /// Create an engine with the key store named in `config`.
    pub fn from_config(store: S, config: EngineConfig) -> Result<Self> {
        let keystore = open_keystore(&config.keystore)?;
        Self::new(store, keystore, config)
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn keystore(&self) -> &Arc<dyn KeyStore> {
        &self.keystore
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Document Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Seal `plaintext` under a fresh key and store it as a new document.
    pub async fn create_document(
        &self,
        account: &AccountId,
        name: &str,
        plaintext: &[u8],
    ) -> Result<Document> {
        let bundle = KeyBundle::fresh();
        self.keystore
            .put(bundle.key_image(), bundle.material())
            .await?;

        let document = Document {
            content_id: ContentId::generate(),
            name: name.to_string(),
            ciphertext: Bytes::from(bundle.encrypt(plaintext)?),
            account: account.clone(),
            key_image: bundle.key_image().clone(),
            created_at: now_millis(),
        };
        self.store.insert_document(&document).await?;

        tracing::debug!(document = %document.content_id, account = %account, "document created");
        Ok(document)
    }

    /// Owner read. Decrypts without rotating.
    pub async fn read_document(&self, account: &AccountId, document: &ContentId) -> Result<Vec<u8>> {
        let doc = self.owned_document(account, document).await?;
        let bundle = self.open_bundle(&doc).await?;
        Ok(bundle.decrypt(&doc.ciphertext)?)
    }

    /// All documents owned by `account`.
    pub async fn list_documents(&self, account: &AccountId) -> Result<Vec<Document>> {
        Ok(self.store.list_documents(account).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Permission Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Grant `third_party` access to an existing document.
    ///
    /// A `ttl` in seconds bounds the grant; `None` or a negative value never
    /// expires.
    pub async fn grant_permission(
        &self,
        account: &AccountId,
        third_party: &ThirdPartyId,
        document: &ContentId,
        capability: Capability,
        ttl: Option<i64>,
    ) -> Result<Permission> {
        self.owned_document(account, document).await?;

        let permission = Permission::grant(
            capability,
            document.clone(),
            account.clone(),
            third_party.clone(),
            ttl,
            now_millis(),
        );
        self.store.insert_permission(&permission).await?;

        tracing::debug!(
            permission = %permission.id,
            document = %document,
            third_party = %third_party,
            capability = %capability,
            "permission granted"
        );
        Ok(permission)
    }

    /// Create a document and grant `third_party` access to it.
    pub async fn grant_on_new_document(
        &self,
        account: &AccountId,
        third_party: &ThirdPartyId,
        name: &str,
        plaintext: &[u8],
        capability: Capability,
        ttl: Option<i64>,
    ) -> Result<(Document, Permission)> {
        let document = self.create_document(account, name, plaintext).await?;
        let permission = self
            .grant_permission(account, third_party, &document.content_id, capability, ttl)
            .await?;
        Ok((document, permission))
    }

    /// Deactivate one grant. The row is kept.
    pub async fn revoke_permission(
        &self,
        account: &AccountId,
        permission: &PermissionId,
    ) -> Result<Permission> {
        let mut grant = self
            .store
            .get_permission(permission)
            .await?
            .ok_or_else(|| EngineError::PermissionNotFound(permission.clone()))?;

        if &grant.account != account {
            return Err(EngineError::NotOwner {
                account: account.clone(),
                document: grant.document,
            });
        }

        if !self.store.set_permission_active(permission, false).await? {
            return Err(EngineError::PermissionNotFound(permission.clone()));
        }
        grant.active = false;

        tracing::debug!(permission = %permission, "permission revoked");
        Ok(grant)
    }

    /// Deactivate the grants `account` has made to `third_party`.
    ///
    /// With a `capability`, only grants of that capability are closed;
    /// `None` closes all of them.
    pub async fn revoke_third_party(
        &self,
        account: &AccountId,
        third_party: &ThirdPartyId,
        capability: Option<Capability>,
    ) -> Result<usize> {
        let revoked = self
            .store
            .deactivate_permissions(account, third_party, capability)
            .await?;
        tracing::debug!(
            account = %account,
            third_party = %third_party,
            capability = ?capability,
            revoked,
            "third party revoked"
        );
        Ok(revoked)
    }

    /// Every grant made by `account`, revoked ones included.
    pub async fn list_permissions(&self, account: &AccountId) -> Result<Vec<Permission>> {
        Ok(self.store.list_permissions(account).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Setting Operations
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn set_setting(&self, account: &AccountId, key: &str, value: bool) -> Result<Setting> {
        if key.trim().is_empty() {
            return Err(EngineError::InvalidInput("empty setting key".into()));
        }
        let setting = Setting::new(account.clone(), key, value);
        self.store.upsert_setting(&setting).await?;
        Ok(setting)
    }

    /// Flip a setting. An absent setting counts as off.
    pub async fn toggle_setting(&self, account: &AccountId, key: &str) -> Result<Setting> {
        let current = self.get_setting(account, key).await?;
        self.set_setting(account, key, !current).await
    }

    /// Current value of a setting; absent is `false`.
    pub async fn get_setting(&self, account: &AccountId, key: &str) -> Result<bool> {
        Ok(self
            .store
            .get_setting(account, key)
            .await?
            .map(|s| s.value)
            .unwrap_or(false))
    }

    /// Turn third-party access for `account` on or off.
    pub async fn set_delegation(&self, account: &AccountId, enabled: bool) -> Result<Setting> {
        let key = self.config.delegation_key.clone();
        self.set_setting(account, &key, enabled).await
    }

    /// Document and grant counters for `account`.
    pub async fn account_stats(&self, account: &AccountId) -> Result<AccountStats> {
        Ok(self.store.account_stats(account).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) async fn load_document(&self, document: &ContentId) -> Result<Document> {
        self.store
            .get_document(document)
            .await?
            .ok_or_else(|| EngineError::DocumentNotFound(document.clone()))
    }

    pub(crate) async fn owned_document(
        &self,
        account: &AccountId,
        document: &ContentId,
    ) -> Result<Document> {
        let doc = self.load_document(document).await?;
        if &doc.account != account {
            return Err(EngineError::NotOwner {
                account: account.clone(),
                document: document.clone(),
            });
        }
        Ok(doc)
    }

    /// Fetch the key that opens `doc` and check it matches the pointer.
    pub(crate) async fn open_bundle(&self, doc: &Document) -> Result<KeyBundle> {
        let material = match self.keystore.get(&doc.key_image).await {
            Ok(material) => material,
            Err(KeyStoreError::KeyNotFound(image)) => {
                tracing::error!(
                    document = %doc.content_id,
                    key_image = %image,
                    keystore = self.keystore.backend(),
                    "document key missing from key store"
                );
                return Err(EngineError::KeyNotFound(image));
            }
            Err(e) => return Err(e.into()),
        };

        let bundle = KeyBundle::from_hex(&material)?;
        if bundle.key_image() != &doc.key_image {
            tracing::error!(document = %doc.content_id, "key store entry does not match key image");
            return Err(EngineError::IntegrityFailure(format!(
                "key store entry for {} hashes to a different image",
                doc.key_image
            )));
        }
        Ok(bundle)
    }
}
