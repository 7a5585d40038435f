//! Key rotation protocol.
//!
//! Every authorized third-party read re-keys the document:
//!
//! ```text
//! gate → fetch key → decrypt → derive successor → store successor
//!      → re-encrypt → compare-and-swap (ciphertext, key image)
//! ```
//!
//! The successor key is written to the key store before the document's
//! pointer moves. If the process dies in between, the document still points
//! at its old key, which is still stored.

use bytes::Bytes;
use keyward_access::AccessRequest;
use keyward_core::{AccountId, ContentId, Document, KeyBundle, KeyImage, Salt, ThirdPartyId};
use keyward_store::{Store, SwapResult};

use crate::engine::Engine;
use crate::error::{EngineError, Result};

/// Result of an authorized third-party read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessOutcome {
    /// The decrypted document content.
    pub plaintext: Vec<u8>,
    /// The document as stored after rotation.
    pub document: Document,
    /// The key image the document was sealed under before this read.
    ///
    /// Its key store entry is retained.
    pub superseded: KeyImage,
}

impl<S: Store> Engine<S> {
    /// Authorize a third-party read, decrypt, and re-key the document.
    ///
    /// Refusals (`PermissionDenied`, `DelegationDisabled`) happen before any
    /// key material is touched and leave no trace. A concurrent re-seal of
    /// the same document by another process surfaces as
    /// `PersistenceConflict`; the call may be retried.
    pub async fn access_and_rotate(
        &self,
        third_party: &ThirdPartyId,
        document: &ContentId,
        account: &AccountId,
    ) -> Result<AccessOutcome> {
        let _guard = self.locks.lock(document).await;

        let request = AccessRequest::read(third_party.clone(), document.clone(), account.clone());
        let authorization = self.gate.authorize(self.store.as_ref(), &request).await?;
        let current = authorization.document;

        let bundle = self.open_bundle(&current).await?;
        let plaintext = bundle.decrypt(&current.ciphertext)?;

        let successor = self.derive_successor(&bundle).await?;
        let updated = self.reseal(&current, &successor, &plaintext).await?;

        tracing::info!(
            document = %document,
            third_party = %third_party,
            permission = %authorization.permission.id,
            from = ?current.key_image,
            to = ?updated.key_image,
            "document rotated on third-party read"
        );

        Ok(AccessOutcome {
            plaintext,
            document: updated,
            superseded: current.key_image,
        })
    }

    /// Owner edit: replace the content under a fresh, unrelated key.
    pub async fn update_document(
        &self,
        account: &AccountId,
        document: &ContentId,
        plaintext: &[u8],
    ) -> Result<Document> {
        let _guard = self.locks.lock(document).await;

        let current = self.owned_document(account, document).await?;
        let bundle = KeyBundle::fresh();
        let updated = self.reseal(&current, &bundle, plaintext).await?;

        tracing::debug!(document = %document, "document updated by owner");
        Ok(updated)
    }

    /// Ratchet `bundle` forward off the async executor.
    async fn derive_successor(&self, bundle: &KeyBundle) -> Result<KeyBundle> {
        let prior = bundle.clone();
        let params = self.config.kdf;

        let derivation = tokio::task::spawn_blocking(move || prior.derive(Salt::generate(), &params))
            .await
            .map_err(|e| EngineError::Crypto(format!("key derivation task failed: {}", e)))??;

        Ok(KeyBundle::from_derivation(&derivation))
    }

    /// Store `next`, seal `plaintext` under it, and swing the document's
    /// pointer if nobody else has.
    async fn reseal(&self, current: &Document, next: &KeyBundle, plaintext: &[u8]) -> Result<Document> {
        self.keystore.put(next.key_image(), next.material()).await?;

        let ciphertext = Bytes::from(next.encrypt(plaintext)?);
        let swapped = self
            .store
            .swap_sealed(&current.content_id, &current.key_image, next.key_image(), ciphertext)
            .await?;

        match swapped {
            SwapResult::Swapped(document) => Ok(document),
            SwapResult::Conflict { current: found } => {
                tracing::warn!(
                    document = %current.content_id,
                    expected = ?current.key_image,
                    found = ?found,
                    "lost compare-and-swap; successor key left unreferenced"
                );
                Err(EngineError::PersistenceConflict {
                    document: current.content_id.clone(),
                    expected: current.key_image.clone(),
                    current: found,
                })
            }
            SwapResult::NotFound => Err(EngineError::DocumentNotFound(current.content_id.clone())),
        }
    }
}
