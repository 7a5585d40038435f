//! The two-factor access decision.
//!
//! A third party may read a document only when both hold:
//!
//! 1. an active, unexpired grant from the owning account on that document;
//! 2. the owning account's delegation setting is on.
//!
//! The gate only reads from the store. It never touches key material and
//! never writes, so a refusal has no side effects.

use keyward_core::{
    now_millis, AccountId, Capability, ContentId, Document, KeyImage, Permission, ThirdPartyId,
};
use keyward_store::Store;

use crate::error::{AccessError, Result};
use crate::policy::CapabilityPolicy;

/// Default setting key for the delegation opt-in.
pub const DEFAULT_DELEGATION_KEY: &str = "delegation";

/// A third-party read request, validated at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest {
    pub third_party: ThirdPartyId,
    pub document: ContentId,
    pub account: AccountId,
    pub capability: Capability,
}

impl AccessRequest {
    /// Build a request from raw API strings. Empty fields are `InvalidInput`.
    pub fn new(
        third_party: &str,
        document: &str,
        account: &str,
        capability: Capability,
    ) -> Result<Self> {
        Ok(Self {
            third_party: ThirdPartyId::new(third_party)?,
            document: ContentId::new(document)?,
            account: AccountId::new(account)?,
            capability,
        })
    }

    /// A read request from already-typed ids.
    pub fn read(third_party: ThirdPartyId, document: ContentId, account: AccountId) -> Self {
        Self {
            third_party,
            document,
            account,
            capability: Capability::Read,
        }
    }
}

/// A granted request: the document and the grant that admitted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    pub document: Document,
    pub permission: Permission,
}

impl Authorization {
    /// The key image the document is sealed under right now.
    pub fn key_image(&self) -> &KeyImage {
        &self.document.key_image
    }
}

/// Evaluates access requests against the store.
#[derive(Debug, Clone)]
pub struct AccessGate {
    policy: CapabilityPolicy,
    delegation_key: String,
}

impl Default for AccessGate {
    fn default() -> Self {
        Self::new(CapabilityPolicy::default(), DEFAULT_DELEGATION_KEY)
    }
}

impl AccessGate {
    pub fn new(policy: CapabilityPolicy, delegation_key: impl Into<String>) -> Self {
        Self {
            policy,
            delegation_key: delegation_key.into(),
        }
    }

    pub fn policy(&self) -> CapabilityPolicy {
        self.policy
    }

    /// The setting key that must be `true` on the owning account.
    pub fn delegation_key(&self) -> &str {
        &self.delegation_key
    }

    /// Decide `request` at the current time.
    pub async fn authorize<S: Store + ?Sized>(
        &self,
        store: &S,
        request: &AccessRequest,
    ) -> Result<Authorization> {
        self.authorize_at(store, request, now_millis()).await
    }

    /// Decide `request` as of `now` (Unix ms).
    pub async fn authorize_at<S: Store + ?Sized>(
        &self,
        store: &S,
        request: &AccessRequest,
        now: i64,
    ) -> Result<Authorization> {
        let grants = store
            .active_permissions(&request.document, &request.third_party)
            .await?;

        let permission = self.select_grant(grants, request, now)?;

        let delegated = store
            .get_setting(&request.account, &self.delegation_key)
            .await?
            .map(|s| s.value)
            .unwrap_or(false);
        if !delegated {
            tracing::debug!(account = %request.account, "delegation disabled");
            return Err(AccessError::DelegationDisabled(request.account.to_string()));
        }

        let document = store
            .get_document(&request.document)
            .await?
            .ok_or_else(|| AccessError::DocumentNotFound(request.document.clone()))?;

        if document.account != request.account {
            return Err(AccessError::PermissionDenied(format!(
                "document {} is not owned by account {}",
                request.document, request.account
            )));
        }

        Ok(Authorization {
            document,
            permission,
        })
    }

    fn select_grant(
        &self,
        grants: Vec<Permission>,
        request: &AccessRequest,
        now: i64,
    ) -> Result<Permission> {
        if grants.is_empty() {
            return Err(AccessError::PermissionDenied(format!(
                "no active grant for {} on {}",
                request.third_party, request.document
            )));
        }

        let matching = grants.into_iter().filter(|p| {
            p.account == request.account && self.policy.admits(p.capability, request.capability)
        });

        let mut saw_expired = false;
        for grant in matching {
            if grant.is_expired(now) {
                saw_expired = true;
                continue;
            }
            return Ok(grant);
        }

        let reason = if saw_expired {
            "grant expired"
        } else {
            "no grant covers this request"
        };
        Err(AccessError::PermissionDenied(format!(
            "{} for {} on {}",
            reason, request.third_party, request.document
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use keyward_core::{KeyBundle, Setting};
    use keyward_store::MemoryStore;

    struct Fixture {
        store: MemoryStore,
        account: AccountId,
        party: ThirdPartyId,
        document: Document,
    }

    async fn fixture(grant: Option<Capability>, delegation: Option<bool>) -> Fixture {
        let store = MemoryStore::new();
        let account = AccountId::new("owner").unwrap();
        let party = ThirdPartyId::new("relying-party").unwrap();
        let bundle = KeyBundle::fresh();
        let document = Document {
            content_id: ContentId::generate(),
            name: "statement".into(),
            ciphertext: Bytes::from(bundle.encrypt(b"body").unwrap()),
            account: account.clone(),
            key_image: bundle.key_image().clone(),
            created_at: 0,
        };
        store.insert_document(&document).await.unwrap();

        if let Some(capability) = grant {
            let permission = Permission::grant(
                capability,
                document.content_id.clone(),
                account.clone(),
                party.clone(),
                None,
                0,
            );
            store.insert_permission(&permission).await.unwrap();
        }
        if let Some(value) = delegation {
            store
                .upsert_setting(&Setting::new(account.clone(), DEFAULT_DELEGATION_KEY, value))
                .await
                .unwrap();
        }

        Fixture {
            store,
            account,
            party,
            document,
        }
    }

    fn request(f: &Fixture) -> AccessRequest {
        AccessRequest::read(f.party.clone(), f.document.content_id.clone(), f.account.clone())
    }

    #[tokio::test]
    async fn test_grant_and_delegation_admits() {
        let f = fixture(Some(Capability::Read), Some(true)).await;
        let auth = AccessGate::default().authorize(&f.store, &request(&f)).await.unwrap();

        assert_eq!(auth.document, f.document);
        assert_eq!(auth.key_image(), &f.document.key_image);
        assert_eq!(auth.permission.third_party, f.party);
    }

    #[tokio::test]
    async fn test_no_grant_denied() {
        let f = fixture(None, Some(true)).await;
        let err = AccessGate::default().authorize(&f.store, &request(&f)).await.unwrap_err();
        assert!(matches!(err, AccessError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_grant_without_delegation_refused() {
        let f = fixture(Some(Capability::Read), None).await;
        let err = AccessGate::default().authorize(&f.store, &request(&f)).await.unwrap_err();
        assert!(matches!(err, AccessError::DelegationDisabled(_)));

        let f = fixture(Some(Capability::Read), Some(false)).await;
        let err = AccessGate::default().authorize(&f.store, &request(&f)).await.unwrap_err();
        assert!(matches!(err, AccessError::DelegationDisabled(_)));
    }

    #[tokio::test]
    async fn test_grant_checked_before_delegation() {
        let f = fixture(None, None).await;
        let err = AccessGate::default().authorize(&f.store, &request(&f)).await.unwrap_err();
        assert!(matches!(err, AccessError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_revoked_grant_denied() {
        let f = fixture(Some(Capability::Read), Some(true)).await;
        f.store
            .deactivate_permissions(&f.account, &f.party, None)
            .await
            .unwrap();

        let err = AccessGate::default().authorize(&f.store, &request(&f)).await.unwrap_err();
        assert!(matches!(err, AccessError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_expired_grant_denied() {
        let f = fixture(None, Some(true)).await;
        let grant = Permission::grant(
            Capability::Read,
            f.document.content_id.clone(),
            f.account.clone(),
            f.party.clone(),
            Some(60),
            1_000,
        );
        f.store.insert_permission(&grant).await.unwrap();
        let gate = AccessGate::default();

        assert!(gate.authorize_at(&f.store, &request(&f), 61_000).await.is_ok());
        match gate.authorize_at(&f.store, &request(&f), 61_001).await {
            Err(AccessError::PermissionDenied(reason)) => assert!(reason.contains("expired")),
            other => panic!("expected expiry denial, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_capability_policy() {
        let f = fixture(Some(Capability::Write), Some(true)).await;

        let lenient = AccessGate::default();
        assert!(lenient.authorize(&f.store, &request(&f)).await.is_ok());

        let strict = AccessGate::new(CapabilityPolicy::RequireMatching, DEFAULT_DELEGATION_KEY);
        let err = strict.authorize(&f.store, &request(&f)).await.unwrap_err();
        assert!(matches!(err, AccessError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_grant_from_other_account_ignored() {
        let f = fixture(None, Some(true)).await;
        let foreign = Permission::grant(
            Capability::Read,
            f.document.content_id.clone(),
            AccountId::new("someone-else").unwrap(),
            f.party.clone(),
            None,
            0,
        );
        f.store.insert_permission(&foreign).await.unwrap();

        let err = AccessGate::default().authorize(&f.store, &request(&f)).await.unwrap_err();
        assert!(matches!(err, AccessError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_custom_delegation_key() {
        let f = fixture(Some(Capability::Read), Some(true)).await;
        let gate = AccessGate::new(CapabilityPolicy::AnyActiveGrant, "share_with_partners");

        let err = gate.authorize(&f.store, &request(&f)).await.unwrap_err();
        assert!(matches!(err, AccessError::DelegationDisabled(_)));
    }

    #[test]
    fn test_empty_input_rejected() {
        let err = AccessRequest::new("", "doc", "acct", Capability::Read).unwrap_err();
        assert!(matches!(err, AccessError::InvalidInput(_)));
    }
}
