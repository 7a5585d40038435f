//! Records exchanged with the persistence collaborator.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::types::{AccountId, ContentId, KeyImage, PermissionId, ThirdPartyId};

/// An encrypted document.
///
/// `ciphertext` is always the sealed envelope produced by the bundle whose
/// image is `key_image`. Both are replaced together on every rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identity.
    pub content_id: ContentId,
    /// Human-readable name.
    pub name: String,
    /// Sealed envelope bytes.
    pub ciphertext: Bytes,
    /// Owning account.
    pub account: AccountId,
    /// Pointer to the key that opens `ciphertext`.
    pub key_image: KeyImage,
    /// Creation time (Unix ms).
    pub created_at: i64,
}

/// What a grant allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Read,
    Write,
    Delete,
    Other,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Read => "read",
            Capability::Write => "write",
            Capability::Delete => "delete",
            Capability::Other => "other",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Capability::Read),
            "write" => Ok(Capability::Write),
            "delete" => Ok(Capability::Delete),
            "other" => Ok(Capability::Other),
            other => Err(CoreError::UnknownCapability(other.to_string())),
        }
    }
}

/// A grant from an account to a third party on one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub capability: Capability,
    pub document: ContentId,
    pub account: AccountId,
    pub third_party: ThirdPartyId,
    /// Revocation flips this to false; rows are never deleted.
    pub active: bool,
    /// Lifetime in seconds from `granted_at`. `None` never expires.
    pub ttl: Option<i64>,
    /// Grant time (Unix ms).
    pub granted_at: i64,
}

impl Permission {
    /// Build a new active grant. A negative `ttl` means no expiry.
    pub fn grant(
        capability: Capability,
        document: ContentId,
        account: AccountId,
        third_party: ThirdPartyId,
        ttl: Option<i64>,
        now: i64,
    ) -> Self {
        Self {
            id: PermissionId::generate(),
            capability,
            document,
            account,
            third_party,
            active: true,
            ttl: ttl.filter(|secs| *secs >= 0),
            granted_at: now,
        }
    }

    /// When the grant stops being valid (Unix ms), if ever.
    pub fn expires_at(&self) -> Option<i64> {
        self.ttl
            .map(|secs| self.granted_at.saturating_add(secs.saturating_mul(1000)))
    }

    /// Whether the grant has lapsed at `now` (Unix ms).
    pub fn is_expired(&self, now: i64) -> bool {
        match self.expires_at() {
            Some(expires) => now > expires,
            None => false,
        }
    }
}

/// An account-level boolean switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub account: AccountId,
    pub key: String,
    pub value: bool,
}

impl Setting {
    pub fn new(account: AccountId, key: impl Into<String>, value: bool) -> Self {
        Self {
            account,
            key: key.into(),
            value,
        }
    }
}

/// Counters for an account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStats {
    pub document_count: usize,
    pub permission_count: usize,
    pub active_permission_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permission(ttl: Option<i64>) -> Permission {
        Permission::grant(
            Capability::Read,
            ContentId::new("doc").unwrap(),
            AccountId::new("acct").unwrap(),
            ThirdPartyId::new("party").unwrap(),
            ttl,
            10_000,
        )
    }

    #[test]
    fn test_permission_without_ttl_never_expires() {
        let perm = permission(None);
        assert!(perm.active);
        assert!(!perm.is_expired(i64::MAX));
    }

    #[test]
    fn test_permission_ttl() {
        let perm = permission(Some(5));
        assert_eq!(perm.expires_at(), Some(15_000));
        assert!(!perm.is_expired(15_000));
        assert!(perm.is_expired(15_001));
    }

    #[test]
    fn test_negative_ttl_means_forever() {
        let perm = permission(Some(-1));
        assert_eq!(perm.ttl, None);
        assert_eq!(perm.expires_at(), None);
    }

    #[test]
    fn test_capability_parse() {
        for cap in [
            Capability::Read,
            Capability::Write,
            Capability::Delete,
            Capability::Other,
        ] {
            assert_eq!(cap.as_str().parse::<Capability>().unwrap(), cap);
        }
        assert!("admin".parse::<Capability>().is_err());
    }

    #[test]
    fn test_capability_serde_name() {
        let json = serde_json::to_string(&Capability::Delete).unwrap();
        assert_eq!(json, "\"delete\"");
    }
}
