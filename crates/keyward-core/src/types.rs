//! Strong type definitions for Keyward.
//!
//! Every identifier is a newtype so an account id can never be passed where
//! a third-party id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

/// Length of a key image in hex characters (BLAKE3, 32 bytes).
pub const KEY_IMAGE_HEX_LEN: usize = 64;

/// Deterministic handle for a key: BLAKE3 of the key's hex encoding.
///
/// Used to look up key material in a key store without using the key
/// itself as an identifier. Lowercase hex, fixed length, stable across
/// restarts and backends.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyImage(String);

impl KeyImage {
    /// Compute the image of a hex-encoded key.
    pub fn of_hex(key_hex: &str) -> Self {
        Self(blake3::hash(key_hex.as_bytes()).to_hex().to_string())
    }

    /// Parse a stored image, checking its shape.
    pub fn parse(s: &str) -> Result<Self> {
        let well_formed = s.len() == KEY_IMAGE_HEX_LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !well_formed {
            return Err(CoreError::InvalidKeyImage(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// The hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for KeyImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyImage({})", self.0.get(..16).unwrap_or(&self.0))
    }
}

impl fmt::Display for KeyImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for KeyImage {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for KeyImage {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<KeyImage> for String {
    fn from(image: KeyImage) -> Self {
        image.0
    }
}

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident, $what:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Wrap a caller-supplied id. Must be non-empty.
            pub fn new(id: impl Into<String>) -> Result<Self> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(CoreError::EmptyIdentifier($what));
                }
                Ok(Self(id))
            }

            /// The raw id string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<&str> for $name {
            type Error = CoreError;

            fn try_from(s: &str) -> Result<Self> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = CoreError;

            fn try_from(s: String) -> Result<Self> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

opaque_id!(
    /// Stable content id of a document. Never changes across rotations.
    ContentId,
    "content id"
);
opaque_id!(
    /// Reference to the account that owns documents and settings.
    AccountId,
    "account id"
);
opaque_id!(
    /// Reference to an external relying party.
    ThirdPartyId,
    "third party id"
);
opaque_id!(
    /// Identifier of a permission grant.
    PermissionId,
    "permission id"
);

impl ContentId {
    /// Generate a fresh content id: BLAKE3 hex of a random v4 UUID.
    pub fn generate() -> Self {
        let seed = uuid::Uuid::new_v4().to_string();
        Self(blake3::hash(seed.as_bytes()).to_hex().to_string())
    }
}

impl PermissionId {
    /// Generate a fresh permission id (v4 UUID).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}
