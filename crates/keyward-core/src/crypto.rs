//! Key bundles and authenticated encryption.
//!
//! A [`KeyBundle`] is a 256-bit ChaCha20-Poly1305 key together with its
//! [`KeyImage`] and hex encoding. Bundles live only for the duration of one
//! operation and wipe their key bytes on drop.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::envelope::{SealFormat, SealedEnvelope};
use crate::error::{CoreError, Result};
use crate::kdf::{self, Derivation, KdfParams, Salt};
use crate::types::KeyImage;

/// Key length in bytes.
pub const KEY_LEN: usize = 32;

/// Hex-encoded key material as held by a key store.
///
/// Wiped on drop and never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial(String);

impl KeyMaterial {
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// The hex string. Avoid logging or storing it anywhere but a key store.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Image of this material.
    pub fn image(&self) -> KeyImage {
        KeyImage::of_hex(&self.0)
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyMaterial([REDACTED {} chars])", self.0.len())
    }
}

/// A 96-bit nonce for ChaCha20-Poly1305.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionNonce(pub [u8; 12]);

impl EncryptionNonce {
    /// Generate a new random nonce.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

/// A symmetric key plus its image and hex encoding.
#[derive(Clone, ZeroizeOnDrop)]
pub struct KeyBundle {
    key: [u8; KEY_LEN],
    hex: KeyMaterial,
    #[zeroize(skip)]
    image: KeyImage,
}

impl KeyBundle {
    /// Generate a bundle around a new random key.
    pub fn fresh() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        let bundle = Self::from_bytes(&bytes);
        bytes.zeroize();
        bundle
    }

    /// Wrap existing key bytes.
    pub fn from_bytes(bytes: &[u8; KEY_LEN]) -> Self {
        let hex = KeyMaterial::new(hex::encode(bytes));
        let image = hex.image();
        Self {
            key: *bytes,
            hex,
            image,
        }
    }

    /// Rebuild a bundle from key store material.
    pub fn from_hex(material: &KeyMaterial) -> Result<Self> {
        let mut decoded = hex::decode(material.expose())
            .map_err(|e| CoreError::InvalidKeyMaterial(e.to_string()))?;
        if decoded.len() != KEY_LEN {
            let len = decoded.len();
            decoded.zeroize();
            return Err(CoreError::InvalidKeyMaterial(format!(
                "expected {} bytes, got {}",
                KEY_LEN, len
            )));
        }

        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();

        let bundle = Self::from_bytes(&bytes);
        bytes.zeroize();
        Ok(bundle)
    }

    /// Build the successor bundle from a derivation.
    pub fn from_derivation(derivation: &Derivation) -> Self {
        Self::from_bytes(derivation.key_bytes())
    }

    pub fn key_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    pub fn key_image(&self) -> &KeyImage {
        &self.image
    }

    /// Hex encoding, as written to a key store.
    pub fn material(&self) -> &KeyMaterial {
        &self.hex
    }

    /// Derive this key's successor under `salt`.
    pub fn derive(&self, salt: Salt, params: &KdfParams) -> Result<Derivation> {
        kdf::derive(&self.key, salt, params)
    }

    /// Seal `plaintext` into an envelope token with a fresh nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.key)
            .map_err(|e| CoreError::EncryptionError(e.to_string()))?;

        let nonce = EncryptionNonce::generate();
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(nonce.as_bytes()), plaintext)
            .map_err(|e| CoreError::EncryptionError(e.to_string()))?;

        Ok(SealedEnvelope {
            format: SealFormat::ChaCha20Poly1305,
            nonce,
            ciphertext,
        }
        .to_bytes())
    }

    /// Open an envelope token.
    ///
    /// Fails with [`CoreError::IntegrityFailure`] when the tag does not
    /// verify. An empty plaintext is only ever returned for an empty
    /// sealed document.
    pub fn decrypt(&self, token: &[u8]) -> Result<Vec<u8>> {
        let envelope = SealedEnvelope::from_bytes(token)?;

        match envelope.format {
            SealFormat::ChaCha20Poly1305 => {
                let cipher = ChaCha20Poly1305::new_from_slice(&self.key)
                    .map_err(|e| CoreError::IntegrityFailure(e.to_string()))?;
                cipher
                    .decrypt(
                        Nonce::from_slice(envelope.nonce.as_bytes()),
                        envelope.ciphertext.as_slice(),
                    )
                    .map_err(|_| {
                        CoreError::IntegrityFailure("authentication tag mismatch".to_string())
                    })
            }
        }
    }
}

impl std::fmt::Debug for KeyBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyBundle")
            .field("image", &self.image)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let bundle = KeyBundle::fresh();
        let plaintext = b"<doc>hello</doc>";

        let token = bundle.encrypt(plaintext).unwrap();
        assert_ne!(token.as_slice(), plaintext.as_slice());
        assert_eq!(bundle.decrypt(&token).unwrap(), plaintext);
    }

    #[test]
    fn test_nonce_never_repeats() {
        let bundle = KeyBundle::fresh();
        let a = SealedEnvelope::from_bytes(&bundle.encrypt(b"same").unwrap()).unwrap();
        let b = SealedEnvelope::from_bytes(&bundle.encrypt(b"same").unwrap()).unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_decrypt_wrong_key_fails() {
        let k1 = KeyBundle::fresh();
        let k2 = KeyBundle::fresh();
        let token = k1.encrypt(b"secret").unwrap();

        let err = k2.decrypt(&token).unwrap_err();
        assert!(matches!(err, CoreError::IntegrityFailure(_)));
    }

    #[test]
    fn test_tampered_token_fails() {
        let bundle = KeyBundle::fresh();
        let mut envelope =
            SealedEnvelope::from_bytes(&bundle.encrypt(b"secret").unwrap()).unwrap();
        envelope.ciphertext[0] ^= 0x01;

        let err = bundle.decrypt(&envelope.to_bytes()).unwrap_err();
        assert!(matches!(err, CoreError::IntegrityFailure(_)));
    }

    #[test]
    fn test_hex_roundtrip_keeps_image() {
        let bundle = KeyBundle::fresh();
        let restored = KeyBundle::from_hex(bundle.material()).unwrap();

        assert_eq!(restored.key_bytes(), bundle.key_bytes());
        assert_eq!(restored.key_image(), bundle.key_image());
        assert_eq!(bundle.key_image(), &KeyImage::of_hex(bundle.material().expose()));
    }

    #[test]
    fn test_from_hex_rejects_bad_material() {
        assert!(matches!(
            KeyBundle::from_hex(&KeyMaterial::new("zz")),
            Err(CoreError::InvalidKeyMaterial(_))
        ));
        assert!(matches!(
            KeyBundle::from_hex(&KeyMaterial::new("abcd")),
            Err(CoreError::InvalidKeyMaterial(_))
        ));
    }

    #[test]
    fn test_debug_redacts() {
        let bundle = KeyBundle::fresh();
        let debug = format!("{:?}", bundle);
        assert!(!debug.contains(bundle.material().expose()));
        assert!(format!("{:?}", bundle.material()).contains("REDACTED"));
    }

    #[test]
    fn test_derived_bundle_opens_its_own_ciphertext() {
        let bundle = KeyBundle::fresh();
        let successor =
            KeyBundle::from_derivation(&bundle.derive(Salt::generate(), &KdfParams::default()).unwrap());

        assert_ne!(successor.key_image(), bundle.key_image());
        let token = successor.encrypt(b"carried over").unwrap();
        assert_eq!(successor.decrypt(&token).unwrap(), b"carried over");
        assert!(bundle.decrypt(&token).is_err());
    }
}
