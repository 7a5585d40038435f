//! Successor key derivation.
//!
//! Rotation ratchets a document key forward with PBKDF2-HMAC-SHA256. Every
//! derivation draws its own random salt and hands it back with the result;
//! nothing is shared between calls.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::KEY_LEN;
use crate::error::{CoreError, Result};

/// Lowest accepted PBKDF2 iteration count.
pub const MIN_KDF_ITERATIONS: u32 = 390_000;

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// A per-derivation random salt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salt(pub [u8; SALT_LEN]);

impl Salt {
    /// Generate a fresh random salt.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub const fn from_bytes(bytes: [u8; SALT_LEN]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; SALT_LEN] {
        &self.0
    }
}

/// PBKDF2 parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub iterations: u32,
}

impl KdfParams {
    /// Parameters with the given iteration count, refusing weak settings.
    pub fn new(iterations: u32) -> Result<Self> {
        let params = Self { iterations };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.iterations < MIN_KDF_ITERATIONS {
            return Err(CoreError::KeyDerivation(format!(
                "{} iterations is below the minimum of {}",
                self.iterations, MIN_KDF_ITERATIONS
            )));
        }
        Ok(())
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: MIN_KDF_ITERATIONS,
        }
    }
}

/// A derived key together with the salt that produced it.
#[derive(Clone, ZeroizeOnDrop)]
pub struct Derivation {
    key: [u8; KEY_LEN],
    #[zeroize(skip)]
    salt: Salt,
}

impl Derivation {
    pub fn key_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    pub fn salt(&self) -> &Salt {
        &self.salt
    }
}

impl std::fmt::Debug for Derivation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Derivation")
            .field("key", &"[REDACTED]")
            .field("salt", &hex::encode(self.salt.0))
            .finish()
    }
}

/// Derive a 256-bit successor of `prior` under `salt`.
pub fn derive(prior: &[u8; KEY_LEN], salt: Salt, params: &KdfParams) -> Result<Derivation> {
    params.validate()?;

    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(prior, salt.as_bytes(), params.iterations, &mut key);

    let derivation = Derivation { key, salt };
    key.zeroize();
    Ok(derivation)
}

/// Derive a successor of `prior` under a freshly generated salt.
pub fn derive_fresh(prior: &[u8; KEY_LEN], params: &KdfParams) -> Result<Derivation> {
    derive(prior, Salt::generate(), params)
}
