//! Engine configuration.
//!
//! Built explicitly and handed to [`Engine::new`](crate::Engine::new); there
//! is no global configuration. Loadable from JSON.

use std::path::Path;

use keyward_access::{CapabilityPolicy, DEFAULT_DELEGATION_KEY};
use keyward_core::KdfParams;
use keyward_keystore::KeyStoreConfig;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Configuration for the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Key store backend.
    pub keystore: KeyStoreConfig,
    /// How grant capabilities are matched on third-party reads.
    pub capability_policy: CapabilityPolicy,
    /// Setting key an owner turns on to allow third-party reads.
    pub delegation_key: String,
    /// Successor key derivation parameters.
    pub kdf: KdfParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            keystore: KeyStoreConfig::InMemory,
            capability_policy: CapabilityPolicy::AnyActiveGrant,
            delegation_key: DEFAULT_DELEGATION_KEY.to_string(),
            kdf: KdfParams::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.delegation_key.trim().is_empty() {
            return Err(EngineError::Config("delegation_key is empty".into()));
        }
        self.kdf
            .validate()
            .map_err(|e| EngineError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_core::MIN_KDF_ITERATIONS;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.keystore, KeyStoreConfig::InMemory);
        assert_eq!(config.capability_policy, CapabilityPolicy::AnyActiveGrant);
        assert_eq!(config.delegation_key, "delegation");
        assert_eq!(config.kdf.iterations, MIN_KDF_ITERATIONS);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_json() {
        let config = EngineConfig::from_json_str(
            r#"{
                "capability_policy": "require_matching",
                "keystore": {"provider": "vault", "address": "https://vault:8200", "mount": "kv"}
            }"#,
        )
        .unwrap();

        assert_eq!(config.capability_policy, CapabilityPolicy::RequireMatching);
        assert_eq!(config.delegation_key, "delegation");
        match config.keystore {
            KeyStoreConfig::Vault(vault) => assert_eq!(vault.mount, "kv"),
            other => panic!("expected vault, got {:?}", other),
        }
    }

    #[test]
    fn test_weak_kdf_rejected() {
        let err = EngineConfig::from_json_str(r#"{"kdf": {"iterations": 1000}}"#).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keyward.json");
        std::fs::write(&path, r#"{"delegation_key": "share"}"#).unwrap();

        let config = EngineConfig::from_path(&path).unwrap();
        assert_eq!(config.delegation_key, "share");

        assert!(EngineConfig::from_path(dir.path().join("missing.json")).is_err());
    }
}
