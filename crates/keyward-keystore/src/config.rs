//! Key store backend selection.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::memory::MemoryKeyStore;
use crate::traits::KeyStore;
use crate::vault::VaultKeyStore;

/// Which backend holds document keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum KeyStoreConfig {
    /// Volatile; keys are lost on restart.
    #[default]
    InMemory,
    /// HashiCorp Vault KV v2.
    Vault(VaultConfig),
}

/// Connection settings for [`VaultKeyStore`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Base URL, e.g. `https://vault.internal:8200`.
    pub address: String,

    /// Access token. Falls back to `VAULT_TOKEN` when unset.
    #[serde(default)]
    pub token: Option<String>,

    /// KV v2 mount path.
    #[serde(default = "default_mount")]
    pub mount: String,

    /// Vault Enterprise namespace.
    #[serde(default)]
    pub namespace: Option<String>,

    /// Per-request timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_mount() -> String {
    "secret".to_string()
}

fn default_timeout_ms() -> u64 {
    5_000
}

impl VaultConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            token: None,
            mount: default_mount(),
            namespace: None,
            timeout_ms: default_timeout_ms(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

impl std::fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultConfig")
            .field("address", &self.address)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("mount", &self.mount)
            .field("namespace", &self.namespace)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// Build the configured backend.
pub fn open_keystore(config: &KeyStoreConfig) -> Result<Arc<dyn KeyStore>> {
    let store: Arc<dyn KeyStore> = match config {
        KeyStoreConfig::InMemory => Arc::new(MemoryKeyStore::new()),
        KeyStoreConfig::Vault(vault) => Arc::new(VaultKeyStore::new(vault)?),
    };
    tracing::info!(backend = store.backend(), "key store opened");
    Ok(store)
}
