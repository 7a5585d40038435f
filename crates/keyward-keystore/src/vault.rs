//! HashiCorp Vault key store (KV secrets engine, version 2).
//!
//! Each key image is a secret path under the configured mount:
//!
//! - read:  `GET  {address}/v1/{mount}/data/{image}` → `data.data.key`
//! - write: `POST {address}/v1/{mount}/data/{image}` with `{"data":{"key":hex}}`
//!
//! A 404 is the only response mapped to `KeyNotFound`. Everything else that
//! is not a success (transport errors, timeouts, 401/403, 5xx, unparseable
//! bodies) is `BackendUnavailable`. Requests are never retried here.

use std::time::Duration;

use async_trait::async_trait;
use keyward_core::{KeyImage, KeyMaterial};
use serde::{Deserialize, Serialize};

use crate::config::VaultConfig;
use crate::error::{KeyStoreError, Result};
use crate::traits::KeyStore;

/// Key store backed by a Vault KV v2 mount.
pub struct VaultKeyStore {
    address: String,
    mount: String,
    token: String,
    namespace: Option<String>,
    client: reqwest::Client,
}

impl VaultKeyStore {
    /// Build a client from configuration.
    ///
    /// The token comes from the config, or from `VAULT_TOKEN` if the config
    /// leaves it unset. It is read once here.
    pub fn new(config: &VaultConfig) -> Result<Self> {
        let token = match &config.token {
            Some(token) => token.clone(),
            None => std::env::var("VAULT_TOKEN").map_err(|_| {
                KeyStoreError::Config("no vault token configured and VAULT_TOKEN is unset".into())
            })?,
        };

        if config.address.trim().is_empty() {
            return Err(KeyStoreError::Config("vault address is empty".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| KeyStoreError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            address: config.address.trim_end_matches('/').to_string(),
            mount: config.mount.trim_matches('/').to_string(),
            token,
            namespace: config.namespace.clone(),
            client,
        })
    }

    fn secret_url(&self, image: &KeyImage) -> String {
        format!("{}/v1/{}/data/{}", self.address, self.mount, image)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header("X-Vault-Token", &self.token);
        match &self.namespace {
            Some(ns) => request.header("X-Vault-Namespace", ns),
            None => request,
        }
    }
}

impl std::fmt::Debug for VaultKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultKeyStore")
            .field("address", &self.address)
            .field("mount", &self.mount)
            .field("namespace", &self.namespace)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Serialize)]
struct WriteRequest<'a> {
    data: SecretData<'a>,
}

#[derive(Serialize)]
struct SecretData<'a> {
    key: &'a str,
}

#[derive(Deserialize)]
struct ReadResponse {
    data: ReadEnvelope,
}

#[derive(Deserialize)]
struct ReadEnvelope {
    data: StoredSecret,
}

#[derive(Deserialize)]
struct StoredSecret {
    key: String,
}

fn unavailable(context: &str, e: impl std::fmt::Display) -> KeyStoreError {
    KeyStoreError::BackendUnavailable(format!("{}: {}", context, e))
}

#[async_trait]
impl KeyStore for VaultKeyStore {
    async fn put(&self, image: &KeyImage, material: &KeyMaterial) -> Result<()> {
        let body = WriteRequest {
            data: SecretData {
                key: material.expose(),
            },
        };

        let response = self
            .authorize(self.client.post(self.secret_url(image)))
            .json(&body)
            .send()
            .await
            .map_err(|e| unavailable("vault write failed", e))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, image = %image, "vault rejected key write");
            return Err(KeyStoreError::BackendUnavailable(format!(
                "vault write returned {}",
                status
            )));
        }

        Ok(())
    }

    async fn get(&self, image: &KeyImage) -> Result<KeyMaterial> {
        let response = self
            .authorize(self.client.get(self.secret_url(image)))
            .send()
            .await
            .map_err(|e| unavailable("vault read failed", e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(KeyStoreError::KeyNotFound(image.clone()));
        }
        if !status.is_success() {
            return Err(KeyStoreError::BackendUnavailable(format!(
                "vault read returned {}",
                status
            )));
        }

        let body: ReadResponse = response
            .json()
            .await
            .map_err(|e| unavailable("malformed vault response", e))?;

        Ok(KeyMaterial::new(body.data.data.key))
    }

    fn backend(&self) -> &'static str {
        "vault"
    }
}
