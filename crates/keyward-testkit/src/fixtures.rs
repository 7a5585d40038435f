//! Test fixtures and helpers.
//!
//! A [`Scenario`] wires an engine to instrumented collaborators with one
//! owner account and one third party, so tests can assert both outcomes and
//! side effects.

use std::sync::{Arc, Once};

use keyward::{AccessOutcome, Engine, EngineConfig, Result};
use keyward_core::{AccountId, Capability, Document, Permission, ThirdPartyId};
use keyward_keystore::KeyStore;
use keyward_store::{MemoryStore, Store};

use crate::instrumented::{RecordingKeyStore, RecordingStore};

/// Plaintext used when a test does not care about content.
pub const SAMPLE_DOCUMENT: &[u8] = b"<statement><balance>1024.00</balance></statement>";

static TRACING: Once = Once::new();

/// Install a test-friendly tracing subscriber once per process.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
            .try_init();
    });
}

/// An engine over recording collaborators, with an owner and a third party.
pub struct Scenario<S: Store = MemoryStore> {
    pub engine: Engine<RecordingStore<S>>,
    pub keystore: Arc<RecordingKeyStore>,
    pub owner: AccountId,
    pub party: ThirdPartyId,
}

impl Scenario<MemoryStore> {
    /// In-memory store, in-memory key store, default config.
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new(), EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_store(MemoryStore::new(), config)
    }
}

impl Default for Scenario<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Store> Scenario<S> {
    /// Wrap `store` and a recording in-memory key store.
    pub fn with_store(store: S, config: EngineConfig) -> Self {
        Self::with_keystore(store, Arc::new(RecordingKeyStore::in_memory()), config)
    }

    pub fn with_keystore(store: S, keystore: Arc<RecordingKeyStore>, config: EngineConfig) -> Self {
        init_tracing();
        let shared: Arc<dyn KeyStore> = keystore.clone();
        let engine = Engine::new(RecordingStore::new(store), shared, config)
            .expect("scenario config must be valid");

        Self {
            engine,
            keystore,
            owner: AccountId::new("owner-account").expect("static id"),
            party: ThirdPartyId::new("relying-party").expect("static id"),
        }
    }

    pub fn store(&self) -> &RecordingStore<S> {
        self.engine.store()
    }

    /// Create a document owned by the scenario's owner.
    pub async fn seal(&self, plaintext: &[u8]) -> Result<Document> {
        self.engine
            .create_document(&self.owner, "statement.xml", plaintext)
            .await
    }

    /// Grant the scenario's third party read access to `document`.
    pub async fn grant(&self, document: &Document) -> Result<Permission> {
        self.grant_with(document, Capability::Read, None).await
    }

    pub async fn grant_with(
        &self,
        document: &Document,
        capability: Capability,
        ttl: Option<i64>,
    ) -> Result<Permission> {
        self.engine
            .grant_permission(&self.owner, &self.party, &document.content_id, capability, ttl)
            .await
    }

    pub async fn delegate(&self, enabled: bool) -> Result<()> {
        self.engine.set_delegation(&self.owner, enabled).await?;
        Ok(())
    }

    /// A document with a read grant and delegation on: ready to rotate.
    pub async fn shared_document(&self, plaintext: &[u8]) -> Result<Document> {
        let document = self.seal(plaintext).await?;
        self.grant(&document).await?;
        self.delegate(true).await?;
        Ok(document)
    }

    /// Third-party read by the scenario's party.
    pub async fn rotate(&self, document: &Document) -> Result<AccessOutcome> {
        self.engine
            .access_and_rotate(&self.party, &document.content_id, &self.owner)
            .await
    }

    /// Current stored state of `document`.
    pub async fn reload(&self, document: &Document) -> Document {
        self.store()
            .get_document(&document.content_id)
            .await
            .expect("store read")
            .expect("document exists")
    }
}
