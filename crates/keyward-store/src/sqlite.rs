//! SQLite implementation of the Store trait.
//!
//! rusqlite with bundled SQLite, wrapped in async via
//! `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension};

use keyward_core::{
    AccountId, Capability, ContentId, Document, KeyImage, Permission, PermissionId, Setting,
    ThirdPartyId,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{Store, SwapResult};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file, its parent directories, and the schema if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("spawn_blocking failed: {}", e)))?
    }
}

const DOCUMENT_COLUMNS: &str = "content_id, name, ciphertext, account, key_image, created_at";
const PERMISSION_COLUMNS: &str =
    "id, capability, document, account, third_party, active, ttl, granted_at";

fn column<T>(idx: usize, parsed: keyward_core::Result<T>) -> rusqlite::Result<T> {
    parsed.map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    let ciphertext: Vec<u8> = row.get(2)?;
    Ok(Document {
        content_id: column(0, ContentId::new(row.get::<_, String>(0)?))?,
        name: row.get(1)?,
        ciphertext: Bytes::from(ciphertext),
        account: column(3, AccountId::new(row.get::<_, String>(3)?))?,
        key_image: column(4, KeyImage::parse(&row.get::<_, String>(4)?))?,
        created_at: row.get(5)?,
    })
}

fn row_to_permission(row: &rusqlite::Row<'_>) -> rusqlite::Result<Permission> {
    let ttl: i64 = row.get(6)?;
    Ok(Permission {
        id: column(0, PermissionId::new(row.get::<_, String>(0)?))?,
        capability: column(1, row.get::<_, String>(1)?.parse::<Capability>())?,
        document: column(2, ContentId::new(row.get::<_, String>(2)?))?,
        account: column(3, AccountId::new(row.get::<_, String>(3)?))?,
        third_party: column(4, ThirdPartyId::new(row.get::<_, String>(4)?))?,
        active: row.get(5)?,
        ttl: (ttl >= 0).then_some(ttl),
        granted_at: row.get(7)?,
    })
}

fn query_document(conn: &Connection, id: &str) -> Result<Option<Document>> {
    conn.query_row(
        &format!("SELECT {} FROM documents WHERE content_id = ?1", DOCUMENT_COLUMNS),
        params![id],
        row_to_document,
    )
    .optional()
    .map_err(StoreError::from)
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_document(&self, document: &Document) -> Result<()> {
        let document = document.clone();
        self.blocking(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO documents (
                    content_id, name, ciphertext, account, key_image, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    document.content_id.as_str(),
                    document.name,
                    document.ciphertext.as_ref(),
                    document.account.as_str(),
                    document.key_image.as_str(),
                    document.created_at,
                ],
            )?;

            if inserted == 0 {
                return Err(StoreError::Duplicate {
                    kind: "document",
                    id: document.content_id.to_string(),
                });
            }
            Ok(())
        })
        .await
    }

    async fn get_document(&self, id: &ContentId) -> Result<Option<Document>> {
        let id = id.clone();
        self.blocking(move |conn| query_document(conn, id.as_str()))
            .await
    }

    async fn list_documents(&self, account: &AccountId) -> Result<Vec<Document>> {
        let account = account.clone();
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM documents WHERE account = ?1 ORDER BY created_at, content_id",
                DOCUMENT_COLUMNS
            ))?;
            let docs = stmt
                .query_map(params![account.as_str()], row_to_document)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(docs)
        })
        .await
    }

    async fn swap_sealed(
        &self,
        id: &ContentId,
        expected: &KeyImage,
        new_image: &KeyImage,
        ciphertext: Bytes,
    ) -> Result<SwapResult> {
        let id = id.clone();
        let expected = expected.clone();
        let new_image = new_image.clone();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;

            let updated = tx.execute(
                "UPDATE documents SET key_image = ?1, ciphertext = ?2
                 WHERE content_id = ?3 AND key_image = ?4",
                params![
                    new_image.as_str(),
                    ciphertext.as_ref(),
                    id.as_str(),
                    expected.as_str()
                ],
            )?;

            let result = match query_document(&tx, id.as_str())? {
                None => SwapResult::NotFound,
                Some(doc) if updated == 1 => SwapResult::Swapped(doc),
                Some(doc) => SwapResult::Conflict {
                    current: doc.key_image,
                },
            };

            tx.commit()?;
            Ok(result)
        })
        .await
    }

    async fn insert_permission(&self, permission: &Permission) -> Result<()> {
        let permission = permission.clone();
        self.blocking(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO permissions (
                    id, capability, document, account, third_party, active, ttl, granted_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    permission.id.as_str(),
                    permission.capability.as_str(),
                    permission.document.as_str(),
                    permission.account.as_str(),
                    permission.third_party.as_str(),
                    permission.active,
                    permission.ttl.unwrap_or(-1),
                    permission.granted_at,
                ],
            )?;

            if inserted == 0 {
                return Err(StoreError::Duplicate {
                    kind: "permission",
                    id: permission.id.to_string(),
                });
            }
            Ok(())
        })
        .await
    }

    async fn get_permission(&self, id: &PermissionId) -> Result<Option<Permission>> {
        let id = id.clone();
        self.blocking(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM permissions WHERE id = ?1", PERMISSION_COLUMNS),
                params![id.as_str()],
                row_to_permission,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn active_permissions(
        &self,
        document: &ContentId,
        third_party: &ThirdPartyId,
    ) -> Result<Vec<Permission>> {
        let document = document.clone();
        let third_party = third_party.clone();
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM permissions
                 WHERE document = ?1 AND third_party = ?2 AND active = 1
                 ORDER BY granted_at, id",
                PERMISSION_COLUMNS
            ))?;
            let grants = stmt
                .query_map(
                    params![document.as_str(), third_party.as_str()],
                    row_to_permission,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(grants)
        })
        .await
    }

    async fn list_permissions(&self, account: &AccountId) -> Result<Vec<Permission>> {
        let account = account.clone();
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM permissions WHERE account = ?1 ORDER BY granted_at, id",
                PERMISSION_COLUMNS
            ))?;
            let grants = stmt
                .query_map(params![account.as_str()], row_to_permission)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(grants)
        })
        .await
    }

    async fn set_permission_active(&self, id: &PermissionId, active: bool) -> Result<bool> {
        let id = id.clone();
        self.blocking(move |conn| {
            let changed = conn.execute(
                "UPDATE permissions SET active = ?1 WHERE id = ?2",
                params![active, id.as_str()],
            )?;
            Ok(changed == 1)
        })
        .await
    }

    async fn deactivate_permissions(
        &self,
        account: &AccountId,
        third_party: &ThirdPartyId,
        capability: Option<Capability>,
    ) -> Result<usize> {
        let account = account.clone();
        let third_party = third_party.clone();
        self.blocking(move |conn| {
            let changed = conn.execute(
                "UPDATE permissions SET active = 0
                 WHERE account = ?1 AND third_party = ?2 AND active = 1
                   AND (?3 IS NULL OR capability = ?3)",
                params![account.as_str(), third_party.as_str(), capability.map(|c| c.as_str())],
            )?;
            Ok(changed)
        })
        .await
    }

    async fn get_setting(&self, account: &AccountId, key: &str) -> Result<Option<Setting>> {
        let account = account.clone();
        let key = key.to_string();
        self.blocking(move |conn| {
            let value: Option<bool> = conn
                .query_row(
                    "SELECT value FROM settings WHERE account = ?1 AND key = ?2",
                    params![account.as_str(), key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value.map(|value| Setting::new(account, key, value)))
        })
        .await
    }

    async fn upsert_setting(&self, setting: &Setting) -> Result<()> {
        let setting = setting.clone();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO settings (account, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(account, key) DO UPDATE SET value = excluded.value",
                params![setting.account.as_str(), setting.key, setting.value],
            )?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StoreExt;
    use keyward_core::KeyBundle;

    fn account() -> AccountId {
        AccountId::new("acct").unwrap()
    }

    fn make_document() -> (Document, KeyBundle) {
        let bundle = KeyBundle::fresh();
        let doc = Document {
            content_id: ContentId::generate(),
            name: "report.xml".into(),
            ciphertext: Bytes::from(bundle.encrypt(b"<report/>").unwrap()),
            account: account(),
            key_image: bundle.key_image().clone(),
            created_at: 1_700_000_000_000,
        };
        (doc, bundle)
    }

    #[tokio::test]
    async fn test_document_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        let (doc, bundle) = make_document();

        store.insert_document(&doc).await.unwrap();
        let loaded = store.get_document(&doc.content_id).await.unwrap().unwrap();
        assert_eq!(loaded, doc);
        assert_eq!(bundle.decrypt(&loaded.ciphertext).unwrap(), b"<report/>");

        assert!(matches!(
            store.insert_document(&doc).await,
            Err(StoreError::Duplicate { .. })
        ));
        assert_eq!(store.list_documents(&account()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_swap_sealed() {
        let store = SqliteStore::open_memory().unwrap();
        let (doc, _) = make_document();
        store.insert_document(&doc).await.unwrap();

        let next = KeyBundle::fresh();
        let token = Bytes::from(next.encrypt(b"<report/>").unwrap());
        let result = store
            .swap_sealed(&doc.content_id, &doc.key_image, next.key_image(), token.clone())
            .await
            .unwrap();
        let updated = match result {
            SwapResult::Swapped(doc) => doc,
            other => panic!("expected swap, got {:?}", other),
        };
        assert_eq!(&updated.key_image, next.key_image());
        assert_eq!(updated.ciphertext, token);

        let lost = store
            .swap_sealed(&doc.content_id, &doc.key_image, &doc.key_image, Bytes::new())
            .await
            .unwrap();
        assert_eq!(
            lost,
            SwapResult::Conflict {
                current: next.key_image().clone()
            }
        );

        // The losing swap changed nothing.
        let stored = store.get_document(&doc.content_id).await.unwrap().unwrap();
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn test_permission_ttl_persisted() {
        let store = SqliteStore::open_memory().unwrap();
        let doc = ContentId::generate();
        let party = ThirdPartyId::new("party").unwrap();

        let forever = Permission::grant(Capability::Read, doc.clone(), account(), party.clone(), None, 1);
        let bounded = Permission::grant(Capability::Write, doc.clone(), account(), party.clone(), Some(30), 2);
        store.insert_permission(&forever).await.unwrap();
        store.insert_permission(&bounded).await.unwrap();

        assert_eq!(store.get_permission(&forever.id).await.unwrap(), Some(forever.clone()));
        assert_eq!(store.get_permission(&bounded.id).await.unwrap(), Some(bounded.clone()));
        assert_eq!(
            store.active_permissions(&doc, &party).await.unwrap(),
            vec![forever.clone(), bounded.clone()]
        );

        let closed = store
            .deactivate_permissions(&account(), &party, Some(Capability::Write))
            .await
            .unwrap();
        assert_eq!(closed, 1);
        assert_eq!(
            store.active_permissions(&doc, &party).await.unwrap(),
            vec![forever.clone()]
        );

        assert_eq!(store.deactivate_permissions(&account(), &party, None).await.unwrap(), 1);
        assert!(store.active_permissions(&doc, &party).await.unwrap().is_empty());

        let stats = store.account_stats(&account()).await.unwrap();
        assert_eq!(stats.permission_count, 2);
        assert_eq!(stats.active_permission_count, 0);
    }

    #[tokio::test]
    async fn test_settings() {
        let store = SqliteStore::open_memory().unwrap();
        store
            .upsert_setting(&Setting::new(account(), "delegation", true))
            .await
            .unwrap();
        assert!(store.get_setting(&account(), "delegation").await.unwrap().unwrap().value);

        store
            .upsert_setting(&Setting::new(account(), "delegation", false))
            .await
            .unwrap();
        assert!(!store.get_setting(&account(), "delegation").await.unwrap().unwrap().value);
        assert!(store.get_setting(&account(), "other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_on_disk_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("keyward.db");
        let (doc, _) = make_document();

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_document(&doc).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get_document(&doc.content_id).await.unwrap(), Some(doc));
    }
}
