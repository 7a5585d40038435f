//! Per-document async locks.
//!
//! Serializes rotations on one document inside this process. Cross-process
//! safety comes from the compare-and-swap in the store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use keyward_core::ContentId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Lock table keyed by content id. Idle entries are pruned on each acquire.
#[derive(Default)]
pub struct DocumentLocks {
    table: Mutex<HashMap<ContentId, Arc<AsyncMutex<()>>>>,
}

impl DocumentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `document`.
    pub async fn lock(&self, document: &ContentId) -> OwnedMutexGuard<()> {
        let slot = {
            let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
            table.retain(|_, slot| Arc::strong_count(slot) > 1);
            table
                .entry(document.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        slot.lock_owned().await
    }

    /// Number of documents with a live lock holder or waiter.
    pub fn active(&self) -> usize {
        let table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        table
            .values()
            .filter(|slot| Arc::strong_count(slot) > 1)
            .count()
    }
}
