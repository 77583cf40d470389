//! Per-entity coarse lock table (§5.1). Write tools acquire the entry
//! for `(entityType, entityId)` for the duration of the operation; read
//! tools take no locks. Entries are created on first reference and left
//! in place — eviction is not required at this scale.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use orchestrator_core::models::EntityType;

#[derive(Default)]
pub struct LockTable {
    entries: Mutex<HashMap<(EntityType, Uuid), Arc<AsyncMutex<()>>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `(entity_type, entity_id)`, creating the
    /// entry if this is the first reference. The returned guard holds
    /// the lock until dropped.
    pub async fn acquire(&self, entity_type: EntityType, entity_id: Uuid) -> OwnedMutexGuard<()> {
        let entry = {
            let mut entries = self.entries.lock();
            entries
                .entry((entity_type, entity_id))
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        entry.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_key_serialises() {
        let table = LockTable::new();
        let id = Uuid::new_v4();
        let first = table.acquire(EntityType::Task, id).await;
        drop(first);
        let _second = table.acquire(EntityType::Task, id).await;
    }

    #[tokio::test]
    async fn distinct_keys_do_not_contend() {
        let table = LockTable::new();
        let a = table.acquire(EntityType::Task, Uuid::new_v4()).await;
        let b = table.acquire(EntityType::Feature, Uuid::new_v4()).await;
        drop(a);
        drop(b);
    }
}
