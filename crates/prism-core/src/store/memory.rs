//! In-process record store.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::RecordStore;
use crate::error::{StoreError, StoreResult};
use crate::types::{ImageId, ImageRecord, RecordPatch, Stats};

/// Records held in a map behind an async read-write lock. Not durable across
/// restarts; used for tests and `storage.backend = "memory"`.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<ImageId, ImageRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create(&self, record: ImageRecord) -> StoreResult<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(StoreError::DuplicateId(record.id));
        }
        records.insert(record.id, record);
        Ok(())
    }

    async fn get(&self, id: ImageId) -> StoreResult<ImageRecord> {
        self.records
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn update(&self, id: ImageId, patch: RecordPatch) -> StoreResult<ImageRecord> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.apply(patch);
        Ok(record.clone())
    }

    async fn list(&self) -> StoreResult<Vec<ImageRecord>> {
        let mut all: Vec<ImageRecord> = self.records.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn stats(&self) -> StoreResult<Stats> {
        Ok(Stats::from_records(self.records.read().await.values()))
    }
}
