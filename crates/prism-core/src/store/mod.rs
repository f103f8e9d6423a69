//! Durable keyed storage for image records.
//!
//! Every call is atomic on its own. The worker relies on this to publish a
//! terminal state with a single `update`, so readers never see a half-written
//! record.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{StoreError, StoreResult};
use crate::types::{ImageId, ImageRecord, RecordPatch, Stats};

/// Record persistence used by intake, the worker and queries.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Insert a new record. Fails with `DuplicateId` if the id exists.
    async fn create(&self, record: ImageRecord) -> StoreResult<()>;

    /// Fetch one record.
    async fn get(&self, id: ImageId) -> StoreResult<ImageRecord>;

    /// Merge `patch` into an existing record and return the result.
    async fn update(&self, id: ImageId, patch: RecordPatch) -> StoreResult<ImageRecord>;

    /// All records, newest first.
    async fn list(&self) -> StoreResult<Vec<ImageRecord>>;

    /// Aggregate counters over a consistent snapshot.
    async fn stats(&self) -> StoreResult<Stats>;
}

/// Open the store selected by `storage.backend`.
pub fn open_store(config: &Config) -> StoreResult<Arc<dyn RecordStore>> {
    match config.storage.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        "sqlite" => {
            let path = config.database_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Backend(format!("Failed to create {}: {e}", parent.display()))
                })?;
            }
            Ok(Arc::new(SqliteStore::open(&path)?))
        }
        other => Err(StoreError::Backend(format!("Unknown store backend: {other}"))),
    }
}
