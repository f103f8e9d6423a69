//! Read-side operations over the record store.

use std::sync::Arc;

use crate::error::QueryError;
use crate::store::RecordStore;
use crate::types::{
    ImageId, ImageRecord, ImageSummary, Stats, ThumbnailLocators, ThumbnailSize,
};

/// Serves records, listings, thumbnail bytes and aggregate stats.
pub struct QueryService {
    store: Arc<dyn RecordStore>,
    base_url: String,
}

impl QueryService {
    pub fn new(store: Arc<dyn RecordStore>, base_url: impl Into<String>) -> Self {
        Self {
            store,
            base_url: base_url.into(),
        }
    }

    pub async fn get(&self, id: ImageId) -> Result<ImageRecord, QueryError> {
        Ok(self.store.get(id).await?)
    }

    /// Every record as a summary, newest first.
    pub async fn list(&self) -> Result<Vec<ImageSummary>, QueryError> {
        let records = self.store.list().await?;
        Ok(records
            .into_iter()
            .map(|record| ImageSummary {
                image_id: record.id,
                thumbnails: ThumbnailLocators::for_image(&self.base_url, record.id),
                original_name: record.original_name,
                status: record.status,
                processed_at: record.processed_at,
            })
            .collect())
    }

    /// JPEG bytes of one thumbnail variant.
    ///
    /// `NotReady` covers both a record still processing (or failed) and a
    /// recorded path whose file has since disappeared.
    pub async fn thumbnail(&self, id: ImageId, size: ThumbnailSize) -> Result<Vec<u8>, QueryError> {
        let record = self.store.get(id).await?;
        let not_ready = || QueryError::NotReady {
            id,
            size: size.as_str(),
        };

        let path = record.thumbnail_path(size).ok_or_else(not_ready)?;
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_ready()),
            Err(source) => Err(QueryError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Fresh aggregate over the whole store.
    pub async fn stats(&self) -> Result<Stats, QueryError> {
        Ok(self.store.stats().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Artifacts;
    use crate::store::MemoryStore;
    use crate::types::{ImageStatus, RecordPatch};
    use std::path::{Path, PathBuf};

    fn artifacts(dir: &Path) -> Artifacts {
        Artifacts {
            width: 10,
            height: 10,
            format: "jpg".to_string(),
            size_bytes: 100,
            exif: None,
            small_path: dir.join("thumb_small.jpg"),
            medium_path: dir.join("thumb_medium.jpg"),
        }
    }

    async fn seeded() -> (QueryService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (
            QueryService::new(store.clone(), "http://localhost:8000/"),
            store,
        )
    }

    async fn add(store: &MemoryStore, name: &str) -> ImageId {
        let record = ImageRecord::new(
            ImageId::new(),
            name,
            "image/png",
            PathBuf::from("/nowhere/original.jpg"),
        );
        let id = record.id;
        store.create(record).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let (query, _) = seeded().await;
        let id = ImageId::new();
        assert!(matches!(query.get(id).await, Err(QueryError::NotFound(x)) if x == id));
        assert!(matches!(
            query.thumbnail(id, ThumbnailSize::Small).await,
            Err(QueryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_builds_locators() {
        let (query, store) = seeded().await;
        let id = add(&store, "a.png").await;

        let list = query.list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].image_id, id);
        assert_eq!(list[0].status, ImageStatus::Processing);
        assert_eq!(
            list[0].thumbnails.medium,
            format!("http://localhost:8000/api/images/{id}/thumbnails/medium")
        );
    }

    #[tokio::test]
    async fn test_thumbnail_not_ready_while_processing() {
        let (query, store) = seeded().await;
        let id = add(&store, "a.png").await;
        let err = query.thumbnail(id, ThumbnailSize::Medium).await.unwrap_err();
        assert!(matches!(err, QueryError::NotReady { size: "medium", .. }));
    }

    #[tokio::test]
    async fn test_thumbnail_file_missing_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let (query, store) = seeded().await;
        let id = add(&store, "a.png").await;
        store
            .update(id, RecordPatch::success(artifacts(dir.path()), "c".into(), 5))
            .await
            .unwrap();

        let err = query.thumbnail(id, ThumbnailSize::Small).await.unwrap_err();
        assert!(matches!(err, QueryError::NotReady { .. }));
    }

    #[tokio::test]
    async fn test_thumbnail_bytes_served() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("thumb_small.jpg"), [0xFF, 0xD8, 0xFF]).unwrap();
        let (query, store) = seeded().await;
        let id = add(&store, "a.png").await;
        store
            .update(id, RecordPatch::success(artifacts(dir.path()), "c".into(), 5))
            .await
            .unwrap();

        let bytes = query.thumbnail(id, ThumbnailSize::Small).await.unwrap();
        assert_eq!(bytes, vec![0xFF, 0xD8, 0xFF]);
    }

    #[tokio::test]
    async fn test_stats_consistency() {
        let (query, store) = seeded().await;
        let a = add(&store, "a").await;
        add(&store, "b").await;
        store.update(a, RecordPatch::failure("bad", 3)).await.unwrap();

        let stats = query.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.success + stats.failed + stats.processing, stats.total);
        assert_eq!(stats.failure_rate, 0.5);
        assert!(stats.avg_processing_time_ms.is_none());
    }
}
