//! SQLite record store.
//!
//! One `images` table, one row per record. Timestamps are stored as RFC 3339
//! strings with nanosecond precision so they sort lexicographically; EXIF is
//! stored as a JSON object in `exif_json`.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::RecordStore;
use crate::error::{StoreError, StoreResult};
use crate::types::{ExifMap, ImageId, ImageRecord, ImageStatus, RecordPatch, Stats};

const COLUMNS: &str = "id, original_name, content_type, stored_path, created_at, status, \
     error, processing_time_ms, size_bytes, width, height, format, exif_json, caption, \
     thumb_small_path, thumb_medium_path, processed_at";

/// Record store backed by a single SQLite connection.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Create or open the database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref()).map_err(|e| {
            StoreError::Backend(format!(
                "Failed to open database {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_connection(conn)
    }

    /// Private in-memory database.
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Backend(format!("Failed to open in-memory database: {e}")))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> StoreResult<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
        "#,
        )
        .map_err(|e| StoreError::Backend(format!("Failed to set pragmas: {e}")))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS images (
                id TEXT PRIMARY KEY,
                original_name TEXT NOT NULL,
                content_type TEXT NOT NULL,
                stored_path TEXT NOT NULL,
                created_at TEXT NOT NULL,
                status TEXT NOT NULL,
                error TEXT,
                processing_time_ms INTEGER,
                size_bytes INTEGER,
                width INTEGER,
                height INTEGER,
                format TEXT,
                exif_json TEXT,
                caption TEXT,
                thumb_small_path TEXT,
                thumb_medium_path TEXT,
                processed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_images_created_at ON images(created_at);
            CREATE INDEX IF NOT EXISTS idx_images_status ON images(status);
        "#,
        )
        .map_err(|e| StoreError::Backend(format!("Failed to create schema: {e}")))?;

        Ok(())
    }

    /// Run `f` against the connection on a blocking thread.
    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("Store task failed: {e}")))?
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create(&self, record: ImageRecord) -> StoreResult<()> {
        self.with_conn(move |conn| {
            let row = RecordRow::from_record(&record)?;
            let result = conn.execute(
                &format!(
                    "INSERT INTO images ({COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
                ),
                params![
                    row.id,
                    row.original_name,
                    row.content_type,
                    row.stored_path,
                    row.created_at,
                    row.status,
                    row.error,
                    row.processing_time_ms,
                    row.size_bytes,
                    row.width,
                    row.height,
                    row.format,
                    row.exif,
                    row.caption,
                    row.thumb_small_path,
                    row.thumb_medium_path,
                    row.processed_at,
                ],
            );
            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::DuplicateId(record.id))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn get(&self, id: ImageId) -> StoreResult<ImageRecord> {
        self.with_conn(move |conn| {
            select_one(conn, id)?.ok_or(StoreError::NotFound(id))
        })
        .await
    }

    async fn update(&self, id: ImageId, patch: RecordPatch) -> StoreResult<ImageRecord> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut record = select_one(&tx, id)?.ok_or(StoreError::NotFound(id))?;
            record.apply(patch);
            let row = RecordRow::from_record(&record)?;

            tx.execute(
                "UPDATE images SET status = ?2, error = ?3, processing_time_ms = ?4, \
                 size_bytes = ?5, width = ?6, height = ?7, format = ?8, exif_json = ?9, \
                 caption = ?10, thumb_small_path = ?11, thumb_medium_path = ?12, \
                 processed_at = ?13 WHERE id = ?1",
                params![
                    row.id,
                    row.status,
                    row.error,
                    row.processing_time_ms,
                    row.size_bytes,
                    row.width,
                    row.height,
                    row.format,
                    row.exif,
                    row.caption,
                    row.thumb_small_path,
                    row.thumb_medium_path,
                    row.processed_at,
                ],
            )?;
            tx.commit()?;
            Ok(record)
        })
        .await
    }

    async fn list(&self) -> StoreResult<Vec<ImageRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM images ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map([], RecordRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(RecordRow::into_record).collect()
        })
        .await
    }

    async fn stats(&self) -> StoreResult<Stats> {
        self.with_conn(|conn| {
            let (total, success, failed, avg): (i64, i64, i64, Option<f64>) = conn.query_row(
                "SELECT COUNT(*), \
                        COALESCE(SUM(CASE WHEN status = 'success' THEN 1 ELSE 0 END), 0), \
                        COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0), \
                        AVG(CASE WHEN status = 'success' THEN processing_time_ms END) \
                 FROM images",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;
            Ok(Stats::from_counts(
                total as u64,
                success as u64,
                failed as u64,
                avg,
            ))
        })
        .await
    }
}

fn select_one(conn: &Connection, id: ImageId) -> StoreResult<Option<ImageRecord>> {
    let row = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM images WHERE id = ?1"),
            params![id.to_string()],
            RecordRow::from_row,
        )
        .optional()?;
    row.map(RecordRow::into_record).transpose()
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Column values as SQLite sees them.
struct RecordRow {
    id: String,
    original_name: String,
    content_type: String,
    stored_path: String,
    created_at: String,
    status: String,
    error: Option<String>,
    processing_time_ms: Option<i64>,
    size_bytes: Option<i64>,
    width: Option<i64>,
    height: Option<i64>,
    format: Option<String>,
    exif: Option<String>,
    caption: Option<String>,
    thumb_small_path: Option<String>,
    thumb_medium_path: Option<String>,
    processed_at: Option<String>,
}

impl RecordRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            original_name: row.get(1)?,
            content_type: row.get(2)?,
            stored_path: row.get(3)?,
            created_at: row.get(4)?,
            status: row.get(5)?,
            error: row.get(6)?,
            processing_time_ms: row.get(7)?,
            size_bytes: row.get(8)?,
            width: row.get(9)?,
            height: row.get(10)?,
            format: row.get(11)?,
            exif: row.get(12)?,
            caption: row.get(13)?,
            thumb_small_path: row.get(14)?,
            thumb_medium_path: row.get(15)?,
            processed_at: row.get(16)?,
        })
    }

    fn from_record(record: &ImageRecord) -> StoreResult<Self> {
        let exif = record
            .exif
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Corrupt {
                id: record.id.to_string(),
                message: format!("exif not serializable: {e}"),
            })?;

        Ok(Self {
            id: record.id.to_string(),
            original_name: record.original_name.clone(),
            content_type: record.content_type.clone(),
            stored_path: path_string(&record.stored_path),
            created_at: format_ts(&record.created_at),
            status: record.status.as_str().to_string(),
            error: record.error.clone(),
            processing_time_ms: record.processing_time_ms.map(|v| v as i64),
            size_bytes: record.size_bytes.map(|v| v as i64),
            width: record.width.map(i64::from),
            height: record.height.map(i64::from),
            format: record.format.clone(),
            exif,
            caption: record.caption.clone(),
            thumb_small_path: record.thumb_small_path.as_deref().map(path_string),
            thumb_medium_path: record.thumb_medium_path.as_deref().map(path_string),
            processed_at: record.processed_at.as_ref().map(format_ts),
        })
    }

    fn into_record(self) -> StoreResult<ImageRecord> {
        let id_str = self.id;
        let corrupt = |message: String| StoreError::Corrupt {
            id: id_str.clone(),
            message,
        };

        let id: ImageId = id_str
            .parse()
            .map_err(|e| corrupt(format!("bad id: {e}")))?;
        let status: ImageStatus = self.status.parse().map_err(corrupt)?;
        let created_at = parse_ts(&self.created_at).map_err(corrupt)?;
        let processed_at = self
            .processed_at
            .as_deref()
            .map(parse_ts)
            .transpose()
            .map_err(corrupt)?;
        let exif = self
            .exif
            .as_deref()
            .map(serde_json::from_str::<ExifMap>)
            .transpose()
            .map_err(|e| corrupt(format!("bad exif: {e}")))?;
        let width = self
            .width
            .map(u32::try_from)
            .transpose()
            .map_err(|e| corrupt(format!("bad width: {e}")))?;
        let height = self
            .height
            .map(u32::try_from)
            .transpose()
            .map_err(|e| corrupt(format!("bad height: {e}")))?;

        Ok(ImageRecord {
            id,
            original_name: self.original_name,
            content_type: self.content_type,
            stored_path: PathBuf::from(self.stored_path),
            created_at,
            status,
            error: self.error,
            processing_time_ms: self.processing_time_ms.map(|v| v as u64),
            size_bytes: self.size_bytes.map(|v| v as u64),
            width,
            height,
            format: self.format,
            exif,
            caption: self.caption,
            thumb_small_path: self.thumb_small_path.map(PathBuf::from),
            thumb_medium_path: self.thumb_medium_path.map(PathBuf::from),
            processed_at,
        })
    }
}

fn parse_ts(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| format!("bad timestamp {value:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::super::contract;
    use super::*;

    fn store() -> SqliteStore {
        SqliteStore::in_memory().unwrap()
    }

    #[tokio::test]
    async fn test_create_then_get() {
        contract::create_then_get(&store()).await;
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        contract::duplicate_id_rejected(&store()).await;
    }

    #[tokio::test]
    async fn test_missing_record() {
        contract::missing_record(&store()).await;
    }

    #[tokio::test]
    async fn test_update_merges() {
        contract::update_merges(&store()).await;
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        contract::list_newest_first(&store()).await;
    }

    #[tokio::test]
    async fn test_stats_aggregate() {
        contract::stats_aggregate(&store()).await;
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prism.db");

        let rec = contract::record("persist.jpg");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.create(rec.clone()).await.unwrap();
            store
                .update(rec.id, contract::success_patch(42))
                .await
                .unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        let fetched = reopened.get(rec.id).await.unwrap();
        assert_eq!(fetched.status, ImageStatus::Success);
        assert_eq!(fetched.created_at, rec.created_at);
        assert_eq!(fetched.caption.as_deref(), Some("a cat on a sofa"));
    }

    #[tokio::test]
    async fn test_corrupt_row_is_reported() {
        let store = store();
        let rec = contract::record("bad.jpg");
        store.create(rec.clone()).await.unwrap();
        {
            let conn = store.conn.lock();
            conn.execute(
                "UPDATE images SET status = 'exploded' WHERE id = ?1",
                params![rec.id.to_string()],
            )
            .unwrap();
        }

        let err = store.get(rec.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn test_timestamp_format_sorts_lexicographically() {
        let earlier = DateTime::parse_from_rfc3339("2024-01-01T00:00:00.5Z")
            .unwrap()
            .with_timezone(&Utc);
        let later = DateTime::parse_from_rfc3339("2024-01-01T00:00:01Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(format_ts(&earlier) < format_ts(&later));
    }
}
