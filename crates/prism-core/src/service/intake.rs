//! Upload intake: validate, persist, register, schedule.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::error::IntakeError;
use crate::pipeline::Dispatcher;
use crate::store::RecordStore;
use crate::types::{ImageId, ImageRecord, ThumbnailLocators, Upload, UploadReceipt};

const ORIGINAL_FILE_NAME: &str = "original.jpg";

/// Lowercase a MIME type and strip any parameters (`; charset=...`).
pub fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Accepts uploads and hands them to the background pipeline.
///
/// Validation happens before any file or record is written, so a rejected
/// upload leaves nothing behind.
pub struct IntakeService {
    store: Arc<dyn RecordStore>,
    dispatcher: Dispatcher,
    images_dir: PathBuf,
    base_url: String,
    accepted: Vec<String>,
    max_upload_bytes: u64,
    max_upload_mb: u64,
}

impl IntakeService {
    pub fn new(config: &Config, store: Arc<dyn RecordStore>, dispatcher: Dispatcher) -> Self {
        Self {
            store,
            dispatcher,
            images_dir: config.images_dir(),
            base_url: config.server.resolved_base_url(),
            accepted: config
                .processing
                .accepted_content_types
                .iter()
                .map(|ct| normalize_content_type(ct))
                .collect(),
            max_upload_bytes: config.limits.max_upload_bytes(),
            max_upload_mb: config.limits.max_upload_mb,
        }
    }

    /// Register an upload and schedule its processing. Never waits for the
    /// worker.
    pub async fn submit(&self, upload: Upload) -> Result<UploadReceipt, IntakeError> {
        let content_type = normalize_content_type(&upload.content_type);
        if !self.accepted.iter().any(|ct| *ct == content_type) {
            return Err(IntakeError::UnsupportedMediaType(upload.content_type));
        }

        let size = upload.bytes.len() as u64;
        if size == 0 {
            return Err(IntakeError::EmptyUpload);
        }
        if size > self.max_upload_bytes {
            return Err(IntakeError::TooLarge {
                size_mb: size.div_ceil(1024 * 1024),
                max_mb: self.max_upload_mb,
            });
        }

        let id = ImageId::new();
        let dir = self.images_dir.join(id.to_string());
        let stored_path = dir.join(ORIGINAL_FILE_NAME);
        write_upload(&dir, &stored_path, &upload.bytes).await?;

        let record = ImageRecord::new(id, &upload.original_name, content_type, &stored_path);
        if let Err(e) = self.store.create(record).await {
            remove_dir_best_effort(&dir).await;
            return Err(e.into());
        }

        self.dispatcher.schedule(id)?;

        tracing::info!(
            image_id = %id,
            size_bytes = size,
            "Accepted upload {}",
            upload.original_name
        );

        Ok(UploadReceipt {
            image_id: id,
            original_name: upload.original_name,
            thumbnails: ThumbnailLocators::for_image(&self.base_url, id),
        })
    }
}

async fn write_upload(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), IntakeError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| IntakeError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    if let Err(source) = tokio::fs::write(path, bytes).await {
        remove_dir_best_effort(dir).await;
        return Err(IntakeError::Io {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

async fn remove_dir_best_effort(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        tracing::warn!("Failed to clean up {:?}: {e}", dir);
    }
}
