//! Background processing of one stored upload to its terminal state.

use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use crate::caption::{Captioner, ImageInput};
use crate::error::{PipelineError, StoreError};
use crate::store::RecordStore;
use crate::types::{ImageId, ImageStatus, RecordPatch};

use super::artifacts::{ArtifactGenerator, GeneratedArtifacts};

/// Drives a `processing` record to `success` or `failed`.
///
/// Artifact generation decides the outcome. Captioning is best-effort: a
/// failed or timed-out caption is recorded as a diagnostic string and the
/// record still succeeds.
pub struct ProcessingWorker {
    store: Arc<dyn RecordStore>,
    generator: Arc<ArtifactGenerator>,
    captioner: Arc<dyn Captioner>,
}

impl ProcessingWorker {
    pub fn new(
        store: Arc<dyn RecordStore>,
        generator: Arc<ArtifactGenerator>,
        captioner: Arc<dyn Captioner>,
    ) -> Self {
        Self {
            store,
            generator,
            captioner,
        }
    }

    /// Process one image. Returns the terminal status written, or `None` when
    /// nothing was written (record missing, already terminal, or the store
    /// rejected the final update).
    pub async fn run(&self, id: ImageId) -> Option<ImageStatus> {
        let record = match self.store.get(id).await {
            Ok(record) => record,
            Err(StoreError::NotFound(_)) => {
                tracing::debug!(image_id = %id, "Record vanished before processing");
                return None;
            }
            Err(e) => {
                tracing::error!(image_id = %id, "Failed to load record: {e}");
                return None;
            }
        };

        if record.is_terminal() {
            tracing::warn!(
                image_id = %id,
                status = %record.status,
                "Record already terminal, skipping"
            );
            return None;
        }

        let start = Instant::now();
        tracing::debug!(image_id = %id, "Processing {:?}", record.stored_path);

        let patch = match self.generate(record.stored_path).await {
            Ok(generated) => {
                let caption = self.caption(id, &generated.normalized).await;
                RecordPatch::success(generated.artifacts, caption, elapsed_ms(start))
            }
            Err(e) => {
                tracing::warn!(image_id = %id, "Processing failed: {e}");
                RecordPatch::failure(e.to_string(), elapsed_ms(start))
            }
        };

        let status = patch.status;
        match self.store.update(id, patch).await {
            Ok(updated) => {
                tracing::info!(
                    image_id = %id,
                    status = %updated.status,
                    processing_time_ms = updated.processing_time_ms.unwrap_or_default(),
                    "Processed {}",
                    updated.original_name
                );
                status
            }
            Err(e) => {
                tracing::error!(image_id = %id, "Failed to write terminal state: {e}");
                None
            }
        }
    }

    /// Mark a run that ended abnormally as failed, unless it already reached
    /// a terminal state.
    pub async fn abandon(&self, id: ImageId, reason: &str, processing_time_ms: u64) {
        match self.store.get(id).await {
            Ok(record) if record.is_terminal() => return,
            Ok(_) => {}
            Err(e) => {
                tracing::error!(image_id = %id, "Failed to load abandoned record: {e}");
                return;
            }
        }

        let patch = RecordPatch::failure(
            format!("processing aborted: {reason}"),
            processing_time_ms,
        );
        match self.store.update(id, patch).await {
            Ok(_) => tracing::warn!(image_id = %id, "Worker aborted, marked failed: {reason}"),
            Err(e) => tracing::error!(image_id = %id, "Failed to mark aborted run: {e}"),
        }
    }

    async fn generate(
        &self,
        stored_path: std::path::PathBuf,
    ) -> Result<GeneratedArtifacts, PipelineError> {
        let generator = Arc::clone(&self.generator);
        tokio::task::spawn_blocking(move || generator.generate(&stored_path))
            .await
            .map_err(|e| PipelineError::Join(e.to_string()))?
    }

    async fn caption(&self, id: ImageId, normalized: &[u8]) -> String {
        let input = ImageInput::jpeg(normalized);
        let timeout = self.captioner.timeout();

        let call = AssertUnwindSafe(self.captioner.caption(&input)).catch_unwind();
        let result = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(PipelineError::Caption {
                message: format!("provider panicked: {}", panic_message(panic.as_ref())),
                status_code: None,
            }),
            Err(_) => Err(PipelineError::Caption {
                message: format!("timed out after {}ms", timeout.as_millis()),
                status_code: None,
            }),
        };

        match result {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    image_id = %id,
                    provider = self.captioner.name(),
                    "Caption failed: {e}"
                );
                format!("captioning error: {e}")
            }
        }
    }
}

/// Text carried by a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub(crate) fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
