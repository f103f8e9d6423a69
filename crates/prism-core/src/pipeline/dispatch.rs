//! Schedules workers on the tokio runtime.
//!
//! At most one worker runs per image id at a time, and at most
//! `parallel_workers` run at once overall. A run that panics is caught and
//! its record marked failed.

use futures_util::FutureExt;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Notify, Semaphore};

use crate::error::DispatchError;
use crate::types::ImageId;

use super::worker::{elapsed_ms, panic_message, ProcessingWorker};

/// Fire-and-forget scheduler for [`ProcessingWorker`] runs.
#[derive(Clone)]
pub struct Dispatcher {
    worker: Arc<ProcessingWorker>,
    permits: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashSet<ImageId>>>,
    idle: Arc<Notify>,
}

impl Dispatcher {
    pub fn new(worker: Arc<ProcessingWorker>, parallel_workers: usize) -> Self {
        Self {
            worker,
            permits: Arc::new(Semaphore::new(parallel_workers.max(1))),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            idle: Arc::new(Notify::new()),
        }
    }

    /// Start processing `id` in the background. Returns immediately.
    ///
    /// Fails if a run for the same id is already queued or active.
    pub fn schedule(&self, id: ImageId) -> Result<(), DispatchError> {
        if !self.in_flight.lock().insert(id) {
            return Err(DispatchError::AlreadyScheduled(id));
        }

        let guard = InFlight {
            id,
            in_flight: Arc::clone(&self.in_flight),
            idle: Arc::clone(&self.idle),
        };
        let worker = Arc::clone(&self.worker);
        let permits = Arc::clone(&self.permits);

        tokio::spawn(async move {
            let _guard = guard;
            let Ok(_permit) = permits.acquire_owned().await else {
                tracing::error!(image_id = %id, "Worker pool closed, dropping job");
                return;
            };
            let start = Instant::now();
            if let Err(panic) = AssertUnwindSafe(worker.run(id)).catch_unwind().await {
                let reason = panic_message(panic.as_ref());
                tracing::error!(image_id = %id, "Worker panicked: {reason}");
                worker.abandon(id, &reason, elapsed_ms(start)).await;
            }
        });

        tracing::debug!(image_id = %id, "Scheduled processing");
        Ok(())
    }

    /// Number of runs queued or active.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Wait until no run is queued or active.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a wakeup between the check and the
            // await is not lost
            notified.as_mut().enable();
            if self.in_flight.lock().is_empty() {
                return;
            }
            notified.await;
        }
    }
}

/// Removes the id from the in-flight set when the task ends, including on panic.
struct InFlight {
    id: ImageId,
    in_flight: Arc<Mutex<HashSet<ImageId>>>,
    idle: Arc<Notify>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut set = self.in_flight.lock();
        set.remove(&self.id);
        if set.is_empty() {
            self.idle.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption::DisabledCaptioner;
    use crate::config::Config;
    use crate::pipeline::ArtifactGenerator;
    use crate::error::StoreResult;
    use crate::store::{MemoryStore, RecordStore};
    use crate::types::{ImageRecord, ImageStatus, RecordPatch, Stats};
    use async_trait::async_trait;
    use image::{DynamicImage, ImageFormat};
    use std::io::Cursor;

    /// Panics when asked to publish a success, so the run dies mid-write.
    struct SuccessPanicStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl RecordStore for SuccessPanicStore {
        fn name(&self) -> &str {
            "success-panic"
        }

        async fn create(&self, record: ImageRecord) -> StoreResult<()> {
            self.inner.create(record).await
        }

        async fn get(&self, id: ImageId) -> StoreResult<ImageRecord> {
            self.inner.get(id).await
        }

        async fn update(&self, id: ImageId, patch: RecordPatch) -> StoreResult<ImageRecord> {
            if patch.status == Some(ImageStatus::Success) {
                panic!("disk vanished");
            }
            self.inner.update(id, patch).await
        }

        async fn list(&self) -> StoreResult<Vec<ImageRecord>> {
            self.inner.list().await
        }

        async fn stats(&self) -> StoreResult<Stats> {
            self.inner.stats().await
        }
    }

    fn dispatcher(store: Arc<MemoryStore>, workers: usize) -> Dispatcher {
        let worker = ProcessingWorker::new(
            store,
            Arc::new(ArtifactGenerator::new(&Config::default())),
            Arc::new(DisabledCaptioner),
        );
        Dispatcher::new(Arc::new(worker), workers)
    }

    async fn seed_jpeg(store: &dyn RecordStore, dir: &std::path::Path, name: &str) -> ImageId {
        let sub = dir.join(name);
        std::fs::create_dir_all(&sub).unwrap();
        let path = sub.join("original.jpg");
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::new_rgb8(200, 100)
            .write_to(&mut buf, ImageFormat::Jpeg)
            .unwrap();
        std::fs::write(&path, buf.into_inner()).unwrap();

        let record = ImageRecord::new(ImageId::new(), name, "image/jpeg", path);
        let id = record.id;
        store.create(record).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_schedule_runs_to_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let dispatcher = dispatcher(store.clone(), 2);

        let id = seed_jpeg(store.as_ref(), dir.path(), "a").await;
        dispatcher.schedule(id).unwrap();
        dispatcher.wait_idle().await;

        assert_eq!(dispatcher.in_flight_count(), 0);
        assert_eq!(store.get(id).await.unwrap().status, ImageStatus::Success);
    }

    #[tokio::test]
    async fn test_duplicate_schedule_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        // Zero permits are clamped to one; hold it so the job stays queued
        let dispatcher = dispatcher(store.clone(), 0);
        let held = dispatcher.permits.clone().acquire_owned().await.unwrap();

        let id = seed_jpeg(store.as_ref(), dir.path(), "a").await;
        dispatcher.schedule(id).unwrap();
        assert_eq!(
            dispatcher.schedule(id),
            Err(DispatchError::AlreadyScheduled(id))
        );
        assert_eq!(dispatcher.in_flight_count(), 1);

        drop(held);
        dispatcher.wait_idle().await;
        assert_eq!(store.get(id).await.unwrap().status, ImageStatus::Success);

        // Once finished the id may be scheduled again; the worker skips it
        dispatcher.schedule(id).unwrap();
        dispatcher.wait_idle().await;
    }

    #[tokio::test]
    async fn test_many_jobs_bounded_pool() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let dispatcher = dispatcher(store.clone(), 2);

        let mut ids = Vec::new();
        for i in 0..6 {
            let id = seed_jpeg(store.as_ref(), dir.path(), &format!("img{i}")).await;
            dispatcher.schedule(id).unwrap();
            ids.push(id);
        }
        dispatcher.wait_idle().await;

        for id in ids {
            assert!(store.get(id).await.unwrap().is_terminal());
        }
        assert_eq!(store.stats().await.unwrap().success, 6);
    }

    #[tokio::test]
    async fn test_panicking_run_is_marked_failed() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SuccessPanicStore {
            inner: MemoryStore::new(),
        });
        let worker = ProcessingWorker::new(
            store.clone(),
            Arc::new(ArtifactGenerator::new(&Config::default())),
            Arc::new(DisabledCaptioner),
        );
        let dispatcher = Dispatcher::new(Arc::new(worker), 1);

        let id = seed_jpeg(store.as_ref(), dir.path(), "a").await;
        dispatcher.schedule(id).unwrap();
        dispatcher.wait_idle().await;

        let record = store.get(id).await.unwrap();
        assert_eq!(record.status, ImageStatus::Failed);
        assert!(record.processing_time_ms.is_some());
        assert_eq!(
            record.error.as_deref(),
            Some("processing aborted: disk vanished")
        );
        assert_eq!(dispatcher.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_wait_idle_returns_when_nothing_scheduled() {
        let store = Arc::new(MemoryStore::new());
        dispatcher(store, 1).wait_idle().await;
    }
}
