//! Prism Core - asynchronous image ingestion and processing library.
//!
//! Prism accepts raster image uploads, answers immediately with an id, and
//! processes each image in the background: normalization to JPEG, EXIF
//! extraction, two thumbnails and a best-effort caption. Clients poll for
//! the terminal state.
//!
//! # Architecture
//!
//! ```text
//! Upload → Intake → Record (processing) → Dispatcher → Worker
//!        → Decode → EXIF → Normalize → Thumbnails → Caption → Record (success|failed)
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use prism_core::{Config, Prism, Upload};
//!
//! #[tokio::main]
//! async fn main() -> prism_core::Result<()> {
//!     let prism = Prism::new(Config::load()?)?;
//!
//!     let receipt = prism.submit(Upload {
//!         bytes: std::fs::read("photo.jpg")?,
//!         content_type: "image/jpeg".into(),
//!         original_name: "photo.jpg".into(),
//!     }).await?;
//!
//!     prism.wait_idle().await;
//!     println!("{:?}", prism.get(receipt.image_id).await?.status);
//!     Ok(())
//! }
//! ```

pub mod caption;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod service;
pub mod store;
pub mod types;

use std::sync::Arc;

pub use caption::{Captioner, CaptionerFactory, ImageInput};
pub use config::Config;
pub use error::{
    ConfigError, DispatchError, IntakeError, PipelineError, PipelineResult, PrismError,
    QueryError, Result, StoreError,
};
pub use pipeline::{ArtifactGenerator, Dispatcher, ProcessingWorker};
pub use service::{IntakeService, QueryService};
pub use store::{open_store, MemoryStore, RecordStore, SqliteStore};
pub use types::{
    ExifMap, ExifValue, ImageId, ImageRecord, ImageStatus, ImageSummary, Stats, ThumbnailLocators,
    ThumbnailSize, Upload, UploadReceipt,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prism service - the main entry point, wiring store, worker pool and
/// services from one configuration.
pub struct Prism {
    config: Config,
    store: Arc<dyn RecordStore>,
    dispatcher: Dispatcher,
    intake: IntakeService,
    query: QueryService,
}

impl Prism {
    /// Open the configured store and caption provider.
    pub fn new(config: Config) -> Result<Self> {
        tracing::debug!("Initializing Prism v{}", VERSION);
        let store = open_store(&config)?;
        let captioner = CaptionerFactory::create(&config.caption)?;
        tracing::info!(
            store = store.name(),
            captioner = captioner.name(),
            workers = config.processing.parallel_workers,
            "Prism ready"
        );
        Ok(Self::with_parts(config, store, captioner))
    }

    /// Build from an explicit store and captioner.
    pub fn with_parts(
        config: Config,
        store: Arc<dyn RecordStore>,
        captioner: Arc<dyn Captioner>,
    ) -> Self {
        let generator = Arc::new(ArtifactGenerator::new(&config));
        let worker = ProcessingWorker::new(Arc::clone(&store), generator, captioner);
        let dispatcher = Dispatcher::new(Arc::new(worker), config.processing.parallel_workers);
        let intake = IntakeService::new(&config, Arc::clone(&store), dispatcher.clone());
        let query = QueryService::new(Arc::clone(&store), config.server.resolved_base_url());

        Self {
            config,
            store,
            dispatcher,
            intake,
            query,
        }
    }

    /// Accept an upload; processing continues in the background.
    pub async fn submit(&self, upload: Upload) -> std::result::Result<UploadReceipt, IntakeError> {
        self.intake.submit(upload).await
    }

    pub async fn get(&self, id: ImageId) -> std::result::Result<ImageRecord, QueryError> {
        self.query.get(id).await
    }

    pub async fn list(&self) -> std::result::Result<Vec<ImageSummary>, QueryError> {
        self.query.list().await
    }

    pub async fn thumbnail(
        &self,
        id: ImageId,
        size: ThumbnailSize,
    ) -> std::result::Result<Vec<u8>, QueryError> {
        self.query.thumbnail(id, size).await
    }

    pub async fn stats(&self) -> std::result::Result<Stats, QueryError> {
        self.query.stats().await
    }

    /// Resolve once every scheduled worker has finished.
    pub async fn wait_idle(&self) {
        self.dispatcher.wait_idle().await
    }

    /// Workers queued or running.
    pub fn in_flight(&self) -> usize {
        self.dispatcher.in_flight_count()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }
}
