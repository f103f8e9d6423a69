//! Error types for the Prism image processing service.
//!
//! Errors are organized by layer (config, pipeline, store, intake, query) so
//! each boundary can decide what to surface and what to degrade.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::ImageId;

/// Top-level error type for Prism operations.
#[derive(Error, Debug)]
pub enum PrismError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Record store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Upload intake errors
    #[error("Intake error: {0}")]
    Intake(#[from] IntakeError),

    /// Query errors
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Artifact generation and captioning errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Image decoding failed
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Re-encoding the original or a thumbnail failed
    #[error("Encode error for {path}: {message}")]
    Encode { path: PathBuf, message: String },

    /// Reading or writing an artifact failed
    #[error("IO error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Image dimensions exceed limit
    #[error("Image too large: {path} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Unsupported image format
    #[error("Unsupported format for {path}: {format}")]
    UnsupportedFormat { path: PathBuf, format: String },

    /// Caption provider failed
    #[error("{message}")]
    Caption {
        message: String,
        status_code: Option<u16>,
    },

    /// Blocking task panicked or was cancelled
    #[error("Task join error: {0}")]
    Join(String),
}

/// Record store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A record with this id already exists
    #[error("Duplicate image id: {0}")]
    DuplicateId(ImageId),

    /// No record with this id
    #[error("Image not found: {0}")]
    NotFound(ImageId),

    /// The backing database failed
    #[error("Store backend error: {0}")]
    Backend(String),

    /// A stored column could not be converted back into a record
    #[error("Corrupt record {id}: {message}")]
    Corrupt { id: String, message: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Errors raised while accepting an upload. None of these leave a record behind.
#[derive(Error, Debug)]
pub enum IntakeError {
    /// Declared content type is not an accepted raster type
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Upload carried no bytes
    #[error("Upload is empty")]
    EmptyUpload,

    /// Upload exceeds the configured size limit
    #[error("Upload too large: {size_mb}MB > {max_mb}MB")]
    TooLarge { size_mb: u64, max_mb: u64 },

    /// Failed to persist the uploaded bytes
    #[error("Failed to store upload at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Record creation failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The worker could not be scheduled
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Scheduling errors from the dispatcher.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DispatchError {
    /// A worker for this id is already queued or running
    #[error("Image {0} is already scheduled")]
    AlreadyScheduled(ImageId),
}

/// Read-side errors.
#[derive(Error, Debug)]
pub enum QueryError {
    /// No record with this id
    #[error("Image not found: {0}")]
    NotFound(ImageId),

    /// Record exists but the requested artifact is not available
    #[error("Thumbnail not ready for {id} ({size})")]
    NotReady { id: ImageId, size: &'static str },

    /// Reading an artifact from disk failed
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The store failed for a reason other than a missing record
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for QueryError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => QueryError::NotFound(id),
            other => QueryError::Store(other),
        }
    }
}

/// Convenience type alias for Prism results.
pub type Result<T> = std::result::Result<T, PrismError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Convenience type alias for store results.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_maps_to_query_not_found() {
        let id = ImageId::new();
        let err: QueryError = StoreError::NotFound(id).into();
        assert!(matches!(err, QueryError::NotFound(found) if found == id));
    }

    #[test]
    fn test_store_backend_maps_to_query_store() {
        let err: QueryError = StoreError::Backend("disk full".into()).into();
        assert!(matches!(err, QueryError::Store(_)));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_caption_error_displays_message_only() {
        let err = PipelineError::Caption {
            message: "Ollama HTTP 500: boom".to_string(),
            status_code: Some(500),
        };
        assert_eq!(err.to_string(), "Ollama HTTP 500: boom");
    }
}
