//! Image processing pipeline components.
//!
//! - **decode**: Load and decode uploaded bytes
//! - **metadata**: Extract EXIF metadata
//! - **thumbnail**: Bounded-box JPEG thumbnails
//! - **artifacts**: Normalize the original and write its derived files
//! - **worker**: Drive one record to its terminal state
//! - **dispatch**: Bounded background scheduling of workers

pub mod artifacts;
pub mod decode;
pub mod dispatch;
pub mod metadata;
pub mod thumbnail;
pub mod worker;

pub use artifacts::{ArtifactGenerator, Artifacts, GeneratedArtifacts, NORMALIZED_FORMAT};
pub use decode::{DecodedImage, ImageDecoder};
pub use dispatch::Dispatcher;
pub use metadata::MetadataExtractor;
pub use thumbnail::ThumbnailGenerator;
pub use worker::ProcessingWorker;
