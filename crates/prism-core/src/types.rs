//! Core data types for the Prism processing service.
//!
//! `ImageRecord` is the durable state of one upload as it moves through the
//! `processing -> success | failed` lifecycle. Writes to it go through the
//! typed `RecordPatch` so a terminal update always carries a complete field set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

use crate::pipeline::Artifacts;

/// Opaque unique identifier of an uploaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(Uuid);

impl ImageId {
    /// Allocate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ImageId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ImageId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ImageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Processing status of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    Processing,
    Success,
    Failed,
}

impl ImageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    /// `success` and `failed` are terminal; nothing mutates a record after them.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }
}

impl fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(Self::Processing),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

/// A single EXIF value: numeric tags stay numbers, everything else is text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExifValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for ExifValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for ExifValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for ExifValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for ExifValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

/// EXIF tags keyed by tag name. Ordered so serialized output is stable.
pub type ExifMap = BTreeMap<String, ExifValue>;

/// Thumbnail variants produced for every successfully processed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailSize {
    Small,
    Medium,
}

impl ThumbnailSize {
    pub const ALL: [ThumbnailSize; 2] = [ThumbnailSize::Small, ThumbnailSize::Medium];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
        }
    }

    /// File name of this variant inside the image's storage directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Small => "thumb_small.jpg",
            Self::Medium => "thumb_medium.jpg",
        }
    }
}

impl fmt::Display for ThumbnailSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThumbnailSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            other => Err(format!("unknown thumbnail size: {other}")),
        }
    }
}

/// The durable state of one uploaded image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    // === Set at creation ===
    pub id: ImageId,

    /// Filename as supplied by the client
    pub original_name: String,

    /// Declared content type (advisory only)
    pub content_type: String,

    /// Where the uploaded (later normalized) bytes live
    pub stored_path: PathBuf,

    pub created_at: DateTime<Utc>,

    // === Lifecycle ===
    pub status: ImageStatus,

    /// Failure message, only set when `status == failed`
    pub error: Option<String>,

    /// Worker start to terminal write, set on every terminal transition
    pub processing_time_ms: Option<u64>,

    // === Derived on success ===
    /// Byte size of the normalized original
    pub size_bytes: Option<u64>,

    pub width: Option<u32>,

    pub height: Option<u32>,

    /// Format label of the normalized original ("jpg")
    pub format: Option<String>,

    /// Omitted when the source carried no readable EXIF
    pub exif: Option<ExifMap>,

    pub caption: Option<String>,

    pub thumb_small_path: Option<PathBuf>,

    pub thumb_medium_path: Option<PathBuf>,

    pub processed_at: Option<DateTime<Utc>>,
}

impl ImageRecord {
    /// Build the initial `processing` record for a fresh upload.
    pub fn new(
        id: ImageId,
        original_name: impl Into<String>,
        content_type: impl Into<String>,
        stored_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id,
            original_name: original_name.into(),
            content_type: content_type.into(),
            stored_path: stored_path.into(),
            created_at: Utc::now(),
            status: ImageStatus::Processing,
            error: None,
            processing_time_ms: None,
            size_bytes: None,
            width: None,
            height: None,
            format: None,
            exif: None,
            caption: None,
            thumb_small_path: None,
            thumb_medium_path: None,
            processed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn thumbnail_path(&self, size: ThumbnailSize) -> Option<&Path> {
        match size {
            ThumbnailSize::Small => self.thumb_small_path.as_deref(),
            ThumbnailSize::Medium => self.thumb_medium_path.as_deref(),
        }
    }

    /// Merge a patch into this record. Fields the patch leaves as `None`
    /// are untouched.
    pub fn apply(&mut self, patch: RecordPatch) {
        let RecordPatch {
            status,
            error,
            processing_time_ms,
            size_bytes,
            width,
            height,
            format,
            exif,
            caption,
            thumb_small_path,
            thumb_medium_path,
            processed_at,
        } = patch;

        if let Some(v) = status {
            self.status = v;
        }
        if error.is_some() {
            self.error = error;
        }
        if processing_time_ms.is_some() {
            self.processing_time_ms = processing_time_ms;
        }
        if size_bytes.is_some() {
            self.size_bytes = size_bytes;
        }
        if width.is_some() {
            self.width = width;
        }
        if height.is_some() {
            self.height = height;
        }
        if format.is_some() {
            self.format = format;
        }
        if exif.is_some() {
            self.exif = exif;
        }
        if caption.is_some() {
            self.caption = caption;
        }
        if thumb_small_path.is_some() {
            self.thumb_small_path = thumb_small_path;
        }
        if thumb_medium_path.is_some() {
            self.thumb_medium_path = thumb_medium_path;
        }
        if processed_at.is_some() {
            self.processed_at = processed_at;
        }
    }
}

/// A typed partial update of an `ImageRecord`.
///
/// Terminal writes are built with [`RecordPatch::success`] or
/// [`RecordPatch::failure`], which set the whole field group for their outcome.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub status: Option<ImageStatus>,
    pub error: Option<String>,
    pub processing_time_ms: Option<u64>,
    pub size_bytes: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<String>,
    pub exif: Option<ExifMap>,
    pub caption: Option<String>,
    pub thumb_small_path: Option<PathBuf>,
    pub thumb_medium_path: Option<PathBuf>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl RecordPatch {
    /// Terminal success write. An empty EXIF map is stored as absent.
    pub fn success(artifacts: Artifacts, caption: String, processing_time_ms: u64) -> Self {
        let exif = artifacts.exif.filter(|map| !map.is_empty());
        Self {
            status: Some(ImageStatus::Success),
            error: None,
            processing_time_ms: Some(processing_time_ms),
            size_bytes: Some(artifacts.size_bytes),
            width: Some(artifacts.width),
            height: Some(artifacts.height),
            format: Some(artifacts.format),
            exif,
            caption: Some(caption),
            thumb_small_path: Some(artifacts.small_path),
            thumb_medium_path: Some(artifacts.medium_path),
            processed_at: Some(Utc::now()),
        }
    }

    /// Terminal failure write. Derived fields stay null.
    pub fn failure(error: impl Into<String>, processing_time_ms: u64) -> Self {
        Self {
            status: Some(ImageStatus::Failed),
            error: Some(error.into()),
            processing_time_ms: Some(processing_time_ms),
            ..Self::default()
        }
    }
}

/// URLs under which a client can fetch an image's thumbnails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailLocators {
    pub small: String,
    pub medium: String,
}

impl ThumbnailLocators {
    pub fn for_image(base_url: &str, id: ImageId) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            small: format!("{base}/api/images/{id}/thumbnails/small"),
            medium: format!("{base}/api/images/{id}/thumbnails/medium"),
        }
    }
}

/// List view of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSummary {
    pub image_id: ImageId,
    pub original_name: String,
    pub status: ImageStatus,
    pub processed_at: Option<DateTime<Utc>>,
    pub thumbnails: ThumbnailLocators,
}

/// Raw upload handed to the intake service.
#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub original_name: String,
}

/// What intake returns once the record exists and the worker is scheduled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub image_id: ImageId,
    pub original_name: String,
    pub thumbnails: ThumbnailLocators,
}

/// Aggregate counters over every record in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Stats {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub processing: u64,
    pub success_rate: f64,
    pub failure_rate: f64,
    /// Mean over success records only; `None` when there are none
    pub avg_processing_time_ms: Option<f64>,
}

impl Stats {
    /// Derive rates from raw counts. Rates are 0.0 on an empty store.
    pub fn from_counts(total: u64, success: u64, failed: u64, avg: Option<f64>) -> Self {
        let (success_rate, failure_rate) = if total == 0 {
            (0.0, 0.0)
        } else {
            (success as f64 / total as f64, failed as f64 / total as f64)
        };
        Self {
            total,
            success,
            failed,
            processing: total.saturating_sub(success + failed),
            success_rate,
            failure_rate,
            avg_processing_time_ms: avg,
        }
    }

    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ImageRecord>) -> Self {
        let mut total = 0u64;
        let mut success = 0u64;
        let mut failed = 0u64;
        let mut time_sum = 0u64;
        let mut timed = 0u64;

        for record in records {
            total += 1;
            match record.status {
                ImageStatus::Success => {
                    success += 1;
                    if let Some(ms) = record.processing_time_ms {
                        time_sum += ms;
                        timed += 1;
                    }
                }
                ImageStatus::Failed => failed += 1,
                ImageStatus::Processing => {}
            }
        }

        let avg = (timed > 0).then(|| time_sum as f64 / timed as f64);
        Self::from_counts(total, success, failed, avg)
    }
}
