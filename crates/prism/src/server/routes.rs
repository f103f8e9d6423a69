//! Request handlers.

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use prism_core::{
    ExifMap, ImageId, ImageRecord, ImageStatus, ImageSummary, Stats,
    ThumbnailLocators, ThumbnailSize, Upload,
};
use serde::Serialize;

use super::response::{ApiError, Envelope};
use super::state::AppState;

/// Name of the multipart field carrying the image.
const FILE_FIELD: &str = "file";

/// Data block of an upload response.
#[derive(Debug, Serialize)]
pub struct UploadData {
    pub image_id: ImageId,
    pub original_name: String,
    pub processed_at: Option<DateTime<Utc>>,
    pub metadata: Option<ImageMetadata>,
    pub thumbnails: ThumbnailLocators,
}

/// Dimensions and encoding, present once an image is processed.
#[derive(Debug, Serialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: Option<String>,
    pub size_bytes: Option<u64>,
}

impl ImageMetadata {
    fn from_record(record: &ImageRecord) -> Option<Self> {
        match (record.width, record.height) {
            (Some(width), Some(height)) if width > 0 && height > 0 => Some(Self {
                width,
                height,
                format: record.format.clone(),
                size_bytes: record.size_bytes,
            }),
            _ => None,
        }
    }
}

/// Data block of a details response.
#[derive(Debug, Serialize)]
pub struct ImageDetails {
    pub image_id: ImageId,
    pub original_name: String,
    pub processed_at: Option<DateTime<Utc>>,
    pub status: ImageStatus,
    pub metadata: Option<ImageMetadata>,
    pub caption: Option<String>,
    pub exif: Option<ExifMap>,
    pub thumbnails: ThumbnailLocators,
}

/// POST /api/images - accept one multipart upload
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Envelope<UploadData>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let original_name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| "upload".to_string());
        let bytes = field.bytes().await.map_err(multipart_error)?;

        tracing::debug!(
            "Received upload {} ({}, {} bytes)",
            original_name,
            content_type,
            bytes.len()
        );

        let receipt = state
            .prism
            .submit(Upload {
                bytes: bytes.to_vec(),
                content_type,
                original_name,
            })
            .await?;

        return Ok(Envelope::queued(UploadData {
            image_id: receipt.image_id,
            original_name: receipt.original_name,
            processed_at: None,
            metadata: None,
            thumbnails: receipt.thumbnails,
        }));
    }

    Err(ApiError::BadRequest(format!(
        "Missing multipart field '{FILE_FIELD}'"
    )))
}

/// GET /api/images - every record, newest first
pub async fn list_images(
    State(state): State<AppState>,
) -> Result<Envelope<Vec<ImageSummary>>, ApiError> {
    let images = state.prism.list().await?;
    tracing::debug!("Listing {} images", images.len());
    Ok(Envelope::success(images))
}

/// GET /api/images/{id} - one record in detail
pub async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Envelope<ImageDetails>, ApiError> {
    let id = parse_id(&id)?;
    let record = state.prism.get(id).await?;
    let base_url = state.prism.config().server.resolved_base_url();

    let details = ImageDetails {
        image_id: record.id,
        metadata: ImageMetadata::from_record(&record),
        thumbnails: ThumbnailLocators::for_image(&base_url, record.id),
        original_name: record.original_name,
        processed_at: record.processed_at,
        status: record.status,
        caption: record.caption,
        exif: record.exif,
    };
    Ok(Envelope::with_error(details, record.error))
}

/// GET /api/images/{id}/thumbnails/{size} - JPEG thumbnail bytes
pub async fn get_thumbnail(
    State(state): State<AppState>,
    Path((id, size)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let size: ThumbnailSize = size
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Unknown thumbnail size: {size}")))?;

    let bytes = state.prism.thumbnail(id, size).await?;
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response())
}

/// GET /api/stats - aggregate counters
pub async fn get_stats(State(state): State<AppState>) -> Result<Envelope<Stats>, ApiError> {
    let stats = state.prism.stats().await?;
    tracing::debug!(
        total = stats.total,
        success = stats.success,
        failed = stats.failed,
        "Stats served"
    );
    Ok(Envelope::success(stats))
}

/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}

/// Ids that don't parse can't name a record.
fn parse_id(raw: &str) -> Result<ImageId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound(format!("Malformed image id: {raw}")))
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::BadRequest(format!("Invalid multipart body: {}", e.body_text()))
    }
}
