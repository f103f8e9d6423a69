//! JSON envelope and error-to-status mapping.
//!
//! Every JSON response has the shape `{status, data, error}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use prism_core::{IntakeError, QueryError};
use serde::Serialize;
use thiserror::Error;

/// Response envelope shared by all JSON endpoints.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success",
            data: Some(data),
            error: None,
        }
    }

    pub fn queued(data: T) -> Self {
        Self {
            status: "queued",
            data: Some(data),
            error: None,
        }
    }

    /// Success envelope that still reports a record-level error (a failed image).
    pub fn with_error(data: T, error: Option<String>) -> Self {
        Self {
            status: "success",
            data: Some(data),
            error,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Errors a handler can return.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Intake(e) => match e {
                IntakeError::UnsupportedMediaType(_) | IntakeError::EmptyUpload => {
                    StatusCode::BAD_REQUEST
                }
                IntakeError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                IntakeError::Io { .. } | IntakeError::Store(_) | IntakeError::Dispatch(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Query(e) => match e {
                QueryError::NotFound(_) => StatusCode::NOT_FOUND,
                QueryError::NotReady { .. } => StatusCode::CONFLICT,
                QueryError::Io { .. } | QueryError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn client_message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) | ApiError::PayloadTooLarge(msg) => msg.clone(),
            ApiError::NotFound(_) => "Image not found".to_string(),
            ApiError::Intake(IntakeError::UnsupportedMediaType(_)) => {
                "Unsupported file type. Use JPG or PNG.".to_string()
            }
            ApiError::Intake(IntakeError::Store(_))
            | ApiError::Intake(IntakeError::Io { .. })
            | ApiError::Query(QueryError::Store(_))
            | ApiError::Query(QueryError::Io { .. }) => "Internal server error".to_string(),
            ApiError::Intake(e) => e.to_string(),
            ApiError::Query(QueryError::NotFound(_)) => "Image not found".to_string(),
            ApiError::Query(QueryError::NotReady { .. }) => {
                "Thumbnail not ready or missing".to_string()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {self}");
        } else {
            tracing::warn!("Request rejected ({status}): {self}");
        }

        let body = Envelope::<()> {
            status: "error",
            data: None,
            error: Some(self.client_message()),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::{ImageId, StoreError};

    #[test]
    fn test_status_mapping() {
        let id = ImageId::new();
        let cases = [
            (
                ApiError::from(IntakeError::UnsupportedMediaType("application/pdf".into())),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::from(IntakeError::EmptyUpload), StatusCode::BAD_REQUEST),
            (
                ApiError::from(IntakeError::TooLarge {
                    size_mb: 60,
                    max_mb: 50,
                }),
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (ApiError::from(QueryError::NotFound(id)), StatusCode::NOT_FOUND),
            (
                ApiError::from(QueryError::NotReady { id, size: "small" }),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::from(QueryError::Store(StoreError::Backend("locked".into()))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status_code(), expected, "{err:?}");
        }
    }

    #[test]
    fn test_backend_details_are_not_leaked() {
        let err = ApiError::from(QueryError::Store(StoreError::Backend(
            "database is locked at /secret/path".into(),
        )));
        assert_eq!(err.client_message(), "Internal server error");
    }

    #[test]
    fn test_display_forwards_inner_errors() {
        let id = ImageId::new();
        let inner = QueryError::NotFound(id);
        assert_eq!(ApiError::from(inner).to_string(), QueryError::NotFound(id).to_string());
        assert_eq!(
            ApiError::from(IntakeError::EmptyUpload).to_string(),
            IntakeError::EmptyUpload.to_string()
        );
        assert_eq!(
            ApiError::NotFound("bad id".into()).to_string(),
            "Not found: bad id"
        );
    }
}
