use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::models::ErrorResponse;

/// errors surfaced by the chunk upload pipeline
#[derive(Debug, Error)]
pub enum UploadError {
    /// chunk storage cannot be created or written
    #[error("chunk storage unavailable: {0}")]
    StorageUnavailable(#[source] std::io::Error),

    /// complete was called but no chunks exist for the session
    #[error("no upload session found for lesson {lesson_id} file {file_id}")]
    SessionNotFound { lesson_id: String, file_id: String },

    /// stored chunk count does not match the declared total
    #[error("session incomplete: {stored}/{declared} chunks stored")]
    SessionIncomplete { stored: usize, declared: u32 },

    /// declared content type resolves to no known extension
    #[error("unsupported content type: {0}")]
    UnsupportedType(String),

    /// a stored chunk could not be read back during merge
    #[error("failed to read chunk {index} during merge: {source}")]
    ChunkReadFailure {
        index: u32,
        #[source]
        source: std::io::Error,
    },

    /// the merged artifact could not be written
    #[error("merge failed: {0}")]
    MergeFailed(#[source] std::io::Error),

    /// malformed or missing request fields
    #[error("{0}")]
    BadRequest(String),
}

impl UploadError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            UploadError::StorageUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            UploadError::SessionNotFound { .. } => StatusCode::NOT_FOUND,
            UploadError::SessionIncomplete { .. } => StatusCode::CONFLICT,
            UploadError::UnsupportedType(_) => StatusCode::BAD_REQUEST,
            UploadError::ChunkReadFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            UploadError::MergeFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            UploadError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        } else {
            tracing::warn!("request rejected: {}", self);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

pub type UploadResult<T> = Result<T, UploadError>;
