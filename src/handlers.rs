use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::Json;
use std::sync::Arc;

use crate::error::{UploadError, UploadResult};
use crate::merge::merge_session;
use crate::models::{ChunkUploadResponse, CompleteResponse, ProgressAccepted, ProgressRequest};
use crate::progress::spawn_remote_transfer;
use crate::session::SessionKey;
use crate::state::AppState;
use crate::utils::sanitize_id;

async fn text_field(
    field: axum::extract::multipart::Field<'_>,
    name: &str,
) -> UploadResult<String> {
    field
        .text()
        .await
        .map_err(|e| UploadError::BadRequest(format!("Failed to read field {}: {}", name, e)))
}

fn require<T>(value: Option<T>, name: &str) -> UploadResult<T> {
    value.ok_or_else(|| UploadError::BadRequest(format!("Missing field {}", name)))
}

fn require_id(value: Option<String>, name: &str) -> UploadResult<String> {
    let id = sanitize_id(&require(value, name)?);
    if id.is_empty() {
        return Err(UploadError::BadRequest(format!("Invalid {}", name)));
    }
    Ok(id)
}

/// store one chunk of an upload session
pub async fn upload_chunk(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ChunkUploadResponse>, UploadError> {
    let mut lesson_id: Option<String> = None;
    let mut file_id: Option<String> = None;
    let mut chunk_index: Option<u32> = None;
    let mut total_chunks: Option<u32> = None;
    let mut chunk: Option<axum::body::Bytes> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        UploadError::BadRequest(format!("Failed to read multipart field: {}", e))
    })? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "lessonId" => lesson_id = Some(text_field(field, "lessonId").await?),
            "fileId" => file_id = Some(text_field(field, "fileId").await?),
            "chunkIndex" => {
                let raw = text_field(field, "chunkIndex").await?;
                chunk_index = Some(raw.parse().map_err(|_| {
                    UploadError::BadRequest(format!("Invalid chunkIndex: {}", raw))
                })?);
            }
            "totalChunks" => {
                let raw = text_field(field, "totalChunks").await?;
                total_chunks = Some(raw.parse().map_err(|_| {
                    UploadError::BadRequest(format!("Invalid totalChunks: {}", raw))
                })?);
            }
            "chunk" => {
                chunk = Some(field.bytes().await.map_err(|e| {
                    UploadError::BadRequest(format!("Failed to read chunk data: {}", e))
                })?);
            }
            other => tracing::trace!("Ignoring unexpected field: {}", other),
        }
    }

    let lesson_id = require_id(lesson_id, "lessonId")?;
    let file_id = require_id(file_id, "fileId")?;
    let chunk_index = require(chunk_index, "chunkIndex")?;
    let total_chunks = require(total_chunks, "totalChunks")?;
    let chunk = require(chunk, "chunk")?;

    if total_chunks == 0 {
        return Err(UploadError::BadRequest("totalChunks must be > 0".to_string()));
    }
    if chunk_index >= total_chunks {
        return Err(UploadError::BadRequest(format!(
            "chunkIndex {} out of range for {} chunks",
            chunk_index, total_chunks
        )));
    }

    let key = SessionKey::new(lesson_id, file_id);

    // serialize against a racing complete call for the same session
    let lock = state.sessions.lock_for(&key);
    let _guard = lock.lock().await;

    state
        .store
        .put(&key.lesson_id, &key.file_id, chunk_index, &chunk)
        .await?;
    state.sessions.declare(&key, total_chunks);
    let received = state.store.count(&key.lesson_id, &key.file_id).await?;

    tracing::debug!(
        "📦 Received chunk {}/{} for session {}",
        chunk_index + 1,
        total_chunks,
        key
    );

    Ok(Json(ChunkUploadResponse {
        success: true,
        chunk_index,
        received_chunks: received,
        total_chunks,
    }))
}

/// merge a completed session's chunks into the final artifact
pub async fn upload_complete(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<CompleteResponse>, UploadError> {
    let mut lesson_id: Option<String> = None;
    let mut file_id: Option<String> = None;
    let mut file_type: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        UploadError::BadRequest(format!("Failed to read multipart field: {}", e))
    })? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "lessonId" => lesson_id = Some(text_field(field, "lessonId").await?),
            "fileId" => file_id = Some(text_field(field, "fileId").await?),
            "fileType" => file_type = Some(text_field(field, "fileType").await?),
            other => tracing::trace!("Ignoring unexpected field: {}", other),
        }
    }

    let lesson_id = require_id(lesson_id, "lessonId")?;
    let file_id = require_id(file_id, "fileId")?;
    let file_type = require(file_type, "fileType")?;

    if !state.store.root().exists() {
        return Err(UploadError::StorageUnavailable(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "storage root missing",
        )));
    }

    let key = SessionKey::new(lesson_id, file_id);
    tracing::debug!("Completing upload session {}", key);

    // hold the session lock across check + merge + purge so a late chunk
    // write can never slip in between
    let lock = state.sessions.lock_for(&key);
    let _guard = lock.lock().await;

    let stored = state.store.count(&key.lesson_id, &key.file_id).await?;
    if stored == 0 {
        return Err(UploadError::SessionNotFound {
            lesson_id: key.lesson_id,
            file_id: key.file_id,
        });
    }

    let declared = state.sessions.declared_total(&key).ok_or_else(|| {
        UploadError::SessionNotFound {
            lesson_id: key.lesson_id.clone(),
            file_id: key.file_id.clone(),
        }
    })?;
    if !state.sessions.is_complete(&key, stored) {
        return Err(UploadError::SessionIncomplete { stored, declared });
    }

    let artifact = merge_session(&state.store, &key.lesson_id, &key.file_id, &file_type).await?;

    // merge verified successful, the chunks have served their purpose
    state.store.purge(&key.lesson_id, &key.file_id).await?;
    state.sessions.remove(&key);

    Ok(Json(CompleteResponse {
        success: true,
        artifact: artifact.file_name,
        size: artifact.size,
    }))
}

/// kick off the simulated remote-transfer progress stream
///
/// returns immediately; the stream runs as a detached task and is a no-op
/// when no channel is bound for the file id
pub async fn trigger_progress(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ProgressRequest>,
) -> (StatusCode, Json<ProgressAccepted>) {
    let file_id = sanitize_id(&payload.file_id);
    tracing::debug!("Remote-transfer stream requested for {}", file_id);

    spawn_remote_transfer(state.progress.clone(), file_id.clone(), state.broadcast);

    (
        StatusCode::ACCEPTED,
        Json(ProgressAccepted {
            accepted: true,
            file_id,
        }),
    )
}

/// health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "chunkbox",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
