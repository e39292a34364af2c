use std::path::PathBuf;

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{UploadError, UploadResult};
use crate::store::ChunkStore;

/// known extension ↔ media type mappings, in scan order
///
/// entries whose media type does not end with the bare suffix (`.txt`,
/// `.mov`, `.qt`, `.avi`, `.mkv`, `.mp3`) can never pass the suffix
/// confirmation in `resolve_extension`; they are kept so the table stays
/// a complete inventory of the types the uploader is expected to see
const EXTENSION_MAP: &[(&str, &str)] = &[
    (".mp4", "video/mp4"),
    (".webm", "video/webm"),
    (".ogv", "video/ogg"),
    (".ogg", "video/ogg"),
    (".qt", "video/quicktime"),
    (".mov", "video/quicktime"),
    (".avi", "video/x-msvideo"),
    (".mkv", "video/x-matroska"),
    (".mp3", "audio/mpeg"),
    (".wav", "audio/wav"),
    (".png", "image/png"),
    (".jpeg", "image/jpeg"),
    (".jpg", "image/jpeg"),
    (".gif", "image/gif"),
    (".pdf", "application/pdf"),
    (".json", "application/json"),
    (".txt", "text/plain"),
    (".zip", "application/zip"),
];

/// resolve the artifact extension for a declared content type
///
/// an entry qualifies when its media type matches case-insensitively AND
/// the declared string ends with the extension's bare suffix (also
/// case-insensitively), so `video/mp4` yields `.mp4` while an
/// unregistered type, or one like `text/plain` whose subtype is not the
/// extension, yields nothing
pub fn resolve_extension(content_type: &str) -> Option<&'static str> {
    let lowered = content_type.to_ascii_lowercase();
    EXTENSION_MAP
        .iter()
        .filter(|(_, media)| media.eq_ignore_ascii_case(content_type))
        .map(|(ext, _)| *ext)
        .find(|ext| lowered.ends_with(ext.trim_start_matches('.')))
}

/// a successfully merged artifact
#[derive(Debug, Clone)]
pub struct MergedArtifact {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
}

/// merged artifact path, keyed by lesson AND file id
///
/// the artifact lands in the lesson directory rather than the session
/// chunk directory so purging the session afterwards cannot take the
/// artifact with it
pub fn artifact_name(file_id: &str, extension: &str) -> String {
    format!("Merged-{}{}", file_id, extension)
}

/// concatenate a session's chunks, in ascending index order, into one
/// artifact
///
/// the output goes through a dot-prefixed temp file that is fsynced and
/// renamed into place only when every chunk was appended, so readers never
/// observe a partial artifact. the first chunk that fails to read or
/// append aborts the whole merge and removes the temp file.
pub async fn merge_session(
    store: &ChunkStore,
    lesson_id: &str,
    file_id: &str,
    content_type: &str,
) -> UploadResult<MergedArtifact> {
    let extension = resolve_extension(content_type)
        .ok_or_else(|| UploadError::UnsupportedType(content_type.to_string()))?;

    let chunks = store.list(lesson_id, file_id).await?;
    if chunks.is_empty() {
        return Err(UploadError::SessionNotFound {
            lesson_id: lesson_id.to_string(),
            file_id: file_id.to_string(),
        });
    }

    let file_name = artifact_name(file_id, extension);
    let lesson_dir = store.lesson_dir(lesson_id);
    let final_path = lesson_dir.join(&file_name);
    let tmp_path = lesson_dir.join(format!(".{}.tmp", file_name));

    tracing::debug!(
        "Merging {} chunks for {}/{} into {:?}",
        chunks.len(),
        lesson_id,
        file_id,
        final_path
    );

    let mut output = fs::File::create(&tmp_path)
        .await
        .map_err(UploadError::StorageUnavailable)?;

    for (index, chunk_path) in &chunks {
        let bytes = match fs::read(chunk_path).await {
            Ok(bytes) => bytes,
            Err(source) => {
                abort_merge(&tmp_path).await;
                return Err(UploadError::ChunkReadFailure {
                    index: *index,
                    source,
                });
            }
        };

        if let Err(source) = output.write_all(&bytes).await {
            abort_merge(&tmp_path).await;
            return Err(UploadError::MergeFailed(source));
        }

        tracing::trace!("Appended chunk {} ({} bytes)", index, bytes.len());
    }

    if let Err(source) = output.sync_all().await {
        abort_merge(&tmp_path).await;
        return Err(UploadError::MergeFailed(source));
    }
    drop(output);

    if let Err(source) = fs::rename(&tmp_path, &final_path).await {
        abort_merge(&tmp_path).await;
        return Err(UploadError::MergeFailed(source));
    }

    let size = fs::metadata(&final_path)
        .await
        .map(|m| m.len())
        .map_err(UploadError::MergeFailed)?;

    tracing::info!("✅ Merged {}/{} into {} ({} bytes)", lesson_id, file_id, file_name, size);

    Ok(MergedArtifact {
        path: final_path,
        file_name,
        size,
    })
}

// best-effort temp file cleanup; the merge error itself is what matters
async fn abort_merge(tmp_path: &std::path::Path) {
    if let Err(e) = fs::remove_file(tmp_path).await {
        tracing::warn!("Failed to remove merge temp file {:?}: {}", tmp_path, e);
    }
}
