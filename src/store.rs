use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{UploadError, UploadResult};

/// on-disk chunk store
///
/// in-flight chunks live at `root/{lesson_id}/{file_id}/{chunk_index}` with
/// the bare numeric index as the file name; the index is the sole
/// reassembly key, chunks carry no framing of their own
#[derive(Debug, Clone)]
pub struct ChunkStore {
    root: PathBuf,
}

impl ChunkStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// directory holding one lesson's merged artifacts and session dirs
    pub fn lesson_dir(&self, lesson_id: &str) -> PathBuf {
        self.root.join(lesson_id)
    }

    /// directory holding one session's in-flight chunks
    pub fn session_dir(&self, lesson_id: &str, file_id: &str) -> PathBuf {
        self.root.join(lesson_id).join(file_id)
    }

    /// write (or overwrite) a chunk
    ///
    /// chunk index 0 marks the start of a new attempt: any chunks already
    /// stored for this session are purged first so nothing stale survives
    /// a restarted upload
    pub async fn put(
        &self,
        lesson_id: &str,
        file_id: &str,
        index: u32,
        bytes: &[u8],
    ) -> UploadResult<()> {
        let dir = self.session_dir(lesson_id, file_id);

        if index == 0 && dir.exists() {
            tracing::debug!("Chunk 0 for existing session, discarding previous attempt");
            fs::remove_dir_all(&dir)
                .await
                .map_err(UploadError::StorageUnavailable)?;
        }

        fs::create_dir_all(&dir)
            .await
            .map_err(UploadError::StorageUnavailable)?;

        let chunk_path = dir.join(index.to_string());
        let mut file = fs::File::create(&chunk_path)
            .await
            .map_err(UploadError::StorageUnavailable)?;
        file.write_all(bytes)
            .await
            .map_err(UploadError::StorageUnavailable)?;
        file.sync_all()
            .await
            .map_err(UploadError::StorageUnavailable)?;

        tracing::trace!("Stored chunk {} at {:?} ({} bytes)", index, chunk_path, bytes.len());
        Ok(())
    }

    /// stored chunks for a session, ordered by index ascending
    ///
    /// the sort is numeric, never lexicographic: chunk 2 comes before
    /// chunk 10. entries that don't parse as an index are ignored.
    pub async fn list(&self, lesson_id: &str, file_id: &str) -> UploadResult<Vec<(u32, PathBuf)>> {
        let dir = self.session_dir(lesson_id, file_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut chunks = Vec::new();
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(UploadError::StorageUnavailable)?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(UploadError::StorageUnavailable)?
        {
            let name = entry.file_name();
            if let Some(index) = name.to_str().and_then(|n| n.parse::<u32>().ok()) {
                chunks.push((index, entry.path()));
            }
        }

        chunks.sort_unstable_by_key(|(index, _)| *index);
        Ok(chunks)
    }

    /// number of chunks currently stored for a session
    pub async fn count(&self, lesson_id: &str, file_id: &str) -> UploadResult<usize> {
        Ok(self.list(lesson_id, file_id).await?.len())
    }

    /// remove all chunks for a session; absent sessions are not an error
    pub async fn purge(&self, lesson_id: &str, file_id: &str) -> UploadResult<()> {
        let dir = self.session_dir(lesson_id, file_id);
        if !dir.exists() {
            return Ok(());
        }
        fs::remove_dir_all(&dir)
            .await
            .map_err(UploadError::StorageUnavailable)?;
        tracing::debug!("Purged chunk storage for {}/{}", lesson_id, file_id);
        Ok(())
    }
}
