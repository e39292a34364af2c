use std::ops::Range;
use std::path::Path;

use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use thiserror::Error;

use crate::progress::ProgressEvent;

/// client-side upload failures, tagged by phase
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("source file is empty, nothing to upload")]
    EmptySource,
    #[error("server rejected chunk {index} with status {status}")]
    ChunkRejected { index: u32, status: u16 },
    #[error("server rejected completion with status {status}")]
    CompletionRejected { status: u16 },
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to read source file: {0}")]
    Io(#[from] std::io::Error),
}

/// which phase an upload attempt failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedPhase {
    Chunk,
    Completion,
}

/// client-observed upload state machine
///
/// `Done` and `Failed` are terminal per attempt; `Failed` is reachable
/// from every non-terminal state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadPhase {
    Idle,
    Chunking,
    Uploading { sent: u32, total: u32, percent: u8 },
    Merging,
    AwaitingRemoteTransfer,
    RemoteProgress(u8),
    Done,
    Failed(FailedPhase),
}

impl UploadPhase {
    /// map an event from the progress channel onto the state machine
    pub fn from_remote_event(event: &ProgressEvent) -> UploadPhase {
        match event {
            ProgressEvent::Progress(msg) if msg == "Initialising" => {
                UploadPhase::AwaitingRemoteTransfer
            }
            ProgressEvent::Progress(msg) => msg
                .strip_suffix(" %")
                .and_then(|p| p.parse().ok())
                .map(UploadPhase::RemoteProgress)
                .unwrap_or(UploadPhase::AwaitingRemoteTransfer),
            ProgressEvent::Complete => UploadPhase::Done,
        }
    }
}

/// per-chunk retry policy; abort is the default and means the first
/// failure cancels the remaining sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    #[default]
    Abort,
    /// retry each failed request up to this many extra times
    Limited(u32),
}

impl RetryPolicy {
    fn attempts(self) -> u32 {
        match self {
            RetryPolicy::Abort => 1,
            RetryPolicy::Limited(retries) => 1 + retries,
        }
    }
}

/// split a byte length into fixed-size ranges; the final range is the
/// remainder
pub fn chunk_ranges(total_len: u64, chunk_size: u64) -> Vec<Range<u64>> {
    assert!(chunk_size > 0, "chunk_size must be > 0");
    let mut ranges = Vec::new();
    let mut offset = 0;
    while offset < total_len {
        let end = (offset + chunk_size).min(total_len);
        ranges.push(offset..end);
        offset = end;
    }
    ranges
}

/// uploads a source file to the server in strictly sequential chunks
pub struct UploadClient {
    http: reqwest::Client,
    base_url: String,
    chunk_size: usize,
    retry: RetryPolicy,
}

impl UploadClient {
    pub fn new(base_url: impl Into<String>, chunk_size: usize) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            chunk_size,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// upload a file as sequential chunks, then issue the complete call
    ///
    /// each chunk waits for the previous acknowledgment before it is sent;
    /// there is no pipelining. `on_phase` observes the state machine as
    /// the upload advances, including the rounded completion percentage
    /// after each acknowledgment.
    pub async fn upload(
        &self,
        lesson_id: &str,
        file_id: &str,
        source: &Path,
        content_type: &str,
        mut on_phase: impl FnMut(UploadPhase),
    ) -> Result<(), ClientError> {
        on_phase(UploadPhase::Chunking);

        let mut file = tokio::fs::File::open(source).await?;
        let total_len = file.metadata().await?.len();
        let ranges = chunk_ranges(total_len, self.chunk_size as u64);
        if ranges.is_empty() {
            on_phase(UploadPhase::Failed(FailedPhase::Chunk));
            return Err(ClientError::EmptySource);
        }

        let total = ranges.len() as u32;
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        tracing::debug!(
            "Uploading {:?} as {} chunk(s) of up to {} bytes",
            source,
            total,
            self.chunk_size
        );

        for (index, range) in ranges.iter().enumerate() {
            let index = index as u32;

            file.seek(SeekFrom::Start(range.start)).await?;
            let mut bytes = vec![0u8; (range.end - range.start) as usize];
            file.read_exact(&mut bytes).await?;

            if let Err(e) = self
                .send_chunk(lesson_id, file_id, index, total, &file_name, &bytes)
                .await
            {
                on_phase(UploadPhase::Failed(FailedPhase::Chunk));
                return Err(e);
            }

            let sent = index + 1;
            let percent = ((sent as f64 / total as f64) * 100.0).round() as u8;
            on_phase(UploadPhase::Uploading {
                sent,
                total,
                percent,
            });
        }

        on_phase(UploadPhase::Merging);
        if let Err(e) = self
            .send_complete(lesson_id, file_id, content_type)
            .await
        {
            on_phase(UploadPhase::Failed(FailedPhase::Completion));
            return Err(e);
        }

        Ok(())
    }

    /// ask the server to start the remote-transfer progress stream
    pub async fn trigger_remote_transfer(
        &self,
        file_id: &str,
        mut on_phase: impl FnMut(UploadPhase),
    ) -> Result<(), ClientError> {
        let response = self
            .http
            .post(format!("{}/api/fileupload/progress", self.base_url))
            .json(&serde_json::json!({ "fileId": file_id }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::CompletionRejected {
                status: response.status().as_u16(),
            });
        }

        on_phase(UploadPhase::AwaitingRemoteTransfer);
        Ok(())
    }

    async fn send_chunk(
        &self,
        lesson_id: &str,
        file_id: &str,
        index: u32,
        total: u32,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<(), ClientError> {
        let attempts = self.retry.attempts();
        let mut last_status = 0u16;

        for attempt in 1..=attempts {
            let part = reqwest::multipart::Part::bytes(bytes.to_vec())
                .file_name(file_name.to_string());
            let form = reqwest::multipart::Form::new()
                .text("lessonId", lesson_id.to_string())
                .text("fileId", file_id.to_string())
                .text("chunkIndex", index.to_string())
                .text("totalChunks", total.to_string())
                .part("chunk", part);

            let result = self
                .http
                .post(format!("{}/api/fileupload/chunk", self.base_url))
                .multipart(form)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => {
                    last_status = response.status().as_u16();
                    tracing::warn!(
                        "Chunk {} rejected with status {} (attempt {}/{})",
                        index,
                        last_status,
                        attempt,
                        attempts
                    );
                }
                Err(e) => {
                    if attempt == attempts {
                        return Err(ClientError::Http(e));
                    }
                    tracing::warn!("Chunk {} send failed: {} (attempt {}/{})", index, e, attempt, attempts);
                }
            }
        }

        Err(ClientError::ChunkRejected {
            index,
            status: last_status,
        })
    }

    async fn send_complete(
        &self,
        lesson_id: &str,
        file_id: &str,
        content_type: &str,
    ) -> Result<(), ClientError> {
        let form = reqwest::multipart::Form::new()
            .text("lessonId", lesson_id.to_string())
            .text("fileId", file_id.to_string())
            .text("fileType", content_type.to_string());

        let response = self
            .http
            .post(format!("{}/api/fileupload/complete", self.base_url))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::CompletionRejected {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}
