use serde::{Deserialize, Serialize};

// generic error response
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

// response for a stored chunk
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChunkUploadResponse {
    pub success: bool,
    pub chunk_index: u32,
    pub received_chunks: usize,
    pub total_chunks: u32,
}

// response for a completed merge
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CompleteResponse {
    pub success: bool,
    pub artifact: String,
    pub size: u64,
}

// request to kick off the simulated remote-transfer stream
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRequest {
    pub file_id: String,
}

// response for the progress trigger (accepted, stream runs detached)
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProgressAccepted {
    pub accepted: bool,
    pub file_id: String,
}
