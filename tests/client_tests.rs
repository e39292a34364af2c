use std::io::Write;
use std::sync::Arc;

use axum::routing::post;
use axum::Router;

use chunkbox::client::{chunk_ranges, ClientError, FailedPhase, UploadClient, UploadPhase};
use chunkbox::handlers::{trigger_progress, upload_chunk, upload_complete};
use chunkbox::progress::{BroadcastConfig, ProgressEvent};
use chunkbox::state::AppState;

#[test]
fn test_chunk_ranges_with_remainder() {
    // 1.2 MiB split at 500 KiB: two full chunks and a 200 KiB remainder
    let ranges = chunk_ranges(1200 * 1024, 500 * 1024);
    assert_eq!(ranges.len(), 3);
    assert_eq!(ranges[0], 0..500 * 1024);
    assert_eq!(ranges[1], 500 * 1024..1000 * 1024);
    assert_eq!(ranges[2], 1000 * 1024..1200 * 1024);
}

#[test]
fn test_chunk_ranges_exact_multiple() {
    let ranges = chunk_ranges(1000, 250);
    assert_eq!(ranges.len(), 4);
    assert!(ranges.iter().all(|r| r.end - r.start == 250));
}

#[test]
fn test_chunk_ranges_small_file() {
    let ranges = chunk_ranges(10, 500 * 1024);
    assert_eq!(ranges, vec![0..10]);
}

#[test]
fn test_chunk_ranges_empty() {
    assert!(chunk_ranges(0, 1024).is_empty());
}

#[test]
fn test_ranges_cover_input_exactly() {
    let ranges = chunk_ranges(123_457, 1000);
    assert_eq!(ranges.first().unwrap().start, 0);
    assert_eq!(ranges.last().unwrap().end, 123_457);
    // contiguous, no gaps and no overlap
    assert!(ranges.windows(2).all(|w| w[0].end == w[1].start));
}

#[test]
fn test_phase_from_remote_event() {
    assert_eq!(
        UploadPhase::from_remote_event(&ProgressEvent::Progress("Initialising".to_string())),
        UploadPhase::AwaitingRemoteTransfer
    );
    assert_eq!(
        UploadPhase::from_remote_event(&ProgressEvent::Progress("40 %".to_string())),
        UploadPhase::RemoteProgress(40)
    );
    assert_eq!(
        UploadPhase::from_remote_event(&ProgressEvent::Complete),
        UploadPhase::Done
    );
}

async fn spawn_test_server(root: std::path::PathBuf) -> (String, Arc<AppState>) {
    let state = Arc::new(AppState::new(root, BroadcastConfig::default()));
    let app = Router::new()
        .route("/api/fileupload/chunk", post(upload_chunk))
        .route("/api/fileupload/complete", post(upload_complete))
        .route("/api/fileupload/progress", post(trigger_progress))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), state)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sequential_upload_round_trip() {
    let temp_dir = tempfile::tempdir().unwrap();
    let storage = temp_dir.path().join("storage");
    let (base_url, _state) = spawn_test_server(storage.clone()).await;

    // 1.2 MiB patterned source file
    let source_bytes: Vec<u8> = (0..1200 * 1024).map(|i| (i % 251) as u8).collect();
    let source_path = temp_dir.path().join("lecture.mp4");
    let mut f = std::fs::File::create(&source_path).unwrap();
    f.write_all(&source_bytes).unwrap();

    let client = UploadClient::new(base_url.as_str(), 500 * 1024);
    let mut phases = Vec::new();
    client
        .upload("lesson-9", "file-9", &source_path, "video/mp4", |phase| {
            phases.push(phase)
        })
        .await
        .unwrap();

    // chunking first, then three acknowledged chunks, then the merge
    assert_eq!(phases.first(), Some(&UploadPhase::Chunking));
    let percents: Vec<u8> = phases
        .iter()
        .filter_map(|p| match p {
            UploadPhase::Uploading { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect();
    assert_eq!(percents, vec![33, 67, 100]);
    assert_eq!(phases.last(), Some(&UploadPhase::Merging));

    let artifact = storage.join("lesson-9").join("Merged-file-9.mp4");
    assert_eq!(std::fs::read(artifact).unwrap(), source_bytes);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_upload_aborts_on_rejected_completion() {
    let temp_dir = tempfile::tempdir().unwrap();
    let storage = temp_dir.path().join("storage");
    let (base_url, _state) = spawn_test_server(storage).await;

    let source_path = temp_dir.path().join("notes.bin");
    std::fs::write(&source_path, b"some bytes").unwrap();

    let client = UploadClient::new(base_url.as_str(), 4);
    let mut phases = Vec::new();
    let err = client
        .upload(
            "lesson-9",
            "file-9",
            &source_path,
            "video/x-just-made-up",
            |phase| phases.push(phase),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::CompletionRejected { status: 400 }
    ));
    assert_eq!(
        phases.last(),
        Some(&UploadPhase::Failed(FailedPhase::Completion))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_trigger_remote_transfer_is_fire_and_forget() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (base_url, _state) = spawn_test_server(temp_dir.path().to_path_buf()).await;

    let client = UploadClient::new(base_url.as_str(), 1024);
    let mut phases = Vec::new();
    client
        .trigger_remote_transfer("file-9", |phase| phases.push(phase))
        .await
        .unwrap();

    // accepted even with no channel registered; the stream is server-side
    assert_eq!(phases, vec![UploadPhase::AwaitingRemoteTransfer]);
}

#[tokio::test]
async fn test_empty_source_is_rejected_client_side() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source_path = temp_dir.path().join("empty.bin");
    std::fs::write(&source_path, b"").unwrap();

    // never reaches the network, so a bogus base url is fine
    let client = UploadClient::new("http://127.0.0.1:1", 1024);
    let mut phases = Vec::new();
    let err = client
        .upload("lesson", "file", &source_path, "video/mp4", |phase| {
            phases.push(phase)
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::EmptySource));
    assert_eq!(phases.last(), Some(&UploadPhase::Failed(FailedPhase::Chunk)));
}
