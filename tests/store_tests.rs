use chunkbox::store::ChunkStore;

fn store() -> (tempfile::TempDir, ChunkStore) {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = ChunkStore::new(temp_dir.path().to_path_buf());
    (temp_dir, store)
}

#[tokio::test]
async fn test_put_and_list_ordered_numerically() {
    let (_tmp, store) = store();

    // out-of-order arrival after chunk 0, including indices where
    // lexicographic ordering would get it wrong (2 vs 10)
    for index in [0u32, 10, 2, 11, 1, 3] {
        store
            .put("lesson", "file", index, format!("chunk-{}", index).as_bytes())
            .await
            .unwrap();
    }

    let chunks = store.list("lesson", "file").await.unwrap();
    let indices: Vec<u32> = chunks.iter().map(|(i, _)| *i).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 10, 11]);
    assert_eq!(store.count("lesson", "file").await.unwrap(), 6);
}

#[tokio::test]
async fn test_put_is_last_write_wins() {
    let (_tmp, store) = store();

    store.put("lesson", "file", 1, b"first").await.unwrap();
    store.put("lesson", "file", 1, b"second").await.unwrap();

    let chunks = store.list("lesson", "file").await.unwrap();
    assert_eq!(chunks.len(), 1);
    let bytes = std::fs::read(&chunks[0].1).unwrap();
    assert_eq!(bytes, b"second");
}

#[tokio::test]
async fn test_chunk_zero_discards_previous_attempt() {
    let (_tmp, store) = store();

    store.put("lesson", "file", 0, b"old-0").await.unwrap();
    store.put("lesson", "file", 1, b"old-1").await.unwrap();
    store.put("lesson", "file", 2, b"old-2").await.unwrap();

    // a fresh chunk 0 means the upload restarted
    store.put("lesson", "file", 0, b"new-0").await.unwrap();

    let chunks = store.list("lesson", "file").await.unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].0, 0);
    assert_eq!(std::fs::read(&chunks[0].1).unwrap(), b"new-0");
}

#[tokio::test]
async fn test_non_zero_chunk_does_not_discard() {
    let (_tmp, store) = store();

    store.put("lesson", "file", 0, b"zero").await.unwrap();
    store.put("lesson", "file", 1, b"one").await.unwrap();
    store.put("lesson", "file", 2, b"two").await.unwrap();

    assert_eq!(store.count("lesson", "file").await.unwrap(), 3);
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let (_tmp, store) = store();

    store.put("lesson", "file-a", 0, b"aaa").await.unwrap();
    store.put("lesson", "file-b", 0, b"bbb").await.unwrap();
    store.put("other-lesson", "file-a", 0, b"ccc").await.unwrap();

    // restarting one session leaves the others alone
    store.put("lesson", "file-a", 0, b"aaa2").await.unwrap();

    assert_eq!(store.count("lesson", "file-a").await.unwrap(), 1);
    assert_eq!(store.count("lesson", "file-b").await.unwrap(), 1);
    assert_eq!(store.count("other-lesson", "file-a").await.unwrap(), 1);

    let b = store.list("lesson", "file-b").await.unwrap();
    assert_eq!(std::fs::read(&b[0].1).unwrap(), b"bbb");
}

#[tokio::test]
async fn test_purge_removes_session() {
    let (_tmp, store) = store();

    store.put("lesson", "file", 0, b"zero").await.unwrap();
    store.put("lesson", "file", 1, b"one").await.unwrap();

    store.purge("lesson", "file").await.unwrap();
    assert_eq!(store.count("lesson", "file").await.unwrap(), 0);
    assert!(!store.session_dir("lesson", "file").exists());

    // purging again is fine
    store.purge("lesson", "file").await.unwrap();
}

#[tokio::test]
async fn test_list_of_unknown_session_is_empty() {
    let (_tmp, store) = store();
    assert!(store.list("nope", "nothing").await.unwrap().is_empty());
}
