//! Multipart storage of files larger than one payload

mod common;

use ::common::changelist::ChangeAction;
use ::common::chunker::MultipartManifest;
use ::common::codec;
use ::common::deploy::DeployMode;
use ::common::operation::{EventKind, OperationStatus};
use ::common::settings::Options;
use ::common::testkit::MemoryConnector;

use self::common::{finish, messages, pattern, setup_dir, small_chunk_options, STORE_ID};

const CHUNK: u64 = 1024;

#[tokio::test]
async fn test_large_file_reassembles_from_parts() {
    let content = pattern(3000);
    let dir = setup_dir(&[("big.bin", content.as_slice()), ("small.txt", b"tiny".as_slice())]);
    let connector = MemoryConnector::new();

    let handle = ::common::deploy(
        connector.clone(),
        STORE_ID,
        dir.path(),
        DeployMode::Merge,
        &small_chunk_options(CHUNK),
    );
    let (status, events) = finish(&handle).await;
    assert_eq!(status, OperationStatus::Succeeded, "{:?}", events);

    let store = connector.store();
    assert_eq!(
        store.keys(STORE_ID),
        vec!["big.bin", "big.bin.part1", "big.bin.part2", "big.bin.part3", "small.txt"]
    );

    let manifest = MultipartManifest::from_value(&store.value(STORE_ID, "big.bin").unwrap()).unwrap();
    assert_eq!(manifest.parts, vec!["big.bin.part1", "big.bin.part2", "big.bin.part3"]);
    assert_eq!(store.value(STORE_ID, "big.bin.part3").unwrap().len(), 3000 - 2 * CHUNK as usize);

    assert_eq!(store.read_file(STORE_ID, "big.bin").unwrap(), content);
    assert_eq!(store.read_file(STORE_ID, "small.txt").unwrap(), b"tiny");
}

#[tokio::test]
async fn test_parts_land_before_manifest() {
    let dir = setup_dir(&[("video.mp4", pattern(2 * CHUNK as usize + 1))]);
    let connector = MemoryConnector::new();

    let handle = ::common::deploy(
        connector.clone(),
        STORE_ID,
        dir.path(),
        DeployMode::Merge,
        &small_chunk_options(CHUNK),
    );
    assert_eq!(handle.wait().await, OperationStatus::Succeeded);

    let inserted: Vec<String> = connector
        .store()
        .updates(STORE_ID)
        .into_iter()
        .flatten()
        .filter(|op| op.action == ChangeAction::Insert)
        .map(|op| String::from_utf8(codec::decode(&op.key).unwrap()).unwrap())
        .collect();
    assert_eq!(
        inserted,
        vec!["video.mp4.part1", "video.mp4.part2", "video.mp4.part3", "video.mp4"]
    );
}

#[tokio::test]
async fn test_file_at_chunk_size_is_not_split() {
    let content = pattern(CHUNK as usize);
    let dir = setup_dir(&[("exact.bin", content.as_slice())]);
    let connector = MemoryConnector::new();

    let handle = ::common::deploy(
        connector.clone(),
        STORE_ID,
        dir.path(),
        DeployMode::Merge,
        &small_chunk_options(CHUNK),
    );
    assert_eq!(handle.wait().await, OperationStatus::Succeeded);

    assert_eq!(connector.store().keys(STORE_ID), vec!["exact.bin"]);
    assert_eq!(connector.store().value(STORE_ID, "exact.bin").unwrap(), content);
}

#[tokio::test]
async fn test_redeploy_keeps_parts_out_of_cleanup() {
    let dir = setup_dir(&[("big.bin", pattern(2500))]);
    let connector = MemoryConnector::new();
    let options = small_chunk_options(CHUNK);

    for _ in 0..2 {
        let handle = ::common::deploy(connector.clone(), STORE_ID, dir.path(), DeployMode::Replace, &options);
        let (status, events) = finish(&handle).await;
        assert_eq!(status, OperationStatus::Succeeded, "{:?}", events);
        assert!(!messages(&events, EventKind::Info)
            .iter()
            .any(|m| m.starts_with("Sending cleanup chunk")));
    }

    assert_eq!(connector.store().keys(STORE_ID).len(), 4);
    assert_eq!(connector.store().read_file(STORE_ID, "big.bin").unwrap(), pattern(2500));
}

#[tokio::test]
async fn test_shrunk_file_drops_stale_parts() {
    let dir = setup_dir(&[("big.bin", pattern(2500))]);
    let connector = MemoryConnector::new();
    let options = small_chunk_options(CHUNK);

    let handle = ::common::deploy(connector.clone(), STORE_ID, dir.path(), DeployMode::Merge, &options);
    assert_eq!(handle.wait().await, OperationStatus::Succeeded);

    std::fs::write(dir.path().join("big.bin"), pattern(1500)).unwrap();
    let handle = ::common::deploy(connector.clone(), STORE_ID, dir.path(), DeployMode::Merge, &options);
    assert_eq!(handle.wait().await, OperationStatus::Succeeded);

    assert_eq!(
        connector.store().keys(STORE_ID),
        vec!["big.bin", "big.bin.part1", "big.bin.part2"]
    );
    assert_eq!(connector.store().read_file(STORE_ID, "big.bin").unwrap(), pattern(1500));
}

#[tokio::test]
async fn test_verbose_reports_parts() {
    let dir = setup_dir(&[("big.bin", pattern(1500))]);
    let connector = MemoryConnector::new();
    let options = Options {
        verbose: Some(true),
        ..small_chunk_options(CHUNK)
    };

    let handle = ::common::deploy(connector.clone(), STORE_ID, dir.path(), DeployMode::Merge, &options);
    let (_, events) = finish(&handle).await;

    let infos = messages(&events, EventKind::Info);
    assert!(infos.contains(&"Uploading part 1 of 2 for big.bin".to_string()));
    assert!(infos.contains(&"Uploading part 2 of 2 for big.bin".to_string()));
}

#[tokio::test]
async fn test_zero_byte_file_stores_empty_value() {
    let dir = setup_dir(&[("empty.txt", b"".as_slice())]);
    let connector = MemoryConnector::new();

    let handle = ::common::deploy(
        connector.clone(),
        STORE_ID,
        dir.path(),
        DeployMode::Merge,
        &small_chunk_options(CHUNK),
    );
    let (status, events) = finish(&handle).await;
    assert_eq!(status, OperationStatus::Succeeded, "{:?}", events);

    let ops: Vec<_> = connector.store().updates(STORE_ID).into_iter().flatten().collect();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].action, ChangeAction::Insert);
    assert_eq!(ops[0].key, codec::encode("empty.txt"));
    assert_eq!(ops[0].value.as_deref(), Some(""));
    assert_eq!(connector.store().value(STORE_ID, "empty.txt").unwrap(), Vec::<u8>::new());
}
