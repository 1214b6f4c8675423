//! Shared helpers for pipeline integration tests
#![allow(dead_code)]

use std::fs;
use std::path::Path;

use common::operation::{EventKind, OperationEvent, OperationHandle, OperationStatus};
use common::settings::{Options, MIB};
use tempfile::TempDir;

pub const STORE_ID: &str = "8f6ed14a1fbb4c5e9b7e3b5a3a4c2a0d3f1e7a6b5c4d3e2f1a0b9c8d7e6f5a4b";

/// Payload ceiling that makes the chunk size exactly `chunk_size` bytes.
pub fn payload_for_chunk_size(chunk_size: u64) -> u64 {
    (MIB + chunk_size) * 2
}

/// Options with a small chunk size so multipart files stay small.
pub fn small_chunk_options(chunk_size: u64) -> Options {
    Options {
        maximum_rpc_payload_size: Some(payload_for_chunk_size(chunk_size)),
        ..Options::default()
    }
}

/// Write `content` at `relative` under `root`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, content: &[u8]) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

pub fn setup_dir<C: AsRef<[u8]>>(files: &[(&str, C)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (relative, content) in files {
        write_file(dir.path(), relative, content.as_ref());
    }
    dir
}

/// Deterministic, non-repeating-looking content of `len` bytes.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// Wait for the operation to end and return its status and events.
pub async fn finish(handle: &OperationHandle) -> (OperationStatus, Vec<OperationEvent>) {
    let status = handle.wait().await;
    (status, handle.events())
}

pub fn messages(events: &[OperationEvent], kind: EventKind) -> Vec<String> {
    events
        .iter()
        .filter(|event| event.kind == kind)
        .map(|event| event.message.clone())
        .collect()
}
