//! Public entry points bound to the RPC connector, exercised without a node

use common::deploy::DeployMode;
use common::operation::{EventKind, OperationStatus};
use common::settings::Options;

fn errors(handle: &common::operation::OperationHandle) -> Vec<String> {
    handle
        .events()
        .into_iter()
        .filter(|event| event.kind == EventKind::Error)
        .map(|event| event.message)
        .collect()
}

#[tokio::test]
async fn test_deploy_missing_directory() {
    let temp = tempfile::tempdir().unwrap();
    let missing = temp.path().join("nope");

    let handle = dlfs::deploy("store", &missing, DeployMode::Merge, &Options::default());

    assert_eq!(handle.wait().await, OperationStatus::Failed);
    let errors = errors(&handle);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains(&missing.display().to_string()));
}

#[tokio::test]
async fn test_deploy_without_certificates() {
    let site = tempfile::tempdir().unwrap();
    std::fs::write(site.path().join("index.html"), "<h1>hi</h1>").unwrap();
    let ssl = tempfile::tempdir().unwrap();

    let options = Options {
        certificate_folder_path: Some(ssl.path().to_path_buf()),
        ..Options::default()
    };
    let handle = dlfs::deploy("store", site.path(), DeployMode::Merge, &options);

    assert_eq!(handle.wait().await, OperationStatus::Failed);
    let errors = errors(&handle);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Deployment error: client setup failed"));
    assert!(errors[0].contains("private_data_layer.crt"));
}

#[tokio::test]
async fn test_mirror_without_certificates() {
    let ssl = tempfile::tempdir().unwrap();
    let options = Options {
        certificate_folder_path: Some(ssl.path().to_path_buf()),
        mirror_url_override: Some("http://x".to_string()),
        ..Options::default()
    };

    let handle = dlfs::mirror("store", &options);

    assert_eq!(handle.wait().await, OperationStatus::Failed);
    assert!(errors(&handle)[0].starts_with("client setup failed"));
}
