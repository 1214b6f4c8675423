mod common;

use ::common::mirror::{MIRROR_ADDED_MESSAGE, MIRROR_FAILED_MESSAGE};
use ::common::operation::{EventKind, OperationStatus};
use ::common::remote::MirrorRegistration;
use ::common::settings::{Options, DEFAULT_FEE, DEFAULT_MIRROR_COIN_AMOUNT};
use ::common::testkit::{MemoryConnector, StoreCall};

use self::common::{finish, messages, STORE_ID};

#[tokio::test]
async fn test_mirror_with_url_override() {
    let connector = MemoryConnector::new();
    let options = Options {
        mirror_url_override: Some("http://x".to_string()),
        ..Options::default()
    };

    let handle = ::common::mirror(connector.clone(), STORE_ID, &options);
    let (status, events) = finish(&handle).await;

    assert_eq!(status, OperationStatus::Succeeded);
    assert_eq!(messages(&events, EventKind::Info), vec![MIRROR_ADDED_MESSAGE]);
    assert_eq!(
        connector.store().calls(),
        vec![StoreCall::AddMirror {
            store_id: STORE_ID.to_string(),
            urls: vec!["http://x".to_string()],
            amount: DEFAULT_MIRROR_COIN_AMOUNT,
            fee: DEFAULT_FEE,
        }]
    );
    // once before registering, once after
    assert_eq!(connector.wallet().confirmation_waits(), 2);
}

#[tokio::test]
async fn test_mirror_for_current_host() {
    let connector = MemoryConnector::new();
    let options = Options {
        force_ip4_mirror: Some(true),
        ..Options::default()
    };

    let handle = ::common::mirror(connector.clone(), STORE_ID, &options);
    assert_eq!(handle.wait().await, OperationStatus::Succeeded);

    assert_eq!(
        connector.store().calls(),
        vec![StoreCall::AddMirrorForCurrentHost {
            store_id: STORE_ID.to_string(),
            force_ip4: true,
        }]
    );
}

#[tokio::test]
async fn test_rejected_registration_skips_confirmation() {
    let connector = MemoryConnector::new();
    connector.store().set_mirror_result(MirrorRegistration {
        success: false,
        error: None,
    });

    let handle = ::common::mirror(connector.clone(), STORE_ID, &Options::default());
    let (status, events) = finish(&handle).await;

    assert_eq!(status, OperationStatus::Failed);
    assert_eq!(messages(&events, EventKind::Error), vec![MIRROR_FAILED_MESSAGE]);
    assert!(messages(&events, EventKind::Info).is_empty());
    assert_eq!(connector.wallet().confirmation_waits(), 1);
}

#[tokio::test]
async fn test_rejection_reason_is_reported() {
    let connector = MemoryConnector::new();
    connector.store().set_mirror_result(MirrorRegistration {
        success: false,
        error: Some("Insufficient funds".to_string()),
    });

    let handle = ::common::mirror(connector.clone(), STORE_ID, &Options::default());
    let (_, events) = finish(&handle).await;

    assert_eq!(
        messages(&events, EventKind::Error),
        vec!["Failed to add mirror: Insufficient funds"]
    );
}

#[tokio::test]
async fn test_mirror_rejects_empty_store_id() {
    let connector = MemoryConnector::new();

    let handle = ::common::mirror(connector.clone(), "  ", &Options::default());
    let (status, events) = finish(&handle).await;

    assert_eq!(status, OperationStatus::Failed);
    assert_eq!(
        messages(&events, EventKind::Error),
        vec!["Cannot operate on a null store id."]
    );
    assert!(connector.store().calls().is_empty());
    assert_eq!(connector.wallet().confirmation_waits(), 0);
}

#[tokio::test]
async fn test_payload_ceiling_does_not_apply_to_mirror() {
    let connector = MemoryConnector::new();
    let options = Options {
        maximum_rpc_payload_size: Some(1024),
        mirror_url_override: Some("http://x".to_string()),
        ..Options::default()
    };

    let handle = ::common::mirror(connector.clone(), STORE_ID, &options);
    assert_eq!(handle.wait().await, OperationStatus::Succeeded);
    assert_eq!(connector.store().calls().len(), 1);
}

#[tokio::test]
async fn test_invalid_settings_fail_synchronously() {
    let connector = MemoryConnector::new();
    let options = Options {
        datalayer_host: Some("not a url".to_string()),
        ..Options::default()
    };

    let handle = ::common::mirror(connector.clone(), STORE_ID, &options);
    // no await needed, the failure is recorded before the handle is returned
    assert_eq!(handle.status(), OperationStatus::Failed);
    assert_eq!(messages(&handle.events(), EventKind::Error).len(), 1);
    assert!(connector.store().calls().is_empty());
}
