//! Integration tests for HTTP error mapping and classification

use drivesync_core::domain::newtypes::FolderId;
use drivesync_core::ports::{RemoteStore, StoreError};
use drivesync_gdrive::provider::DriveRemoteStore;
use drivesync_gdrive::DriveError;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common;

async fn mount_failing_list(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(template)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_error_envelope_message_is_extracted() {
    let (server, client) = common::setup_drive_mock().await;
    mount_failing_list(
        &server,
        ResponseTemplate::new(404).set_body_json(common::error_body(404, "File not found: X.")),
    )
    .await;

    match client.list_folders("archive", "root").await {
        Err(DriveError::Api { status, message }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "File not found: X.");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rate_limited_forbidden_is_transient() {
    let (server, client) = common::setup_drive_mock().await;
    mount_failing_list(
        &server,
        ResponseTemplate::new(403).set_body_json(common::error_body(403, "User Rate Limit Exceeded")),
    )
    .await;

    let store = DriveRemoteStore::new(client);
    let err = store
        .list_folders("archive", &FolderId::root())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(403));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_permission_denied_is_fatal() {
    let (server, client) = common::setup_drive_mock().await;
    mount_failing_list(
        &server,
        ResponseTemplate::new(403)
            .set_body_json(common::error_body(403, "Insufficient Permission")),
    )
    .await;

    let store = DriveRemoteStore::new(client);
    let err = store
        .list_folders("archive", &FolderId::root())
        .await
        .unwrap_err();
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_server_error_with_plain_body_is_transient() {
    let (server, client) = common::setup_drive_mock().await;
    mount_failing_list(&server, ResponseTemplate::new(503).set_body_string("backend down")).await;

    let store = DriveRemoteStore::new(client);
    let err = store
        .list_folders("archive", &FolderId::root())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        StoreError::Api {
            status: 503,
            message: "backend down".to_string()
        }
    );
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let (server, client) = common::setup_drive_mock().await;
    mount_failing_list(&server, ResponseTemplate::new(200).set_body_string("not json")).await;

    let store = DriveRemoteStore::new(client);
    let err = store
        .list_folders("archive", &FolderId::root())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidResponse(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let client = drivesync_gdrive::client::DriveClient::with_base_url("t", uri);
    let store = DriveRemoteStore::new(client);
    let err = store
        .list_folders("archive", &FolderId::root())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Network(_)));
    assert!(err.is_transient());
}
