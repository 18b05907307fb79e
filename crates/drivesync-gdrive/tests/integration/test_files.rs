//! Integration tests for folder listing, folder creation, uploads, and deletes

use drivesync_core::domain::newtypes::FolderId;
use drivesync_core::ports::{RemoteStore, StoreError};
use drivesync_gdrive::client::DriveClient;
use drivesync_gdrive::provider::DriveRemoteStore;
use wiremock::matchers::{
    body_partial_json, body_string, body_string_contains, header, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common;

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_list_folders_returns_all_ids() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_list_folders(&server, "archive", "root", &["A1", "A2"]).await;

    let ids = client.list_folders("archive", "root").await.expect("list failed");
    assert_eq!(ids, vec!["A1".to_string(), "A2".to_string()]);
}

#[tokio::test]
async fn test_list_folders_empty_result() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_list_folders(&server, "archive", "root", &[]).await;

    let ids = client.list_folders("archive", "root").await.expect("list failed");
    assert!(ids.is_empty());
}

#[tokio::test]
async fn test_list_folders_escapes_quotes_in_name() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_list_folders(&server, "Bob\\'s", "root", &["B1"]).await;

    let ids = client.list_folders("Bob's", "root").await.expect("list failed");
    assert_eq!(ids, vec!["B1".to_string()]);
}

#[tokio::test]
async fn test_store_list_folders_returns_typed_ids() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_list_folders(&server, "Photos", "ARCH", &["C1"]).await;

    let store = DriveRemoteStore::new(client);
    let parent = FolderId::new("ARCH".to_string()).unwrap();
    let ids = store.list_folders("Photos", &parent).await.unwrap();
    assert_eq!(ids, vec![FolderId::new("C1".to_string()).unwrap()]);
}

// ============================================================================
// Folder creation
// ============================================================================

#[tokio::test]
async fn test_create_folder_sends_metadata() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("POST"))
        .and(path("/drive/v3/files"))
        .and(query_param("fields", "id"))
        .and(header("authorization", "Bearer test-access-token"))
        .and(body_partial_json(serde_json::json!({
            "name": "Photos",
            "description": "Photos",
            "mimeType": common::FOLDER_MIME,
            "parents": ["ARCH"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "NEW1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let id = client.create_folder("Photos", "ARCH").await.expect("create failed");
    assert_eq!(id, "NEW1");
}

// ============================================================================
// Uploads
// ============================================================================

#[tokio::test]
async fn test_create_file_returns_checksum() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_upload(&server, "F1", Some("5d41402abc4b2a76b9719d911017c592")).await;
    let dir = tempfile::tempdir().unwrap();
    let file = common::local_file(dir.path(), "hello.txt", b"hello");

    let uploaded = client
        .create_file("hello.txt", "P1", &file, "text/plain")
        .await
        .expect("upload failed");
    assert_eq!(uploaded.id, "F1");
    assert_eq!(
        uploaded.md5_checksum.as_deref(),
        Some("5d41402abc4b2a76b9719d911017c592")
    );
}

#[tokio::test]
async fn test_create_file_sends_multipart_body() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .and(body_string_contains("\"parents\":[\"P1\"]"))
        .and(body_string_contains("Content-Type: text/plain"))
        .and(body_string_contains("file body"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "F2"
        })))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let file = common::local_file(dir.path(), "notes.txt", b"file body");

    let uploaded = client
        .create_file("notes.txt", "P1", &file, "text/plain")
        .await
        .expect("upload failed");
    assert_eq!(uploaded.id, "F2");
    assert!(uploaded.md5_checksum.is_none());
}

#[tokio::test]
async fn test_store_create_file_maps_checksum() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_upload(&server, "F3", Some("abc")).await;

    let dir = tempfile::tempdir().unwrap();
    let file = common::local_file(dir.path(), "a.bin", &[1, 2, 3]);

    let store = DriveRemoteStore::new(client);
    let parent = FolderId::new("P1".to_string()).unwrap();
    let created = store
        .create_file("a.bin", &parent, &file, "application/octet-stream")
        .await
        .unwrap();
    assert_eq!(created.id.as_str(), "F3");
    assert_eq!(created.md5_checksum.as_deref(), Some("abc"));
}

#[tokio::test]
async fn test_store_create_file_missing_local_file_is_fatal() {
    let (_server, client) = common::setup_drive_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let file = drivesync_core::ports::LocalFile {
        path: dir.path().join("gone.txt"),
        size: 3,
    };

    let store = DriveRemoteStore::new(client);
    let err = store
        .create_file("gone.txt", &FolderId::root(), &file, "text/plain")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::LocalIo { .. }));
    assert!(!err.is_transient());
}

// ============================================================================
// Resumable uploads
// ============================================================================

/// Client that switches to resumable sessions above 4 bytes, 4-byte chunks
async fn chunked_client() -> (MockServer, DriveClient) {
    let (server, client) = common::setup_drive_mock().await;
    (server, client.with_upload_limits(4, 4))
}

async fn mount_chunk(server: &MockServer, range: &str, body: &str, response: ResponseTemplate) {
    Mock::given(method("PUT"))
        .and(path("/upload/session/S1"))
        .and(header("content-range", range))
        .and(body_string(body))
        .respond_with(response)
        .expect(1)
        .mount(server)
        .await;
}

fn resume_incomplete(last_byte: u64) -> ResponseTemplate {
    ResponseTemplate::new(308).insert_header("Range", format!("bytes=0-{last_byte}").as_str())
}

#[tokio::test]
async fn test_large_file_goes_through_resumable_session() {
    let (server, client) = chunked_client().await;
    common::mount_upload_session(&server).await;
    mount_chunk(&server, "bytes 0-3/10", "0123", resume_incomplete(3)).await;
    mount_chunk(&server, "bytes 4-7/10", "4567", resume_incomplete(7)).await;
    mount_chunk(
        &server,
        "bytes 8-9/10",
        "89",
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "BIG1",
            "md5Checksum": "781e5e245d69b566979b86e28d23f2c7"
        })),
    )
    .await;
    let dir = tempfile::tempdir().unwrap();
    let file = common::local_file(dir.path(), "video.mkv", b"0123456789");

    let uploaded = client
        .create_file("video.mkv", "P1", &file, "video/x-matroska")
        .await
        .expect("resumable upload failed");

    assert_eq!(uploaded.id, "BIG1");
    assert_eq!(
        uploaded.md5_checksum.as_deref(),
        Some("781e5e245d69b566979b86e28d23f2c7")
    );
}

#[tokio::test]
async fn test_resumable_upload_resends_from_acknowledged_offset() {
    let (server, client) = chunked_client().await;
    common::mount_upload_session(&server).await;
    mount_chunk(&server, "bytes 0-3/6", "abcd", resume_incomplete(1)).await;
    mount_chunk(&server, "bytes 2-5/6", "cdef", ResponseTemplate::new(201).set_body_json(
        serde_json::json!({ "id": "BIG2" }),
    ))
    .await;
    let dir = tempfile::tempdir().unwrap();
    let file = common::local_file(dir.path(), "six.bin", b"abcdef");

    let uploaded = client
        .create_file("six.bin", "P1", &file, "application/octet-stream")
        .await
        .expect("resumable upload failed");
    assert_eq!(uploaded.id, "BIG2");
}

#[tokio::test]
async fn test_session_without_location_is_invalid_response() {
    let (server, client) = chunked_client().await;
    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .and(query_param("uploadType", "resumable"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let file = common::local_file(dir.path(), "big.bin", b"0123456789");

    let store = DriveRemoteStore::new(client);
    let err = store
        .create_file("big.bin", &FolderId::root(), &file, "application/octet-stream")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_chunk_server_error_is_transient() {
    let (server, client) = chunked_client().await;
    common::mount_upload_session(&server).await;
    Mock::given(method("PUT"))
        .and(path("/upload/session/S1"))
        .respond_with(ResponseTemplate::new(503).set_body_json(common::error_body(503, "Backend Error")))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let file = common::local_file(dir.path(), "big.bin", b"0123456789");

    let store = DriveRemoteStore::new(client);
    let err = store
        .create_file("big.bin", &FolderId::root(), &file, "application/octet-stream")
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert!(err.is_transient());
}

// ============================================================================
// Deletes
// ============================================================================

#[tokio::test]
async fn test_delete_object() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("DELETE"))
        .and(path("/drive/v3/files/DUP2"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let store = DriveRemoteStore::new(client);
    store.delete_object("DUP2").await.expect("delete failed");
}

#[tokio::test]
async fn test_trash_object_patches_trashed_flag() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("PATCH"))
        .and(path("/drive/v3/files/DUP3"))
        .and(body_partial_json(serde_json::json!({ "trashed": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "DUP3" })))
        .expect(1)
        .mount(&server)
        .await;

    let store = DriveRemoteStore::new(client);
    store.trash_object("DUP3").await.expect("trash failed");
}
