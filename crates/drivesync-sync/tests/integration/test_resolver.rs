//! Tests for RemoteLocationResolver and its cache

use std::sync::atomic::Ordering;
use std::sync::Arc;

use drivesync_core::domain::newtypes::{Category, FolderId};
use drivesync_core::ports::{AssumeYes, Confirm, NonInteractive};
use drivesync_sync::resolver::{RemoteLocationResolver, ResolutionCache};
use drivesync_sync::retry::{RetryExecutor, RetryPolicy};
use drivesync_sync::ResolveError;
use tokio_util::sync::CancellationToken;

use crate::common::MemoryStore;

fn resolver(
    store: &Arc<MemoryStore>,
    confirm: Arc<dyn Confirm>,
    create_missing: bool,
) -> RemoteLocationResolver {
    let retry = RetryExecutor::new(
        RetryPolicy {
            initial_delay: std::time::Duration::ZERO,
            ratio: 2,
            max_attempts: Some(4),
        },
        CancellationToken::new(),
    );
    RemoteLocationResolver::new(
        store.clone(),
        Arc::new(ResolutionCache::new()),
        confirm,
        retry,
        "archive",
        create_missing,
    )
}

fn category(name: &str) -> Category {
    Category::new(name).unwrap()
}

#[tokio::test]
async fn test_existing_folders_are_found() {
    let store = MemoryStore::new();
    let archive = store.add_folder("archive", &FolderId::root());
    let photos = store.add_folder("Photos", &archive);
    let resolver = resolver(&store, Arc::new(NonInteractive), false);

    let id = resolver.resolve("job01", &category("Photos")).await.unwrap();

    assert_eq!(id, photos);
    assert_eq!(resolver.cache().archive_root(), Some(archive));
    assert_eq!(store.create_folder_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cached_resolution_makes_no_calls() {
    let store = MemoryStore::new();
    let resolver = resolver(&store, Arc::new(NonInteractive), true);

    let first = resolver.resolve("job01", &category("Photos")).await.unwrap();
    let calls = store.total_calls();
    let second = resolver.resolve("job02", &category("Photos")).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(store.total_calls(), calls);
    assert_eq!(resolver.cache().get("Photos"), Some(first));
    assert_eq!(resolver.cache().len(), 1);
}

#[tokio::test]
async fn test_missing_folder_without_permission_is_not_found() {
    let store = MemoryStore::new();
    let archive = store.add_folder("archive", &FolderId::root());
    let resolver = resolver(&store, Arc::new(NonInteractive), false);

    let err = resolver
        .resolve("job01", &category("Taxes"))
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::NotFound { ref name } if name == "Taxes"));
    assert_eq!(store.create_folder_calls.load(Ordering::SeqCst), 0);
    assert!(resolver.cache().get("Taxes").is_none());
    assert_eq!(resolver.cache().archive_root(), Some(archive));
}

#[tokio::test]
async fn test_confirmation_allows_creation() {
    let store = MemoryStore::new();
    let resolver = resolver(&store, Arc::new(AssumeYes), false);

    let id = resolver.resolve("job01", &category("Taxes")).await.unwrap();

    let created = store.folder_named("Taxes").unwrap();
    assert_eq!(created.id, id);
    assert_eq!(created.parent, store.folder_named("archive").unwrap().id);
    assert_eq!(store.create_folder_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_duplicate_folders_are_reported() {
    let store = MemoryStore::new();
    let first = store.add_folder("archive", &FolderId::root());
    let second = store.add_folder("archive", &FolderId::root());
    let resolver = resolver(&store, Arc::new(AssumeYes), true);

    let err = resolver
        .resolve("job01", &category("Photos"))
        .await
        .unwrap_err();

    match err {
        ResolveError::MultipleResults { name, ids } => {
            assert_eq!(name, "archive");
            assert_eq!(ids, vec![first, second]);
        }
        other => panic!("expected MultipleResults, got {other:?}"),
    }
    assert!(resolver.cache().archive_root().is_none());
    assert_eq!(store.create_folder_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_resolution_can_be_retried_later() {
    let store = MemoryStore::new();
    let resolver = resolver(&store, Arc::new(NonInteractive), false);

    assert!(resolver.resolve("job01", &category("Photos")).await.is_err());

    let archive = store.add_folder("archive", &FolderId::root());
    let photos = store.add_folder("Photos", &archive);
    let id = resolver.resolve("job02", &category("Photos")).await.unwrap();
    assert_eq!(id, photos);
}

#[tokio::test]
async fn test_transient_list_errors_are_retried() {
    let store = MemoryStore::new();
    let archive = store.add_folder("archive", &FolderId::root());
    store.fail_next_lists(2);
    let resolver = resolver(&store, Arc::new(NonInteractive), false);

    let id = resolver.resolve_archive_root("job01").await.unwrap();

    assert_eq!(id, archive);
    assert_eq!(store.list_calls(), vec!["archive"; 3]);
}

#[tokio::test]
async fn test_concurrent_resolutions_collapse() {
    let store = MemoryStore::new();
    store.set_list_delay(std::time::Duration::from_millis(20));
    let resolver = Arc::new(resolver(&store, Arc::new(NonInteractive), true));

    let mut handles = Vec::new();
    for i in 0..8 {
        let resolver = Arc::clone(&resolver);
        handles.push(tokio::spawn(async move {
            resolver
                .resolve(&format!("job{i:02}"), &category("Photos"))
                .await
                .unwrap()
        }));
    }
    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }

    assert!(ids.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(store.create_folder_calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        store.list_calls().iter().filter(|n| *n == "Photos").count(),
        1
    );
}
