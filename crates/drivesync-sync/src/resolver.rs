//! Remote location resolution
//!
//! Maps a category name to the id of `<archive_root>/<category>` in the
//! remote store, creating either folder on demand when allowed.
//!
//! Results are kept in a [`ResolutionCache`] of once-cells: concurrent
//! resolutions of the same uncached name share a single lookup (and at most a
//! single creation), and every caller receives the same id. A failed
//! resolution leaves its cell empty so a later call can try again.

use std::sync::Arc;

use dashmap::DashMap;
use drivesync_core::domain::newtypes::{Category, FolderId};
use drivesync_core::ports::{Confirm, RemoteStore, StoreError};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::retry::RetryExecutor;
use crate::ResolveError;

/// Process-lifetime cache of resolved folder ids
///
/// Append-only. Safe to share between resolvers and tasks.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    archive_root: OnceCell<FolderId>,
    categories: DashMap<String, Arc<OnceCell<FolderId>>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolved archive root id, if known
    pub fn archive_root(&self) -> Option<FolderId> {
        self.archive_root.get().cloned()
    }

    /// Resolved id for `category`, if known
    pub fn get(&self, category: &str) -> Option<FolderId> {
        self.categories
            .get(category)
            .and_then(|cell| cell.get().cloned())
    }

    /// Number of resolved categories
    pub fn len(&self) -> usize {
        self.categories
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn category_cell(&self, category: &str) -> Arc<OnceCell<FolderId>> {
        let entry = self.categories.entry(category.to_string()).or_default();
        Arc::clone(entry.value())
    }
}

/// Resolves categories to remote folder ids under the archive root
pub struct RemoteLocationResolver {
    store: Arc<dyn RemoteStore>,
    cache: Arc<ResolutionCache>,
    confirm: Arc<dyn Confirm>,
    retry: RetryExecutor,
    archive_root: String,
    create_missing: bool,
}

impl RemoteLocationResolver {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        cache: Arc<ResolutionCache>,
        confirm: Arc<dyn Confirm>,
        retry: RetryExecutor,
        archive_root: impl Into<String>,
        create_missing: bool,
    ) -> Self {
        Self {
            store,
            cache,
            confirm,
            retry,
            archive_root: archive_root.into(),
            create_missing,
        }
    }

    pub fn cache(&self) -> &Arc<ResolutionCache> {
        &self.cache
    }

    /// Resolves (finding or creating) the archive root folder
    pub async fn resolve_archive_root(&self, job: &str) -> Result<FolderId, ResolveError> {
        let root = FolderId::root();
        self.cache
            .archive_root
            .get_or_try_init(|| self.find_or_create(job, &self.archive_root, &root))
            .await
            .cloned()
    }

    /// Resolves (finding or creating) the folder for `category`
    pub async fn resolve(&self, job: &str, category: &Category) -> Result<FolderId, ResolveError> {
        let root = self.resolve_archive_root(job).await?;

        let cell = self.cache.category_cell(category.as_str());
        if let Some(id) = cell.get() {
            debug!(job, category = %category, id = %id, "Category resolved from cache");
            return Ok(id.clone());
        }

        cell.get_or_try_init(|| self.find_or_create(job, category.as_str(), &root))
            .await
            .cloned()
    }

    /// Lists live folders named `name` under `parent`, with retries
    pub async fn list_folders(
        &self,
        job: &str,
        name: &str,
        parent: &FolderId,
    ) -> Result<Vec<FolderId>, StoreError> {
        self.retry
            .with_retry(job, "list_folders", StoreError::is_transient, || {
                self.store.list_folders(name, parent)
            })
            .await
    }

    async fn find_or_create(
        &self,
        job: &str,
        name: &str,
        parent: &FolderId,
    ) -> Result<FolderId, ResolveError> {
        let mut ids = self.list_folders(job, name, parent).await?;

        match ids.len() {
            0 => {
                let allowed = self.create_missing
                    || self
                        .confirm
                        .confirm(&format!(
                            "Remote folder '{name}' does not exist. Create it?"
                        ))
                        .await;
                if !allowed {
                    return Err(ResolveError::NotFound {
                        name: name.to_string(),
                    });
                }

                let id = self
                    .retry
                    .with_retry(job, "create_folder", StoreError::is_transient, || {
                        self.store.create_folder(name, parent)
                    })
                    .await?;
                info!(job, name, parent = %parent, id = %id, "Created remote folder");
                Ok(id)
            }
            1 => {
                let id = ids.remove(0);
                debug!(job, name, id = %id, "Found remote folder");
                Ok(id)
            }
            _ => Err(ResolveError::MultipleResults {
                name: name.to_string(),
                ids,
            }),
        }
    }
}
