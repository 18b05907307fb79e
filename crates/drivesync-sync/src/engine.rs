//! Archive sync orchestrator
//!
//! The [`SyncOrchestrator`] is the public entry point of the engine. It
//! dispatches a local path to a file sync or a directory sync and enforces
//! whole-unit idempotency through sync marks.
//!
//! ## Directory Sync Flow
//!
//! 1. **Mark check**: a marked directory is reported as already synced
//! 2. **Resolve**: the category folder is found or created (cached)
//! 3. **Walk**: pre-order walk; folders are created sequentially before
//!    their children are visited, files are uploaded on independent tasks
//! 4. **Join**: the first fatal upload failure aborts the other uploads
//! 5. **Mark**: the root is marked only after every upload succeeded
//!
//! ## Retry Logic
//!
//! Every remote call runs under the [`RetryExecutor`]: transient errors
//! (5xx, 429, rate-limited 403, checksum mismatch, network) are retried with
//! exponential backoff, anything else fails the unit.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use drivesync_core::config::Config;
use drivesync_core::domain::newtypes::{Category, FolderId};
use drivesync_core::ports::{CategoryGuesser, Confirm, RemoteStore, StoreError};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::marker::{IdempotencyMarker, MarkError, UnitKind};
use crate::resolver::{RemoteLocationResolver, ResolutionCache};
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::uploader::ContentUploader;
use crate::walker::{IgnoreSet, TreeWalker, WalkEntry};
use crate::SyncError;

// ============================================================================
// SyncReport / SyncOutcome
// ============================================================================

/// Summary of a completed sync unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Short id correlating the log lines of this unit
    pub job: String,
    /// Number of files uploaded
    pub files_uploaded: u32,
    /// Number of remote folders created for local directories
    pub folders_created: u32,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

/// Non-fatal result of syncing one path
#[derive(Debug)]
pub enum SyncOutcome {
    /// Everything was uploaded and the sync mark written
    Synced(SyncReport),
    /// The path already carried a sync mark; nothing was done
    AlreadySynced,
    /// The path's basename is in the ignore set; nothing was done
    Ignored,
    /// Everything was uploaded but the sync mark could not be written
    MarkFailed { report: SyncReport, error: MarkError },
}

impl SyncOutcome {
    /// True if the content is in the remote store after this call
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            SyncOutcome::Synced(_) | SyncOutcome::AlreadySynced | SyncOutcome::MarkFailed { .. }
        )
    }

    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Synced(report) | SyncOutcome::MarkFailed { report, .. } => Some(report),
            SyncOutcome::AlreadySynced | SyncOutcome::Ignored => None,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Five hex digits, enough to tell concurrent jobs apart in the logs
fn new_job_id() -> String {
    format!("{:05x}", uuid::Uuid::new_v4().as_u128() & 0xfffff)
}

/// Makes `path` absolute against the working directory and cleans it
/// lexically (no `.`/`..` components, no trailing separator)
pub fn normalize_path(path: &Path) -> std::io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut clean = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                clean.pop();
            }
            other => clean.push(other.as_os_str()),
        }
    }
    Ok(clean)
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ============================================================================
// SyncOrchestrator
// ============================================================================

/// Entry point of the sync engine
///
/// Cheap to share behind an `Arc`; the resolution cache lives as long as the
/// orchestrator, so repeated syncs (watch mode) resolve each category once.
pub struct SyncOrchestrator {
    resolver: Arc<RemoteLocationResolver>,
    uploader: Arc<ContentUploader>,
    marker: IdempotencyMarker,
    retry: RetryExecutor,
    ignore: IgnoreSet,
    upload_limit: Option<Arc<Semaphore>>,
    cancel: CancellationToken,
}

impl SyncOrchestrator {
    /// Builds an orchestrator from the loaded configuration
    pub fn new(
        store: Arc<dyn RemoteStore>,
        config: &Config,
        confirm: Arc<dyn Confirm>,
        cancel: CancellationToken,
    ) -> Self {
        Self::with_cache(store, config, confirm, cancel, Arc::new(ResolutionCache::new()))
    }

    /// Same as [`new`](Self::new) with a caller-provided resolution cache
    pub fn with_cache(
        store: Arc<dyn RemoteStore>,
        config: &Config,
        confirm: Arc<dyn Confirm>,
        cancel: CancellationToken,
        cache: Arc<ResolutionCache>,
    ) -> Self {
        let retry = RetryExecutor::new(RetryPolicy::from(&config.retry), cancel.clone());
        let resolver = RemoteLocationResolver::new(
            Arc::clone(&store),
            cache,
            confirm,
            retry.clone(),
            config.remote.archive_root.clone(),
            config.remote.create_missing,
        );
        let uploader = ContentUploader::new(store, config.sync.force_recheck);

        Self {
            resolver: Arc::new(resolver),
            uploader: Arc::new(uploader),
            marker: IdempotencyMarker::new(),
            retry,
            ignore: IgnoreSet::new(config.sync.ignore.iter().cloned()),
            upload_limit: config
                .sync
                .max_concurrent_uploads
                .map(|n| Arc::new(Semaphore::new(n.max(1)))),
            cancel,
        }
    }

    pub fn ignore_set(&self) -> &IgnoreSet {
        &self.ignore
    }

    // ========================================================================
    // sync() / sync_with_guess()
    // ========================================================================

    /// Syncs a file or a directory tree into `category`
    pub async fn sync(&self, path: &Path, category: &Category) -> Result<SyncOutcome, SyncError> {
        let path = normalize_path(path).map_err(|source| SyncError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        if self.ignore.is_ignored_path(&path) {
            debug!(path = %path.display(), "Ignored path");
            return Ok(SyncOutcome::Ignored);
        }

        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|source| SyncError::Io {
                path: path.clone(),
                source,
            })?;

        if meta.is_dir() {
            self.sync_directory(&path, category).await
        } else if meta.is_file() {
            self.sync_file(&path, category).await
        } else {
            Err(SyncError::UnsupportedFileType(path))
        }
    }

    /// Syncs `path` into the category `guesser` picks from its basename
    pub async fn sync_with_guess(
        &self,
        path: &Path,
        guesser: &dyn CategoryGuesser,
    ) -> Result<SyncOutcome, SyncError> {
        let category = guesser.guess(&basename(path));
        debug!(path = %path.display(), category = %category, "Guessed category");
        self.sync(path, &category).await
    }

    /// Syncs every direct child of `dir`, each as its own unit
    ///
    /// Units are synced concurrently. Results come back in lexical order of
    /// the children; a failing child does not stop the others.
    pub async fn sync_children(
        self: &Arc<Self>,
        dir: &Path,
        guesser: Arc<dyn CategoryGuesser>,
    ) -> Result<Vec<(PathBuf, Result<SyncOutcome, SyncError>)>, SyncError> {
        let io_err = |source| SyncError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut entries = tokio::fs::read_dir(dir).await.map_err(io_err)?;
        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            children.push(entry.path());
        }
        children.sort();

        let mut set = JoinSet::new();
        for (index, child) in children.into_iter().enumerate() {
            let this = Arc::clone(self);
            let guesser = Arc::clone(&guesser);
            set.spawn(async move {
                let result = this.sync_with_guess(&child, guesser.as_ref()).await;
                (index, child, result)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = set.join_next().await {
            let (index, child, result) =
                joined.map_err(|e| SyncError::TaskFailed(e.to_string()))?;
            results.push((index, child, result));
        }
        results.sort_by_key(|(index, _, _)| *index);
        Ok(results
            .into_iter()
            .map(|(_, child, result)| (child, result))
            .collect())
    }

    // ========================================================================
    // sync_file()
    // ========================================================================

    /// Syncs a single file into `category`
    pub async fn sync_file(&self, path: &Path, category: &Category) -> Result<SyncOutcome, SyncError> {
        let job = new_job_id();
        let started = Instant::now();

        if self.ignore.is_ignored_path(path) {
            debug!(job = %job, path = %path.display(), "Ignored file");
            return Ok(SyncOutcome::Ignored);
        }
        if self.is_marked(path, UnitKind::File).await? {
            info!(job = %job, path = %path.display(), "Already synced");
            return Ok(SyncOutcome::AlreadySynced);
        }

        info!(job = %job, path = %path.display(), category = %category, "Syncing file");
        let parent = self.resolve(&job, category).await?;

        self.retry
            .with_retry(&job, "upload_file", StoreError::is_transient, || {
                self.uploader.upload_file(path, &parent)
            })
            .await
            .map_err(|source| {
                self.unless_cancelled(SyncError::Upload {
                    path: path.to_path_buf(),
                    source,
                })
            })?;

        let report = SyncReport {
            job: job.clone(),
            files_uploaded: 1,
            folders_created: 0,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        Ok(self.finish(path, UnitKind::File, report).await)
    }

    // ========================================================================
    // sync_directory()
    // ========================================================================

    /// Syncs a directory tree into `category`
    ///
    /// The tree's root becomes a folder inside the category folder.
    pub async fn sync_directory(
        &self,
        path: &Path,
        category: &Category,
    ) -> Result<SyncOutcome, SyncError> {
        let job = new_job_id();
        let started = Instant::now();

        if self.is_marked(path, UnitKind::Directory).await? {
            info!(job = %job, path = %path.display(), "Already synced");
            return Ok(SyncOutcome::AlreadySynced);
        }

        info!(job = %job, path = %path.display(), category = %category, "Syncing directory");
        let category_id = self.resolve(&job, category).await?;

        // Aborts the walk once an upload fails for good
        let failed = self.cancel.child_token();
        let mut uploads: JoinSet<Result<(), SyncError>> = JoinSet::new();
        let mut folders: HashMap<PathBuf, FolderId> = HashMap::new();
        let mut folders_created = 0u32;
        let mut files_queued = 0u32;

        let mut walker = TreeWalker::new(path, self.ignore.clone());
        let walk_result: Result<(), SyncError> = async {
            while let Some(entry) = walker.next_entry().await {
                if failed.is_cancelled() {
                    break;
                }
                let entry = entry.map_err(|source| SyncError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;

                let entry_path = entry.path().to_path_buf();
                let parent_id = if entry_path == path {
                    category_id.clone()
                } else {
                    entry_path
                        .parent()
                        .and_then(|p| folders.get(p))
                        .cloned()
                        .ok_or_else(|| {
                            SyncError::TaskFailed(format!(
                                "no remote folder recorded for parent of {}",
                                entry_path.display()
                            ))
                        })?
                };

                match entry {
                    WalkEntry::Directory(dir) => {
                        let name = basename(&dir);
                        let id = self
                            .retry
                            .with_retry(&job, "create_folder", StoreError::is_transient, || {
                                self.uploader.create_folder(&name, &parent_id)
                            })
                            .await
                            .map_err(|source| {
                                self.unless_cancelled(SyncError::CreateFolder {
                                    path: dir.clone(),
                                    source,
                                })
                            })?;
                        debug!(job = %job, path = %dir.display(), id = %id, "Created folder");
                        folders.insert(dir, id);
                        folders_created += 1;
                    }
                    WalkEntry::File(file) => {
                        files_queued += 1;
                        uploads.spawn(upload_task(
                            job.clone(),
                            file,
                            parent_id,
                            Arc::clone(&self.uploader),
                            self.retry.clone(),
                            self.upload_limit.clone(),
                            failed.clone(),
                        ));
                    }
                }
            }
            Ok(())
        }
        .await;

        if walk_result.is_err() {
            failed.cancel();
            uploads.abort_all();
        }
        let join_result = join_uploads(&mut uploads, &failed).await;

        walk_result?;
        join_result?;
        if self.cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let report = SyncReport {
            job: job.clone(),
            files_uploaded: files_queued,
            folders_created,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        Ok(self.finish(path, UnitKind::Directory, report).await)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn is_marked(&self, path: &Path, kind: UnitKind) -> Result<bool, SyncError> {
        self.marker
            .is_marked(path, kind)
            .await
            .map_err(|source| SyncError::MarkCheck {
                path: path.to_path_buf(),
                source,
            })
    }

    async fn resolve(&self, job: &str, category: &Category) -> Result<FolderId, SyncError> {
        self.resolver
            .resolve(job, category)
            .await
            .map_err(|source| {
                self.unless_cancelled(SyncError::Resolve {
                    category: category.clone(),
                    source,
                })
            })
    }

    /// A retry cut short by cancellation returns its last remote error;
    /// report it as [`SyncError::Cancelled`] instead
    fn unless_cancelled(&self, err: SyncError) -> SyncError {
        if self.cancel.is_cancelled() {
            SyncError::Cancelled
        } else {
            err
        }
    }

    async fn finish(&self, path: &Path, kind: UnitKind, report: SyncReport) -> SyncOutcome {
        match self.marker.mark(path, kind).await {
            Ok(()) => {
                info!(
                    job = %report.job,
                    path = %path.display(),
                    files = report.files_uploaded,
                    folders = report.folders_created,
                    duration_ms = report.duration_ms,
                    "Sync finished"
                );
                SyncOutcome::Synced(report)
            }
            Err(error) => {
                warn!(
                    job = %report.job,
                    path = %path.display(),
                    error = %error,
                    "Sync succeeded, yet failed to set sync mark"
                );
                SyncOutcome::MarkFailed { report, error }
            }
        }
    }
}

/// Uploads one file of a directory sync
///
/// On a fatal failure the shared `failed` token is cancelled so the walk
/// stops queueing work.
async fn upload_task(
    job: String,
    file: PathBuf,
    parent: FolderId,
    uploader: Arc<ContentUploader>,
    retry: RetryExecutor,
    limit: Option<Arc<Semaphore>>,
    failed: CancellationToken,
) -> Result<(), SyncError> {
    let _permit = match limit {
        Some(semaphore) => Some(
            semaphore
                .acquire_owned()
                .await
                .map_err(|e| SyncError::TaskFailed(e.to_string()))?,
        ),
        None => None,
    };

    let result = retry
        .with_retry(&job, "upload_file", StoreError::is_transient, || {
            uploader.upload_file(&file, &parent)
        })
        .await;

    match result {
        Ok(id) => {
            debug!(job = %job, path = %file.display(), id = %id, "Uploaded file");
            Ok(())
        }
        Err(_) if retry.cancel_token().is_cancelled() => Err(SyncError::Cancelled),
        Err(source) => {
            failed.cancel();
            Err(SyncError::Upload { path: file, source })
        }
    }
}

/// Waits for every upload; returns the first failure after aborting the rest
async fn join_uploads(
    uploads: &mut JoinSet<Result<(), SyncError>>,
    failed: &CancellationToken,
) -> Result<(), SyncError> {
    let mut first_error: Option<SyncError> = None;

    while let Some(joined) = uploads.join_next().await {
        let result = match joined {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => continue,
            Err(e) => Err(SyncError::TaskFailed(e.to_string())),
        };

        if let Err(err) = result {
            if first_error.is_none() {
                warn!(error = %err, "Upload failed, aborting remaining uploads");
                failed.cancel();
                uploads.abort_all();
                first_error = Some(err);
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
