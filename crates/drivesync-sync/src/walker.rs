//! Local tree walk
//!
//! [`TreeWalker`] yields the entries of a directory tree depth-first in
//! pre-order: a directory always comes before its children, and siblings come
//! in lexical order. Entries named in the [`IgnoreSet`] are skipped together
//! with their subtrees.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::lock::LOCK_FILE_NAME;
use crate::marker::MARK_PREFIX;

/// Basenames that are never synced
pub const DEFAULT_IGNORES: &[&str] = &[
    ".DS_Store",
    ".localized",
    ".idea",
    ".git",
    LOCK_FILE_NAME,
];

/// Set of ignored basenames
///
/// Besides the listed names, every basename starting with the sync mark
/// prefix is ignored.
#[derive(Debug, Clone)]
pub struct IgnoreSet {
    names: HashSet<String>,
}

impl Default for IgnoreSet {
    fn default() -> Self {
        Self::new(std::iter::empty::<String>())
    }
}

impl IgnoreSet {
    /// Built-in ignores plus `extra`
    pub fn new<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: HashSet<String> = DEFAULT_IGNORES.iter().map(|s| s.to_string()).collect();
        names.extend(extra.into_iter().map(Into::into));
        Self { names }
    }

    pub fn is_ignored(&self, basename: &str) -> bool {
        basename.starts_with(MARK_PREFIX) || self.names.contains(basename)
    }

    /// Checks the final component of `path`; paths without one are kept
    pub fn is_ignored_path(&self, path: &Path) -> bool {
        path.file_name()
            .map(|name| self.is_ignored(&name.to_string_lossy()))
            .unwrap_or(false)
    }
}

/// One entry produced by the walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEntry {
    Directory(PathBuf),
    File(PathBuf),
}

impl WalkEntry {
    pub fn path(&self) -> &Path {
        match self {
            WalkEntry::Directory(p) | WalkEntry::File(p) => p,
        }
    }
}

/// Lazy pre-order walk over a local directory tree
///
/// The root is yielded first as a directory, following the root itself if
/// it is a symlink. Below the root, symlinks to regular files are yielded as
/// files and symlinks to directories are not followed.
pub struct TreeWalker {
    root: PathBuf,
    stack: Vec<PathBuf>,
    ignore: IgnoreSet,
}

impl TreeWalker {
    pub fn new(root: impl Into<PathBuf>, ignore: IgnoreSet) -> Self {
        let root = root.into();
        Self {
            stack: vec![root.clone()],
            root,
            ignore,
        }
    }

    /// Returns the next entry, or `None` once the tree is exhausted
    ///
    /// An error stops nothing by itself; the caller decides whether to keep
    /// pulling entries.
    pub async fn next_entry(&mut self) -> Option<io::Result<WalkEntry>> {
        loop {
            let path = self.stack.pop()?;
            match self.classify(&path).await {
                Ok(Some(WalkEntry::Directory(dir))) => {
                    if let Err(e) = self.push_children(&dir).await {
                        return Some(Err(e));
                    }
                    return Some(Ok(WalkEntry::Directory(dir)));
                }
                Ok(Some(file)) => return Some(Ok(file)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }

    async fn classify(&self, path: &Path) -> io::Result<Option<WalkEntry>> {
        let meta = if path == self.root {
            tokio::fs::metadata(path).await?
        } else {
            tokio::fs::symlink_metadata(path).await?
        };
        if meta.is_dir() {
            return Ok(Some(WalkEntry::Directory(path.to_path_buf())));
        }
        if meta.is_file() {
            return Ok(Some(WalkEntry::File(path.to_path_buf())));
        }
        if meta.file_type().is_symlink() {
            if let Ok(target) = tokio::fs::metadata(path).await {
                if target.is_file() {
                    return Ok(Some(WalkEntry::File(path.to_path_buf())));
                }
            }
        }
        debug!(path = %path.display(), "Skipping special file");
        Ok(None)
    }

    async fn push_children(&mut self, dir: &Path) -> io::Result<()> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if self.ignore.is_ignored(&name.to_string_lossy()) {
                debug!(path = %entry.path().display(), "Ignoring entry");
                continue;
            }
            children.push(entry.path());
        }
        children.sort();
        // Reverse so that popping yields lexical order
        self.stack.extend(children.into_iter().rev());
        Ok(())
    }
}
