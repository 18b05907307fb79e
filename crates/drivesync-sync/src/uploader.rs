//! Content upload
//!
//! Uploads one local file into a remote folder. With verification enabled,
//! the upload and a streaming MD5 of the local file run concurrently (the
//! hash on the blocking pool) and the two digests are compared once both
//! finish. A mismatch, including a missing remote checksum, is reported as
//! [`StoreError::ChecksumMismatch`], which the retry executor treats as
//! transient.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use drivesync_core::domain::newtypes::{FileId, FolderId, Md5Checksum};
use drivesync_core::ports::{LocalFile, RemoteStore, StoreError};
use md5::{Digest, Md5};
use tracing::debug;

/// Read buffer for hashing
const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Fallback MIME type for unknown extensions
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Returns the MIME type for `path` based on its extension
pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.to_ascii_lowercase(),
        None => return DEFAULT_MIME_TYPE,
    };

    match ext.as_str() {
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "htm" | "html" => "text/html",
        "css" => "text/css",
        "js" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "odt" => "application/vnd.oasis.opendocument.text",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "heic" => "image/heic",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        _ => DEFAULT_MIME_TYPE,
    }
}

/// Streams `path` through MD5 on the blocking pool
pub async fn md5_file(path: &Path) -> Result<Md5Checksum, StoreError> {
    let owned: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut file =
            std::fs::File::open(&owned).map_err(|e| StoreError::local_io(&owned, &e))?;
        let mut hasher = Md5::new();
        let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
        loop {
            let n = file
                .read(&mut buffer)
                .map_err(|e| StoreError::local_io(&owned, &e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
        let mut digest = [0u8; 16];
        digest.copy_from_slice(&hasher.finalize());
        Ok(Md5Checksum::from_digest(&digest))
    })
    .await
    .map_err(|e| StoreError::LocalIo {
        path: path.to_path_buf(),
        message: format!("hash task failed: {e}"),
    })?
}

/// Uploads files and creates folders in the remote store
pub struct ContentUploader {
    store: Arc<dyn RemoteStore>,
    force_recheck: bool,
}

impl ContentUploader {
    pub fn new(store: Arc<dyn RemoteStore>, force_recheck: bool) -> Self {
        Self {
            store,
            force_recheck,
        }
    }

    /// Creates a folder with one create call; no duplicate check
    pub async fn create_folder(&self, name: &str, parent: &FolderId) -> Result<FolderId, StoreError> {
        self.store.create_folder(name, parent).await
    }

    /// Uploads the file at `local_path` into `parent`
    pub async fn upload_file(&self, local_path: &Path, parent: &FolderId) -> Result<FileId, StoreError> {
        let name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| StoreError::LocalIo {
                path: local_path.to_path_buf(),
                message: "path has no file name".to_string(),
            })?;
        let meta = tokio::fs::metadata(local_path)
            .await
            .map_err(|e| StoreError::local_io(local_path, &e))?;
        let file = LocalFile {
            path: local_path.to_path_buf(),
            size: meta.len(),
        };
        let size = file.size;
        let mime_type = mime_type_for(local_path);

        if !self.force_recheck {
            let created = self
                .store
                .create_file(&name, parent, &file, mime_type)
                .await?;
            debug!(path = %local_path.display(), id = %created.id, size, "Uploaded file");
            return Ok(created.id);
        }

        let (created, local_sum) = tokio::join!(
            self.store.create_file(&name, parent, &file, mime_type),
            md5_file(local_path),
        );
        let created = created?;
        let local_sum = local_sum?;

        let matches = created
            .md5_checksum
            .as_deref()
            .is_some_and(|remote| remote.eq_ignore_ascii_case(local_sum.as_str()));
        if !matches {
            return Err(StoreError::ChecksumMismatch {
                remote: created.md5_checksum,
                local: local_sum.to_string(),
            });
        }

        debug!(
            path = %local_path.display(),
            id = %created.id,
            size,
            md5 = %local_sum,
            "Uploaded and verified file"
        );
        Ok(created.id)
    }
}
