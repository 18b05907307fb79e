//! Shared helpers for sync engine integration tests
//!
//! [`MemoryStore`] is an in-memory [`RemoteStore`] that records every call so
//! tests can assert on exact remote traffic.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use drivesync_core::config::{Config, ConfigBuilder};
use drivesync_core::domain::newtypes::{FileId, FolderId};
use drivesync_core::ports::{CreatedFile, LocalFile, RemoteStore, StoreError};
use md5::{Digest, Md5};

/// What checksum the fake reports for uploaded content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumMode {
    Correct,
    Wrong,
    Missing,
}

#[derive(Debug, Clone)]
pub struct RemoteFolder {
    pub id: FolderId,
    pub name: String,
    pub parent: FolderId,
}

#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub name: String,
    pub parent: FolderId,
    pub content: Vec<u8>,
    pub mime_type: String,
}

#[derive(Default)]
struct State {
    folders: Vec<RemoteFolder>,
    files: Vec<RemoteFile>,
    next_id: usize,
    list_calls: Vec<String>,
    list_failures: usize,
    upload_errors: HashMap<String, StoreError>,
    remove_on_upload: Option<PathBuf>,
}

pub struct MemoryStore {
    state: Mutex<State>,
    checksum: Mutex<ChecksumMode>,
    list_delay: Mutex<Option<Duration>>,
    upload_delay: Mutex<Option<Duration>>,
    uploads_in_flight: AtomicUsize,
    pub peak_uploads: AtomicUsize,
    pub create_folder_calls: AtomicUsize,
    pub create_file_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::default()),
            checksum: Mutex::new(ChecksumMode::Correct),
            list_delay: Mutex::new(None),
            upload_delay: Mutex::new(None),
            uploads_in_flight: AtomicUsize::new(0),
            peak_uploads: AtomicUsize::new(0),
            create_folder_calls: AtomicUsize::new(0),
            create_file_calls: AtomicUsize::new(0),
        })
    }

    /// Seeds an existing folder and returns its id
    pub fn add_folder(&self, name: &str, parent: &FolderId) -> FolderId {
        let mut state = self.state.lock().unwrap();
        let id = next_folder_id(&mut state);
        state.folders.push(RemoteFolder {
            id: id.clone(),
            name: name.to_string(),
            parent: parent.clone(),
        });
        id
    }

    pub fn set_checksum_mode(&self, mode: ChecksumMode) {
        *self.checksum.lock().unwrap() = mode;
    }

    /// Makes every `list_folders` call sleep first
    pub fn set_list_delay(&self, delay: Duration) {
        *self.list_delay.lock().unwrap() = Some(delay);
    }

    /// Makes every `create_file` call sleep first
    pub fn set_upload_delay(&self, delay: Duration) {
        *self.upload_delay.lock().unwrap() = Some(delay);
    }

    /// Makes the next `n` `list_folders` calls fail with a 503
    pub fn fail_next_lists(&self, n: usize) {
        self.state.lock().unwrap().list_failures = n;
    }

    /// Makes every upload of a file named `name` fail with `error`
    pub fn fail_upload_of(&self, name: &str, error: StoreError) {
        self.state
            .lock()
            .unwrap()
            .upload_errors
            .insert(name.to_string(), error);
    }

    /// Removes `path` from the local disk while an upload is in flight
    pub fn remove_on_upload(&self, path: PathBuf) {
        self.state.lock().unwrap().remove_on_upload = Some(path);
    }

    pub fn folders(&self) -> Vec<RemoteFolder> {
        self.state.lock().unwrap().folders.clone()
    }

    pub fn files(&self) -> Vec<RemoteFile> {
        self.state.lock().unwrap().files.clone()
    }

    /// Names passed to `list_folders`, in call order
    pub fn list_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().list_calls.clone()
    }

    pub fn folder_named(&self, name: &str) -> Option<RemoteFolder> {
        self.folders().into_iter().find(|f| f.name == name)
    }

    pub fn file_named(&self, name: &str) -> Option<RemoteFile> {
        self.files().into_iter().find(|f| f.name == name)
    }

    /// Total number of remote calls of any kind
    pub fn total_calls(&self) -> usize {
        self.list_calls().len()
            + self.create_folder_calls.load(Ordering::SeqCst)
            + self.create_file_calls.load(Ordering::SeqCst)
    }
}

fn next_folder_id(state: &mut State) -> FolderId {
    state.next_id += 1;
    FolderId::new(format!("folder-{}", state.next_id)).unwrap()
}

#[async_trait::async_trait]
impl RemoteStore for MemoryStore {
    async fn list_folders(
        &self,
        name: &str,
        parent: &FolderId,
    ) -> Result<Vec<FolderId>, StoreError> {
        let delay = *self.list_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        state.list_calls.push(name.to_string());
        if state.list_failures > 0 {
            state.list_failures -= 1;
            return Err(StoreError::Api {
                status: 503,
                message: "Backend Error".to_string(),
            });
        }
        Ok(state
            .folders
            .iter()
            .filter(|f| f.name == name && &f.parent == parent)
            .map(|f| f.id.clone())
            .collect())
    }

    async fn create_folder(&self, name: &str, parent: &FolderId) -> Result<FolderId, StoreError> {
        self.create_folder_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.add_folder(name, parent))
    }

    async fn create_file(
        &self,
        name: &str,
        parent: &FolderId,
        file: &LocalFile,
        mime_type: &str,
    ) -> Result<CreatedFile, StoreError> {
        self.create_file_calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.uploads_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_uploads.fetch_max(in_flight, Ordering::SeqCst);
        let delay = *self.upload_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.uploads_in_flight.fetch_sub(1, Ordering::SeqCst);

        let content =
            std::fs::read(&file.path).map_err(|e| StoreError::local_io(&file.path, &e))?;
        let mode = *self.checksum.lock().unwrap();

        let mut state = self.state.lock().unwrap();
        if let Some(path) = state.remove_on_upload.take() {
            std::fs::remove_dir_all(&path).unwrap();
        }
        if let Some(err) = state.upload_errors.get(name) {
            return Err(err.clone());
        }

        let md5_checksum = match mode {
            ChecksumMode::Correct => Some(hex_md5(&content)),
            ChecksumMode::Wrong => Some("0".repeat(32)),
            ChecksumMode::Missing => None,
        };
        state.next_id += 1;
        let id = FileId::new(format!("file-{}", state.next_id)).unwrap();
        state.files.push(RemoteFile {
            name: name.to_string(),
            parent: parent.clone(),
            content,
            mime_type: mime_type.to_string(),
        });
        Ok(CreatedFile { id, md5_checksum })
    }

    async fn delete_object(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.folders.retain(|f| f.id.as_str() != id);
        Ok(())
    }

    async fn trash_object(&self, id: &str) -> Result<(), StoreError> {
        self.delete_object(id).await
    }
}

fn hex_md5(content: &[u8]) -> String {
    Md5::digest(content)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Config with folder creation allowed and zero backoff
pub fn test_config() -> Config {
    test_config_builder().build()
}

pub fn test_config_builder() -> ConfigBuilder {
    ConfigBuilder::new()
        .archive_root("archive")
        .create_missing(true)
        .retry_starting_delay_secs(0)
        .retry_max_attempts(Some(3))
}
