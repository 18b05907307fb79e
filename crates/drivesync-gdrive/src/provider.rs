//! DriveRemoteStore - RemoteStore implementation for Google Drive
//!
//! Wraps the [`DriveClient`] and converts between Drive's string ids and the
//! core newtypes, mapping [`DriveError`](crate::DriveError) into
//! [`StoreError`] so the retry executor can classify failures.

use drivesync_core::domain::newtypes::{FileId, FolderId};
use drivesync_core::ports::remote_store::{CreatedFile, LocalFile, RemoteStore, StoreError};
use tracing::debug;

use crate::client::DriveClient;

/// Converts an id returned by Drive into a typed id, treating garbage as an
/// invalid response
fn parse_id<T, F>(raw: String, make: F) -> Result<T, StoreError>
where
    F: FnOnce(String) -> Result<T, drivesync_core::domain::DomainError>,
{
    make(raw).map_err(|e| StoreError::InvalidResponse(e.to_string()))
}

/// Remote store backed by Google Drive v3
pub struct DriveRemoteStore {
    client: DriveClient,
}

impl DriveRemoteStore {
    /// Creates a new `DriveRemoteStore` wrapping the given [`DriveClient`]
    pub fn new(client: DriveClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl RemoteStore for DriveRemoteStore {
    async fn list_folders(
        &self,
        name: &str,
        parent: &FolderId,
    ) -> Result<Vec<FolderId>, StoreError> {
        let ids = self.client.list_folders(name, parent.as_str()).await?;
        debug!(name, parent = %parent, found = ids.len(), "DriveRemoteStore::list_folders");
        ids.into_iter()
            .map(|id| parse_id(id, FolderId::new))
            .collect()
    }

    async fn create_folder(&self, name: &str, parent: &FolderId) -> Result<FolderId, StoreError> {
        let id = self.client.create_folder(name, parent.as_str()).await?;
        debug!(name, parent = %parent, id = %id, "DriveRemoteStore::create_folder");
        parse_id(id, FolderId::new)
    }

    async fn create_file(
        &self,
        name: &str,
        parent: &FolderId,
        file: &LocalFile,
        mime_type: &str,
    ) -> Result<CreatedFile, StoreError> {
        let uploaded = self
            .client
            .create_file(name, parent.as_str(), file, mime_type)
            .await?;
        debug!(name, parent = %parent, id = %uploaded.id, "DriveRemoteStore::create_file");
        Ok(CreatedFile {
            id: parse_id(uploaded.id, FileId::new)?,
            md5_checksum: uploaded.md5_checksum,
        })
    }

    async fn delete_object(&self, id: &str) -> Result<(), StoreError> {
        self.client.delete(id).await?;
        debug!(id, "DriveRemoteStore::delete_object");
        Ok(())
    }

    async fn trash_object(&self, id: &str) -> Result<(), StoreError> {
        self.client.trash(id).await?;
        debug!(id, "DriveRemoteStore::trash_object");
        Ok(())
    }
}
