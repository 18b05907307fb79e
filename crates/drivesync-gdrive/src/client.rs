//! Google Drive v3 API client
//!
//! Provides a typed HTTP client for the Drive v3 `files` resource.
//! Handles authentication headers, error envelopes, and uploads:
//! - files up to the resumable threshold go in one `multipart` request
//! - larger files are streamed through a resumable session, one chunk in
//!   memory at a time
//!
//! ## Usage
//!
//! ```rust,no_run
//! use drivesync_gdrive::client::DriveClient;
//!
//! # async fn example() -> Result<(), drivesync_gdrive::DriveError> {
//! let client = DriveClient::new("access-token-here");
//! let ids = client.list_folders("archive", "root").await?;
//! println!("found {} archive folders", ids.len());
//! # Ok(())
//! # }
//! ```

use std::io::SeekFrom;
use std::path::Path;

use drivesync_core::ports::LocalFile;
use reqwest::header::{CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info};

use crate::DriveError;

/// Base URL for Google APIs
const GOOGLE_API_BASE_URL: &str = "https://www.googleapis.com";

/// Path of the Drive v3 `files` collection
const FILES_PATH: &str = "/drive/v3/files";

/// Path of the Drive v3 media upload endpoint
const UPLOAD_PATH: &str = "/upload/drive/v3/files";

/// MIME type Google uses to mark folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Files larger than this are uploaded through a resumable session
pub const DEFAULT_RESUMABLE_THRESHOLD: u64 = 5 * 1024 * 1024;

/// Chunk size for resumable uploads: 8 MiB
///
/// Drive requires every chunk but the last to be a multiple of 256 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Consecutive chunks Drive may acknowledge without progress before giving up
const MAX_STALLED_CHUNKS: u32 = 3;

// ============================================================================
// Drive API response types
// ============================================================================

/// Response from `files.list`
#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileRef>,
}

/// Minimal file resource with only the id requested
#[derive(Debug, Deserialize)]
struct FileRef {
    id: String,
}

/// File resource returned by an upload with `fields=id,md5Checksum`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// Drive file id
    pub id: String,
    /// MD5 of the stored content, lowercase hex
    pub md5_checksum: Option<String>,
}

/// Answer to one chunk of a resumable upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkStatus {
    /// Drive persisted bytes up to `next_offset` (exclusive) and wants more
    Incomplete { next_offset: u64 },
    /// The last byte arrived and the file was created
    Complete(UploadedFile),
}

/// Google's JSON error envelope: `{"error": {"code": 403, "message": "..."}}`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

// ============================================================================
// Query helpers
// ============================================================================

/// Escapes a value for use inside a single-quoted Drive query string
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Builds the `q` parameter selecting live folders named `name` under `parent`
pub fn folder_query(name: &str, parent: &str) -> String {
    format!(
        "'{}' in parents and name='{}' and mimeType='{}' and trashed=false",
        escape_query_value(parent),
        escape_query_value(name),
        FOLDER_MIME_TYPE
    )
}

/// Assembles a `multipart/related` body of JSON metadata followed by media
///
/// Returns the body; the caller sets `Content-Type: multipart/related; boundary=<boundary>`.
pub fn multipart_related_body(
    boundary: &str,
    metadata: &serde_json::Value,
    content: &[u8],
    mime_type: &str,
) -> Vec<u8> {
    let mut body = Vec::with_capacity(content.len() + 512);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
    body.extend_from_slice(format!("Content-Type: {mime_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

/// Formats the `Content-Range` of a chunk covering `len` bytes at `offset`
pub fn content_range(offset: u64, len: usize, total: u64) -> String {
    format!("bytes {}-{}/{}", offset, offset + len as u64 - 1, total)
}

/// Parses the `Range: bytes=0-N` header of a `308 Resume Incomplete` answer
///
/// Returns the offset of the first byte Drive does not have yet. A missing
/// header means nothing was persisted.
pub fn next_offset_from_range(range: Option<&str>) -> Option<u64> {
    let Some(range) = range else {
        return Some(0);
    };
    let end = range.strip_prefix("bytes=")?.split_once('-')?.1;
    end.trim().parse::<u64>().ok().map(|last| last + 1)
}

fn local_io(path: &Path, source: std::io::Error) -> DriveError {
    DriveError::LocalIo {
        path: path.to_path_buf(),
        source,
    }
}

// ============================================================================
// DriveClient
// ============================================================================

/// HTTP client for Google Drive v3 calls
///
/// Wraps `reqwest::Client` with bearer authentication and base URL
/// construction. Cloning is cheap; the underlying connection pool is shared.
#[derive(Clone)]
pub struct DriveClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for API requests (scheme and host)
    base_url: String,
    /// OAuth2 access token
    access_token: String,
    /// Files above this size use a resumable session
    resumable_threshold: u64,
    /// Bytes sent per resumable chunk
    chunk_size: usize,
}

impl DriveClient {
    /// Creates a new DriveClient with the given access token
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, GOOGLE_API_BASE_URL)
    }

    /// Creates a new DriveClient with a custom base URL (useful for testing)
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            resumable_threshold: DEFAULT_RESUMABLE_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Overrides the resumable threshold and chunk size
    pub fn with_upload_limits(mut self, resumable_threshold: u64, chunk_size: usize) -> Self {
        self.resumable_threshold = resumable_threshold;
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Returns a reference to the current access token
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the base URL for API requests
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates an authenticated request builder for the given method and path
    ///
    /// Automatically prepends the base URL and adds the Authorization header.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, &url)
            .bearer_auth(&self.access_token)
    }

    /// Lists ids of non-trashed folders named `name` directly under `parent`
    ///
    /// `parent` may be the alias `root`.
    pub async fn list_folders(&self, name: &str, parent: &str) -> Result<Vec<String>, DriveError> {
        let query = folder_query(name, parent);
        debug!(name, parent, "Listing folders");

        let response = self
            .request(Method::GET, FILES_PATH)
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id)"),
                ("spaces", "drive"),
            ])
            .send()
            .await?;

        let list: FileList = check_status(response).await?.json().await?;
        Ok(list.files.into_iter().map(|f| f.id).collect())
    }

    /// Creates a folder and returns its id
    ///
    /// The folder description is set to its name.
    pub async fn create_folder(&self, name: &str, parent: &str) -> Result<String, DriveError> {
        debug!(name, parent, "Creating folder");

        let metadata = serde_json::json!({
            "name": name,
            "description": name,
            "mimeType": FOLDER_MIME_TYPE,
            "parents": [parent],
        });

        let response = self
            .request(Method::POST, FILES_PATH)
            .query(&[("fields", "id")])
            .json(&metadata)
            .send()
            .await?;

        let created: FileRef = check_status(response).await?.json().await?;
        Ok(created.id)
    }

    /// Uploads `file` into `parent`
    ///
    /// Small files go in a single multipart request, larger ones through a
    /// resumable session. Either way the response carries `md5Checksum` so
    /// callers can verify integrity.
    pub async fn create_file(
        &self,
        name: &str,
        parent: &str,
        file: &LocalFile,
        mime_type: &str,
    ) -> Result<UploadedFile, DriveError> {
        let uploaded = if file.size > self.resumable_threshold {
            self.upload_resumable(name, parent, file, mime_type).await?
        } else {
            self.upload_multipart(name, parent, file, mime_type).await?
        };
        if uploaded.id.is_empty() {
            return Err(DriveError::InvalidResponse(
                "upload response carried an empty id".to_string(),
            ));
        }
        Ok(uploaded)
    }

    /// Uploads a small file with a single `multipart/related` request
    pub async fn upload_multipart(
        &self,
        name: &str,
        parent: &str,
        file: &LocalFile,
        mime_type: &str,
    ) -> Result<UploadedFile, DriveError> {
        debug!(name, parent, size = file.size, mime_type, "Uploading file");
        let content = tokio::fs::read(&file.path)
            .await
            .map_err(|e| local_io(&file.path, e))?;

        let metadata = serde_json::json!({
            "name": name,
            "parents": [parent],
        });
        let boundary = format!("drivesync-{}", uuid::Uuid::new_v4().simple());
        let body = multipart_related_body(&boundary, &metadata, &content, mime_type);
        drop(content);

        let response = self
            .request(Method::POST, UPLOAD_PATH)
            .query(&[("uploadType", "multipart"), ("fields", "id,md5Checksum")])
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }

    /// Opens a resumable upload session and returns its URL
    pub async fn create_upload_session(
        &self,
        name: &str,
        parent: &str,
        size: u64,
        mime_type: &str,
    ) -> Result<String, DriveError> {
        debug!(name, parent, size, "Creating upload session");

        let metadata = serde_json::json!({
            "name": name,
            "parents": [parent],
        });
        let response = self
            .request(Method::POST, UPLOAD_PATH)
            .query(&[("uploadType", "resumable"), ("fields", "id,md5Checksum")])
            .header("X-Upload-Content-Type", mime_type)
            .header("X-Upload-Content-Length", size.to_string())
            .json(&metadata)
            .send()
            .await?;

        let response = check_status(response).await?;
        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                DriveError::InvalidResponse(
                    "upload session response carried no Location header".to_string(),
                )
            })
    }

    /// Sends one chunk starting at `offset` to an upload session
    ///
    /// Session URLs are absolute, so the base URL is not prepended.
    pub async fn upload_chunk(
        &self,
        session_url: &str,
        data: Vec<u8>,
        offset: u64,
        total: u64,
    ) -> Result<ChunkStatus, DriveError> {
        let range = content_range(offset, data.len(), total);
        debug!(range = %range, "Uploading chunk");

        let response = self
            .client
            .put(session_url)
            .bearer_auth(&self.access_token)
            .header(CONTENT_RANGE, range)
            .body(data)
            .send()
            .await?;

        if response.status() == StatusCode::PERMANENT_REDIRECT {
            let header = response.headers().get(RANGE).and_then(|v| v.to_str().ok());
            let next_offset = next_offset_from_range(header).ok_or_else(|| {
                DriveError::InvalidResponse(format!("unparsable Range header {header:?}"))
            })?;
            return Ok(ChunkStatus::Incomplete { next_offset });
        }

        let uploaded: UploadedFile = check_status(response).await?.json().await?;
        Ok(ChunkStatus::Complete(uploaded))
    }

    /// Streams `file` through a resumable session
    ///
    /// Only one chunk is held in memory. When Drive acknowledges fewer bytes
    /// than were sent, the next chunk starts at the acknowledged offset.
    pub async fn upload_resumable(
        &self,
        name: &str,
        parent: &str,
        file: &LocalFile,
        mime_type: &str,
    ) -> Result<UploadedFile, DriveError> {
        let total = file.size;
        info!(
            name,
            size = total,
            chunks = total.div_ceil(self.chunk_size as u64),
            "Starting resumable upload"
        );

        let session = self
            .create_upload_session(name, parent, total, mime_type)
            .await?;
        let mut reader = tokio::fs::File::open(&file.path)
            .await
            .map_err(|e| local_io(&file.path, e))?;

        let mut offset = 0u64;
        let mut stalled = 0u32;
        loop {
            let len = (total - offset).min(self.chunk_size as u64) as usize;
            let mut chunk = vec![0u8; len];
            reader
                .seek(SeekFrom::Start(offset))
                .await
                .map_err(|e| local_io(&file.path, e))?;
            reader
                .read_exact(&mut chunk)
                .await
                .map_err(|e| local_io(&file.path, e))?;

            match self.upload_chunk(&session, chunk, offset, total).await? {
                ChunkStatus::Complete(uploaded) => {
                    debug!(name, id = %uploaded.id, "Resumable upload complete");
                    return Ok(uploaded);
                }
                ChunkStatus::Incomplete { next_offset } => {
                    if next_offset >= total {
                        return Err(DriveError::InvalidResponse(
                            "upload session still incomplete after the last byte".to_string(),
                        ));
                    }
                    if next_offset <= offset {
                        stalled += 1;
                        if stalled >= MAX_STALLED_CHUNKS {
                            return Err(DriveError::Stalled { offset });
                        }
                    } else {
                        stalled = 0;
                    }
                    offset = next_offset;
                }
            }
        }
    }

    /// Moves a file or folder to the trash
    pub async fn trash(&self, id: &str) -> Result<(), DriveError> {
        debug!(id, "Trashing object");

        let response = self
            .request(Method::PATCH, &format!("{FILES_PATH}/{id}"))
            .query(&[("fields", "id")])
            .json(&serde_json::json!({ "trashed": true }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    /// Permanently deletes a file or folder
    pub async fn delete(&self, id: &str) -> Result<(), DriveError> {
        debug!(id, "Deleting object");

        let response = self
            .request(Method::DELETE, &format!("{FILES_PATH}/{id}"))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

/// Turns a non-success response into [`DriveError::Api`]
///
/// The message is taken from Google's error envelope when the body has one,
/// otherwise the raw body (or the status reason) is used.
async fn check_status(response: Response) -> Result<Response, DriveError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if !body.trim().is_empty() => body,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    };

    Err(DriveError::Api {
        status: status.as_u16(),
        message,
    })
}
