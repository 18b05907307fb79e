//! Domain newtypes with validation
//!
//! Strongly-typed wrappers for remote identifiers and checksums. Each
//! newtype validates its input at construction time so that the rest of the
//! engine can pass them around without re-checking.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Alias the remote store uses for its logical root folder
const ROOT_ALIAS: &str = "root";

/// Returns true if `id` only contains characters the remote store uses in
/// object identifiers
fn is_valid_remote_id(id: &str) -> bool {
    id.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

// ============================================================================
// FolderId
// ============================================================================

/// Opaque identifier of a remote folder, assigned by the store at creation
///
/// The archive root and category folders are represented identically; the
/// distinction is purely positional (children of the store root vs. children
/// of the archive root).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FolderId(String);

impl FolderId {
    /// Create a new FolderId
    ///
    /// # Errors
    /// Returns error if the ID is empty or contains invalid characters
    pub fn new(id: String) -> Result<Self, DomainError> {
        if id.is_empty() {
            return Err(DomainError::InvalidRemoteId(
                "Folder ID cannot be empty".to_string(),
            ));
        }
        if !is_valid_remote_id(&id) {
            return Err(DomainError::InvalidRemoteId(format!(
                "Folder ID contains invalid characters: {id}"
            )));
        }
        Ok(Self(id))
    }

    /// The store's logical root folder
    #[must_use]
    pub fn root() -> Self {
        Self(ROOT_ALIAS.to_string())
    }

    /// Returns true if this is the store's logical root
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == ROOT_ALIAS
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FolderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FolderId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for FolderId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<FolderId> for String {
    fn from(id: FolderId) -> Self {
        id.0
    }
}

// ============================================================================
// FileId
// ============================================================================

/// Opaque identifier of an uploaded remote file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FileId(String);

impl FileId {
    /// Create a new FileId
    ///
    /// # Errors
    /// Returns error if the ID is empty or contains invalid characters
    pub fn new(id: String) -> Result<Self, DomainError> {
        if id.is_empty() {
            return Err(DomainError::InvalidRemoteId(
                "File ID cannot be empty".to_string(),
            ));
        }
        if !is_valid_remote_id(&id) {
            return Err(DomainError::InvalidRemoteId(format!(
                "File ID contains invalid characters: {id}"
            )));
        }
        Ok(Self(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FileId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FileId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for FileId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<FileId> for String {
    fn from(id: FileId) -> Self {
        id.0
    }
}

// ============================================================================
// Md5Checksum
// ============================================================================

/// MD5 content digest in lowercase hexadecimal form
///
/// This is the format the remote store reports for uploaded content and the
/// format the uploader computes locally, so the two compare with `==`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Md5Checksum(String);

impl Md5Checksum {
    /// Length of a hex-encoded MD5 digest
    const HEX_LEN: usize = 32;

    /// Create a new Md5Checksum, normalizing to lowercase
    ///
    /// # Errors
    /// Returns error if the input is not 32 hexadecimal characters
    pub fn new(hex: String) -> Result<Self, DomainError> {
        if hex.len() != Self::HEX_LEN || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DomainError::InvalidHash(format!(
                "expected {} hex characters, got {hex:?}",
                Self::HEX_LEN
            )));
        }
        Ok(Self(hex.to_ascii_lowercase()))
    }

    /// Build a checksum from a raw 16-byte digest
    #[must_use]
    pub fn from_digest(digest: &[u8; 16]) -> Self {
        Self(hex::encode(digest))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Md5Checksum {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Md5Checksum {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Md5Checksum> for String {
    fn from(sum: Md5Checksum) -> Self {
        sum.0
    }
}

// ============================================================================
// Category
// ============================================================================

/// Name of a category folder under the archive root
///
/// Category names become remote folder names, so they cannot be empty or
/// contain path separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Category(String);

impl Category {
    /// Create a new Category
    ///
    /// # Errors
    /// Returns error if the name is blank or contains a path separator
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::InvalidCategory(
                "category name cannot be empty".to_string(),
            ));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(DomainError::InvalidCategory(format!(
                "category name cannot contain path separators: {name}"
            )));
        }
        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Category {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Category {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.0
    }
}
