//! Access token provisioning for the Google Drive API
//!
//! DriveSync does not run an OAuth exchange itself. It picks up an access
//! token obtained elsewhere, from the first source that has one:
//!
//! 1. the `DRIVESYNC_ACCESS_TOKEN` environment variable
//! 2. the JSON token file configured at `auth.token_file`
//! 3. the system keyring entry `drivesync/<auth.keyring_user>`
//!
//! ## Components
//!
//! - [`Tokens`] - Token set as stored in files and the keyring
//! - [`KeyringTokenStorage`] - Token storage using the system keyring
//! - [`resolve_access_token`] - Applies the source order above

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use drivesync_core::config::AuthConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Environment variable holding a ready-to-use access token
pub const ACCESS_TOKEN_ENV: &str = "DRIVESYNC_ACCESS_TOKEN";

/// Keyring service name for stored tokens
const KEYRING_SERVICE: &str = "drivesync";

// ============================================================================
// Tokens
// ============================================================================

/// OAuth tokens for the Drive API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    /// Bearer token for authenticating API requests
    pub access_token: String,
    /// Token for refreshing the access token (kept, not used by DriveSync)
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// When the access token expires, if known
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Tokens {
    /// Returns true if the access token is known to have expired
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }

    /// Returns true if the access token will expire within the given duration
    pub fn expires_within(&self, duration: Duration) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() + duration >= at)
    }

    /// Reads tokens from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read token file {}", path.display()))?;
        let tokens: Tokens = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse token file {}", path.display()))?;
        Ok(tokens)
    }
}

// ============================================================================
// KeyringTokenStorage
// ============================================================================

/// Retrieves tokens from the system keyring
///
/// Tokens are serialized as JSON under the service name "drivesync" with
/// the configured user as the username.
pub struct KeyringTokenStorage;

impl KeyringTokenStorage {
    /// Loads tokens from the system keyring for the given user
    ///
    /// # Returns
    /// `Some(Tokens)` if found and valid, `None` if not found
    pub fn load(username: &str) -> Result<Option<Tokens>> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, username)
            .context("Failed to create keyring entry")?;

        match entry.get_password() {
            Ok(json) => {
                let tokens: Tokens = serde_json::from_str(&json)
                    .context("Failed to deserialize tokens from keyring")?;
                debug!(user = username, "Loaded tokens from keyring");
                Ok(Some(tokens))
            }
            Err(keyring::Error::NoEntry) => {
                debug!(user = username, "No tokens found in keyring");
                Ok(None)
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read from keyring")),
        }
    }
}

// ============================================================================
// Token resolution
// ============================================================================

/// Where an access token was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Environment,
    TokenFile,
    Keyring,
}

fn checked(tokens: Tokens, source: TokenSource) -> (String, TokenSource) {
    if tokens.is_expired() {
        warn!(?source, expires_at = ?tokens.expires_at, "Access token has expired");
    } else if tokens.expires_within(Duration::minutes(5)) {
        warn!(?source, expires_at = ?tokens.expires_at, "Access token expires soon");
    }
    (tokens.access_token, source)
}

/// Resolves the access token from the environment, token file, or keyring
pub fn resolve_access_token(auth: &AuthConfig) -> Result<(String, TokenSource)> {
    let from_env = std::env::var(ACCESS_TOKEN_ENV).ok();
    resolve_access_token_with(from_env, auth, KeyringTokenStorage::load)
}

/// Same as [`resolve_access_token`] with the environment value and keyring
/// lookup supplied by the caller
pub fn resolve_access_token_with<K>(
    env_token: Option<String>,
    auth: &AuthConfig,
    keyring_load: K,
) -> Result<(String, TokenSource)>
where
    K: FnOnce(&str) -> Result<Option<Tokens>>,
{
    if let Some(token) = env_token.filter(|t| !t.trim().is_empty()) {
        debug!("Using access token from {}", ACCESS_TOKEN_ENV);
        return Ok((token.trim().to_string(), TokenSource::Environment));
    }

    if let Some(path) = &auth.token_file {
        let tokens = Tokens::from_file(path)?;
        debug!(path = %path.display(), "Using access token from token file");
        return Ok(checked(tokens, TokenSource::TokenFile));
    }

    if let Some(user) = &auth.keyring_user {
        if let Some(tokens) = keyring_load(user)? {
            return Ok(checked(tokens, TokenSource::Keyring));
        }
        anyhow::bail!("No tokens stored in the keyring for user '{user}'");
    }

    anyhow::bail!(
        "No access token available: set {ACCESS_TOKEN_ENV}, auth.token_file, or auth.keyring_user"
    )
}
