//! Configuration module for DriveSync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for DriveSync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub sync: SyncConfig,
    pub retry: RetryConfig,
    pub watch: WatchConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
}

/// Where content lands in the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Name of the top-level archive folder under the store root.
    pub archive_root: String,
    /// Category used when none is given and no guesser applies.
    pub default_category: String,
    /// Create the archive root or a category folder without asking when missing.
    pub create_missing: bool,
}

/// Sync engine behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Verify every upload against the checksum reported by the store.
    pub force_recheck: bool,
    /// Ask on the terminal before creating missing remote folders.
    pub interactive: bool,
    /// Extra basenames to skip, on top of the built-in ignore list.
    pub ignore: Vec<String>,
    /// Upper bound on concurrent file uploads. `None` means unbounded.
    pub max_concurrent_uploads: Option<usize>,
}

/// Backoff settings for transient remote failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay before the first retry, in seconds.
    pub starting_delay_secs: u64,
    /// Multiplier applied to the delay after each further failure.
    pub ratio: u32,
    /// Give up after this many attempts. `None` retries forever.
    pub max_attempts: Option<u32>,
}

/// Watch-mode settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Directory whose direct children are archived.
    pub target: PathBuf,
    /// Interval between size checks while waiting for a new file to settle.
    pub stability_check_ms: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Shorthand for `level: debug`.
    pub verbose: bool,
}

/// Access token sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// JSON file holding `{ "access_token": ..., "expires_at": ... }`.
    pub token_file: Option<PathBuf>,
    /// Username of the keyring entry under the `drivesync` service.
    pub keyring_user: Option<String>,
}

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Write the configuration as YAML, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create configuration directory {}", parent.display())
            })?;
        }
        let yaml = serde_yaml::to_string(self).context("Failed to serialize configuration")?;
        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/drivesync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("drivesync")
            .join("config.yaml")
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            archive_root: "archive".to_string(),
            default_category: "Uncategorized".to_string(),
            create_missing: false,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            force_recheck: true,
            interactive: false,
            ignore: Vec::new(),
            max_concurrent_uploads: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            starting_delay_secs: 1,
            ratio: 2,
            max_attempts: None,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            target: dirs::document_dir()
                .or_else(|| dirs::home_dir().map(|home| home.join("Documents")))
                .unwrap_or_else(|| PathBuf::from("~/Documents")),
            stability_check_ms: 500,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            verbose: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"retry.ratio"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn check_folder_name(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(ValidationError {
            field: field.into(),
            message: "must not be empty".into(),
        });
    } else if value.contains('/') || value.contains('\\') {
        errors.push(ValidationError {
            field: field.into(),
            message: format!("must not contain path separators: {value}"),
        });
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- remote ---
        check_folder_name(&mut errors, "remote.archive_root", &self.remote.archive_root);
        check_folder_name(
            &mut errors,
            "remote.default_category",
            &self.remote.default_category,
        );

        // --- sync ---
        if self.sync.max_concurrent_uploads == Some(0) {
            errors.push(ValidationError {
                field: "sync.max_concurrent_uploads".into(),
                message: "must be greater than 0 (omit for unbounded)".into(),
            });
        }
        for name in &self.sync.ignore {
            if name.is_empty() || name.contains('/') {
                errors.push(ValidationError {
                    field: "sync.ignore".into(),
                    message: format!("entries must be plain basenames, got {name:?}"),
                });
            }
        }

        // --- retry ---
        if self.retry.starting_delay_secs == 0 {
            errors.push(ValidationError {
                field: "retry.starting_delay_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.retry.ratio == 0 {
            errors.push(ValidationError {
                field: "retry.ratio".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.retry.max_attempts == Some(0) {
            errors.push(ValidationError {
                field: "retry.max_attempts".into(),
                message: "must be greater than 0 (omit for unbounded)".into(),
            });
        }

        // --- watch ---
        if self.watch.stability_check_ms == 0 {
            errors.push(ValidationError {
                field: "watch.stability_check_ms".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid log level '{}'; expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        // --- auth ---
        if let Some(user) = &self.auth.keyring_user {
            if user.trim().is_empty() {
                errors.push(ValidationError {
                    field: "auth.keyring_user".into(),
                    message: "must not be empty when set".into(),
                });
            }
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically, starting from
/// defaults.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start from [`Config::default`].
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Start from an already-loaded configuration.
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    // --- remote ---

    pub fn archive_root(mut self, name: impl Into<String>) -> Self {
        self.config.remote.archive_root = name.into();
        self
    }

    pub fn default_category(mut self, name: impl Into<String>) -> Self {
        self.config.remote.default_category = name.into();
        self
    }

    pub fn create_missing(mut self, create: bool) -> Self {
        self.config.remote.create_missing = create;
        self
    }

    // --- sync ---

    pub fn force_recheck(mut self, recheck: bool) -> Self {
        self.config.sync.force_recheck = recheck;
        self
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.config.sync.interactive = interactive;
        self
    }

    pub fn ignore(mut self, name: impl Into<String>) -> Self {
        self.config.sync.ignore.push(name.into());
        self
    }

    pub fn max_concurrent_uploads(mut self, n: Option<usize>) -> Self {
        self.config.sync.max_concurrent_uploads = n;
        self
    }

    // --- retry ---

    pub fn retry_starting_delay_secs(mut self, secs: u64) -> Self {
        self.config.retry.starting_delay_secs = secs;
        self
    }

    pub fn retry_ratio(mut self, ratio: u32) -> Self {
        self.config.retry.ratio = ratio;
        self
    }

    pub fn retry_max_attempts(mut self, attempts: Option<u32>) -> Self {
        self.config.retry.max_attempts = attempts;
        self
    }

    // --- watch ---

    pub fn watch_target(mut self, target: PathBuf) -> Self {
        self.config.watch.target = target;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.logging.verbose = verbose;
        self
    }

    // --- auth ---

    pub fn token_file(mut self, path: PathBuf) -> Self {
        self.config.auth.token_file = Some(path);
        self
    }

    pub fn keyring_user(mut self, user: impl Into<String>) -> Self {
        self.config.auth.keyring_user = Some(user.into());
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
