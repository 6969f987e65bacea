// crates/hanzi-ref-config/src/config.rs
// ============================================================================
// Module: Hanzi Reference Configuration
// Description: Configuration loading and validation for hanzi-ref.
// Purpose: Provide strict TOML parsing with hard size and path limits.
// Dependencies: hanzi-ref-core, hanzi-ref-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! The file is resolved from an explicit path, then the `HANZI_REF_CONFIG`
//! environment variable, then `hanzi-ref.toml` in the working directory.
//! Only the last one may be absent, in which case built-in defaults apply.
//! Every loaded config is validated before it is returned.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use hanzi_ref_core::CacheSettings;
use hanzi_ref_core::DEFAULT_QUEUE_CAPACITY;
use hanzi_ref_core::ReferenceStoreConfig;
use hanzi_ref_store_sqlite::DEFAULT_BUSY_TIMEOUT_MS;
use hanzi_ref_store_sqlite::SqliteBackendConfig;
use hanzi_ref_store_sqlite::SqliteJournalMode;
use hanzi_ref_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "hanzi-ref.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "HANZI_REF_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default dictionary database path.
const DEFAULT_DATABASE_PATH: &str = "main.db";
/// Default cache snapshot path.
const DEFAULT_SNAPSHOT_PATH: &str = "reference-cache.json";
/// Upper bound for the router queue capacity.
const MAX_QUEUE_CAPACITY: usize = 1 << 20;

// ============================================================================
// SECTION: Config Model
// ============================================================================

/// Top-level `hanzi-ref.toml` configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HanziRefConfig {
    /// Dictionary database settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Response cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Request router settings.
    #[serde(default)]
    pub router: RouterConfig,
}

impl HanziRefConfig {
    /// Loads configuration using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an explicitly named file is missing, or
    /// when reading, parsing, or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match resolve_path(path)? {
            ConfigSource::Explicit(path) => Self::load_file(&path),
            ConfigSource::Default(path) if path.exists() => Self::load_file(&path),
            ConfigSource::Default(_) => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Loads and validates a specific config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        validate_path(path)?;
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates config text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.storage.validate()?;
        self.cache.validate()?;
        self.router.validate()?;
        Ok(())
    }

    /// Returns the `SQLite` backend settings.
    #[must_use]
    pub fn sqlite_config(&self) -> SqliteBackendConfig {
        SqliteBackendConfig {
            path: self.storage.path.clone(),
            busy_timeout_ms: self.storage.busy_timeout_ms,
            journal_mode: self.storage.journal_mode,
            sync_mode: self.storage.sync_mode,
        }
    }

    /// Returns the reference store settings.
    #[must_use]
    pub fn store_config(&self) -> ReferenceStoreConfig {
        ReferenceStoreConfig {
            cache: CacheSettings {
                enabled: self.cache.enabled,
                snapshot_path: Some(self.cache.snapshot_path.clone()),
            },
            queue_capacity: self.router.queue_capacity,
            reply_timeout: self.router.reply_timeout_ms.map(Duration::from_millis),
        }
    }
}

/// Dictionary database configuration.
///
/// # Invariants
/// - `path` is non-empty and within path length limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    /// Path to the `SQLite` dictionary.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StorageConfig {
    /// Validates storage configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("storage.path", &self.path.to_string_lossy())
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CacheConfig {
    /// Load the snapshot at startup and consult the cache on lookups.
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Snapshot file read at startup and written at shutdown.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            snapshot_path: default_snapshot_path(),
        }
    }
}

impl CacheConfig {
    /// Validates cache configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("cache.snapshot_path", &self.snapshot_path.to_string_lossy())
    }
}

/// Request router configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RouterConfig {
    /// Queued requests allowed before submitters block.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Optional per-request reply timeout in milliseconds.
    #[serde(default)]
    pub reply_timeout_ms: Option<u64>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            reply_timeout_ms: None,
        }
    }
}

impl RouterConfig {
    /// Validates router configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 || self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "router.queue_capacity out of range: {} (expected 1-{MAX_QUEUE_CAPACITY})",
                self.queue_capacity
            )));
        }
        if self.reply_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "router.reply_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Returns the default dictionary path.
fn default_database_path() -> PathBuf {
    PathBuf::from(DEFAULT_DATABASE_PATH)
}

/// Returns the default busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default cache toggle.
const fn default_cache_enabled() -> bool {
    true
}

/// Returns the default snapshot path.
fn default_snapshot_path() -> PathBuf {
    PathBuf::from(DEFAULT_SNAPSHOT_PATH)
}

/// Returns the default router queue capacity.
const fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Where a config path came from.
enum ConfigSource {
    /// Named on the command line or through the environment; must exist.
    Explicit(PathBuf),
    /// The default filename; may be absent.
    Default(PathBuf),
}

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<ConfigSource, ConfigError> {
    if let Some(path) = path {
        return Ok(ConfigSource::Explicit(path.to_path_buf()));
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(ConfigSource::Explicit(PathBuf::from(env_path)));
    }
    Ok(ConfigSource::Default(PathBuf::from(DEFAULT_CONFIG_NAME)))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::MAX_PATH_COMPONENT_LENGTH;
    use super::MAX_TOTAL_PATH_LENGTH;
    use super::validate_path;
    use super::validate_path_string;

    #[test]
    fn validate_path_string_rejects_whitespace_only() {
        let result = validate_path_string("storage.path", "   ");
        assert!(result.is_err(), "whitespace-only path should fail");
    }

    #[test]
    fn validate_path_string_accepts_component_at_max() {
        let component = "c".repeat(MAX_PATH_COMPONENT_LENGTH);
        assert!(validate_path_string("storage.path", &format!("dict/{component}")).is_ok());
    }

    #[test]
    fn validate_path_string_error_includes_field_name() {
        let component = "c".repeat(MAX_PATH_COMPONENT_LENGTH + 1);
        let err = validate_path_string("cache.snapshot_path", &component).err();
        let message = err.map(|err| err.to_string()).unwrap_or_default();
        assert!(message.contains("cache.snapshot_path"), "unexpected message: {message}");
    }

    #[test]
    fn validate_path_rejects_overlong_config_path() {
        let path = "p".repeat(MAX_TOTAL_PATH_LENGTH + 1);
        assert!(validate_path(std::path::Path::new(&path)).is_err());
    }
}
