//! Configuration for the patch exporter.
//!
//! [`ExporterConfig`] is what the library components consume. [`ConfigFile`]
//! is the user-editable `config.ini` it can be built from:
//!
//! ```text
//! [retry]
//! attempts = 10
//! delay_ms = 250
//!
//! [logging]
//! level = info
//! directory = /home/user/.modpatch/logs
//!
//! [paths]
//! mod_directory = /home/user/Documents/Paradox Interactive/Stellaris/mod
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::naming::{HISTORY_DIR_NAME, IMAGE_EXTENSIONS, STATE_FILE_NAME};
use crate::retry::{RetryPolicy, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY_MS};

/// Name of the per-user configuration directory under the home directory.
pub const CONFIG_DIR_NAME: &str = ".modpatch";

/// Name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Default log level when neither the config file nor `RUST_LOG` sets one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// =============================================================================
// Exporter configuration
// =============================================================================

/// Settings consumed by the state store and content exporter.
#[derive(Clone, Debug, PartialEq)]
pub struct ExporterConfig {
    /// Retry policy applied to every single file operation.
    pub retry: RetryPolicy,

    /// File name of the primary state document.
    pub state_file_name: String,

    /// Directory under the patch root holding externalized history payloads.
    pub history_dir_name: String,

    /// Image extensions tried when a binary source is missing.
    pub image_extensions: Vec<String>,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            state_file_name: STATE_FILE_NAME.to_string(),
            history_dir_name: HISTORY_DIR_NAME.to_string(),
            image_extensions: IMAGE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl ExporterConfig {
    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the state document file name.
    pub fn with_state_file_name(mut self, name: impl Into<String>) -> Self {
        self.state_file_name = name.into();
        self
    }

    /// Set the history directory name.
    pub fn with_history_dir_name(mut self, name: impl Into<String>) -> Self {
        self.history_dir_name = name.into();
        self
    }

    /// Build from a loaded configuration file.
    pub fn from_config_file(config: &ConfigFile) -> Self {
        Self::default().with_retry(RetryPolicy::fixed(
            config.retry.attempts,
            Duration::from_millis(config.retry.delay_ms),
        ))
    }
}

// =============================================================================
// Configuration file
// =============================================================================

/// Errors raised while reading or writing `config.ini`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: ini::Error },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("could not determine home directory")]
    NoHomeDirectory,
}

/// `[retry]` section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetrySettings {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

/// `[logging]` section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for the log file. Stderr only when `None`.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            directory: None,
        }
    }
}

/// `[paths]` section.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathSettings {
    /// Root directory holding mods and patch folders.
    pub mod_directory: Option<PathBuf>,
}

/// Parsed `config.ini`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub retry: RetrySettings,
    pub logging: LoggingConfig,
    pub paths: PathSettings,
}

/// Path of the user's configuration file.
pub fn config_file_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

impl ConfigFile {
    /// Load from the default location. Missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_file_path().ok_or(ConfigError::NoHomeDirectory)?;
        Self::load_from(&path)
    }

    /// Load from a specific path. Missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::default();
        for key in ConfigKey::all() {
            if let Some(value) = ini.get_from(Some(key.section()), key.key_name()) {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = config_file_path().ok_or(ConfigError::NoHomeDirectory)?;
        self.save_to(&path)
    }

    /// Save to a specific path, creating the parent directory.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }
        ini.write_to_file(path).map_err(write_err)
    }
}

// =============================================================================
// Configuration keys
// =============================================================================

/// Addressable `section.key` settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigKey {
    RetryAttempts,
    RetryDelayMs,
    LoggingLevel,
    LoggingDirectory,
    PathsModDirectory,
}

impl ConfigKey {
    /// All keys in file order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            Self::RetryAttempts,
            Self::RetryDelayMs,
            Self::LoggingLevel,
            Self::LoggingDirectory,
            Self::PathsModDirectory,
        ]
    }

    pub fn section(&self) -> &'static str {
        match self {
            Self::RetryAttempts | Self::RetryDelayMs => "retry",
            Self::LoggingLevel | Self::LoggingDirectory => "logging",
            Self::PathsModDirectory => "paths",
        }
    }

    pub fn key_name(&self) -> &'static str {
        match self {
            Self::RetryAttempts => "attempts",
            Self::RetryDelayMs => "delay_ms",
            Self::LoggingLevel => "level",
            Self::LoggingDirectory => "directory",
            Self::PathsModDirectory => "mod_directory",
        }
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as a string (empty when unset).
    pub fn get(&self, config: &ConfigFile) -> String {
        let path_str = |p: &Option<PathBuf>| {
            p.as_ref()
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_default()
        };
        match self {
            Self::RetryAttempts => config.retry.attempts.to_string(),
            Self::RetryDelayMs => config.retry.delay_ms.to_string(),
            Self::LoggingLevel => config.logging.level.clone(),
            Self::LoggingDirectory => path_str(&config.logging.directory),
            Self::PathsModDirectory => path_str(&config.paths.mod_directory),
        }
    }

    /// Parse and store a value.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason: reason.to_string(),
        };
        let value = value.trim();

        match self {
            Self::RetryAttempts => {
                let attempts: u32 = value.parse().map_err(|_| invalid("expected a whole number"))?;
                if attempts == 0 {
                    return Err(invalid("must be at least 1"));
                }
                config.retry.attempts = attempts;
            }
            Self::RetryDelayMs => {
                config.retry.delay_ms = value
                    .parse()
                    .map_err(|_| invalid("expected milliseconds"))?;
            }
            Self::LoggingLevel => {
                if value.is_empty() {
                    return Err(invalid("must not be empty"));
                }
                config.logging.level = value.to_string();
            }
            Self::LoggingDirectory => {
                config.logging.directory = non_empty_path(value);
            }
            Self::PathsModDirectory => {
                config.paths.mod_directory = non_empty_path(value);
            }
        }
        Ok(())
    }
}

fn non_empty_path(value: &str) -> Option<PathBuf> {
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_exporter_config_defaults() {
        let config = ExporterConfig::default();
        assert_eq!(config.retry.max_attempts, 10);
        assert_eq!(config.retry.delay, Duration::from_millis(250));
        assert_eq!(config.state_file_name, "state.json");
        assert_eq!(config.history_dir_name, "state_conflict_history");
        assert!(config.image_extensions.contains(&".dds".to_string()));
    }

    #[test]
    fn test_exporter_config_from_file() {
        let mut file = ConfigFile::default();
        file.retry.attempts = 3;
        file.retry.delay_ms = 5;

        let config = ExporterConfig::from_config_file(&file);
        assert_eq!(config.retry, RetryPolicy::fixed(3, Duration::from_millis(5)));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&dir.path().join("config.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.retry.attempts = 4;
        config.logging.level = "debug".into();
        config.paths.mod_directory = Some(PathBuf::from("/games/mods"));
        config.save_to(&path).unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_attempts_rejected() {
        let mut config = ConfigFile::default();
        let err = ConfigKey::RetryAttempts.set(&mut config, "zero").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = ConfigKey::RetryAttempts.set(&mut config, "0").unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn test_key_parse() {
        let key: ConfigKey = "retry.delay_ms".parse().unwrap();
        assert_eq!(key, ConfigKey::RetryDelayMs);
        assert!("retry.bogus".parse::<ConfigKey>().is_err());
        assert_eq!(ConfigKey::PathsModDirectory.to_string(), "paths.mod_directory");
    }
}
