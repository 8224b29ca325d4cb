//! Configuration for the draft persistence engine.
//!
//! Loaded through the [`Loader`] / [`Saver`] traits so hosts can keep
//! configuration wherever they like. [`FileStore`] covers the common case of a
//! `.json` or `.toml` file on disk.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default quiet period before the local tier writes.
pub const DEFAULT_LOCAL_DEBOUNCE: Duration = Duration::from_secs(5);

/// Default quiet period before the remote tier writes.
pub const DEFAULT_REMOTE_DEBOUNCE: Duration = Duration::from_secs(60);

/// Default key of the single local draft slot.
pub const DEFAULT_STORAGE_KEY: &str = "draftkeep:draft";

/// Autosave tuning for one authoring session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    /// Debounce for writes to the local draft slot.
    #[serde(rename = "local_debounce_ms", with = "duration_ms")]
    pub local_debounce: Duration,
    /// Debounce for writes to the remote draft store.
    #[serde(rename = "remote_debounce_ms", with = "duration_ms")]
    pub remote_debounce: Duration,
    /// Key of the local draft slot.
    pub storage_key: String,
    /// Path prefixes that never trigger the exit prompt.
    pub safe_paths: Vec<String>,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            local_debounce: DEFAULT_LOCAL_DEBOUNCE,
            remote_debounce: DEFAULT_REMOTE_DEBOUNCE,
            storage_key: DEFAULT_STORAGE_KEY.to_owned(),
            safe_paths: Vec::new(),
        }
    }
}

impl AutosaveConfig {
    /// Reject settings the scheduler cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.local_debounce.is_zero() || self.remote_debounce.is_zero() {
            return Err(ConfigError::Invalid("debounce must be non-zero".into()));
        }
        if self.remote_debounce < self.local_debounce {
            return Err(ConfigError::Invalid(format!(
                "remote debounce ({}ms) is shorter than local debounce ({}ms)",
                self.remote_debounce.as_millis(),
                self.local_debounce.as_millis()
            )));
        }
        if self.storage_key.trim().is_empty() {
            return Err(ConfigError::Invalid("storage key is empty".into()));
        }
        Ok(())
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Autosave tuning.
    pub autosave: AutosaveConfig,
    /// Directory holding the local draft slot. `None` uses the platform data dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_dir: Option<PathBuf>,
}

impl Config {
    /// Loads the configuration from the provided loader.
    pub async fn load(loader: &impl Loader) -> Result<Self, ConfigError> {
        let config = loader.load().await?;
        config.autosave.validate()?;
        Ok(config)
    }

    /// Saves the configuration using the provided saver.
    pub async fn save(&self, saver: &impl Saver) -> Result<(), ConfigError> {
        saver.save(self).await
    }

    /// `<config dir>/draftkeep/config.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("draftkeep").join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Profile directory, falling back to `<data dir>/draftkeep`.
    pub fn resolved_profile_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = &self.profile_dir {
            return Ok(dir.clone());
        }
        dirs::data_dir()
            .map(|dir| dir.join("draftkeep"))
            .ok_or(ConfigError::NoConfigDir)
    }
}

/// The trait for loading configuration data.
pub trait Loader {
    /// Loads the configuration data.
    fn load(&self) -> impl Future<Output = Result<Config, ConfigError>> + Send;
}

/// The trait for saving configuration data.
pub trait Saver {
    /// Saves the configuration data.
    fn save(&self, config: &Config) -> impl Future<Output = Result<(), ConfigError>> + Send;
}

/// An implementation of [`Loader`] and [`Saver`] that reads and writes a configuration file.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a new [`FileStore`] with the given path.
    ///
    /// The format follows the file extension; `.json` and `.toml` are supported.
    /// A missing file loads as the default configuration.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|ext| ext.to_str())
    }
}

impl Loader for FileStore {
    async fn load(&self) -> Result<Config, ConfigError> {
        let format = self.extension();
        if !matches!(format, Some("json" | "toml")) {
            return Err(ConfigError::UnsupportedFormat(self.path.display().to_string()));
        }
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no config file, using defaults");
                return Ok(Config::default());
            }
            Err(e) => return Err(e.into()),
        };
        match format {
            Some("json") => Ok(serde_json::from_str(&raw)?),
            _ => Ok(toml::from_str(&raw)?),
        }
    }
}

impl Saver for FileStore {
    async fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let raw = match self.extension() {
            Some("json") => serde_json::to_string_pretty(config)?,
            Some("toml") => toml::to_string_pretty(config)?,
            _ => return Err(ConfigError::UnsupportedFormat(self.path.display().to_string())),
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
