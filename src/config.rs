//! Application configuration management.
//!
//! Settings are layered with figment, lowest priority first:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. TOML file (`--config PATH`, else `config.toml` in the platform config dir)
//! 3. Environment variables prefixed `DLPWATCH_` (nested keys split on `__`)
//! 4. CLI flags, applied by the caller after loading
//!
//! ```toml
//! watch_root = "/home/kali"
//! extensions = ["pdf", "docx", "xlsx"]
//! ignore_paths = ["/home/kali/.cache"]
//! refresh_interval_secs = 3
//! hash_algorithm = "blake3"
//! delete_mode = "permanent"
//! ```

use std::path::{Path, PathBuf};

use directories::{BaseDirs, ProjectDirs};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actions::DeleteMode;
use crate::scanner::HashAlgorithm;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "DLPWATCH_";

/// Extensions watched by default.
pub const DEFAULT_EXTENSIONS: &[&str] = &["py", "txt", "docx", "pdf", "xlsx", "jpg", "png", "gif"];

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A provider failed to parse or the merged value did not fit [`Config`].
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// A value is out of range.
    #[error("invalid configuration value for `{field}`: {message}")]
    Invalid { field: &'static str, message: String },

    /// The effective configuration could not be rendered as TOML.
    #[error("failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the recursively watched tree.
    pub watch_root: PathBuf,
    /// File extensions that are evaluated (case-insensitive, dot optional).
    pub extensions: Vec<String>,
    /// Subtrees whose events are ignored.
    pub ignore_paths: Vec<PathBuf>,
    /// Gitignore-style patterns relative to `watch_root`.
    pub ignore_patterns: Vec<String>,
    /// Seconds between registry cache refreshes.
    pub refresh_interval_secs: u64,
    /// Hash function for content identity.
    pub hash_algorithm: HashAlgorithm,
    /// Event worker threads.
    pub workers: usize,
    /// How stray copies are removed.
    pub delete_mode: DeleteMode,
    /// Registry database location (default: platform data dir).
    pub database_path: Option<PathBuf>,
    /// Alert log location (default: platform data dir).
    pub alert_log_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let home = BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
        Self {
            watch_root: home.clone().unwrap_or_else(|| PathBuf::from(".")),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
            ignore_paths: home
                .map(|h| vec![h.join(".cache"), h.join(".config")])
                .unwrap_or_default(),
            ignore_patterns: Vec::new(),
            refresh_interval_secs: 3,
            hash_algorithm: HashAlgorithm::default(),
            workers: 4,
            delete_mode: DeleteMode::default(),
            database_path: None,
            alert_log_path: None,
        }
    }
}

impl Config {
    /// Load from defaults, the given (or default) TOML file and the
    /// environment, then validate.
    ///
    /// A missing default config file is not an error; a missing explicit
    /// one is.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => {
                if !p.is_file() {
                    return Err(ConfigError::Invalid {
                        field: "config",
                        message: format!("{} is not a readable file", p.display()),
                    });
                }
                Some(p.to_path_buf())
            }
            None => Self::default_config_path().filter(|p| p.is_file()),
        };

        let config: Self = Self::figment(file.as_deref())
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;
        config.validate()?;
        log::debug!("Configuration loaded (file: {:?})", file);
        Ok(config)
    }

    /// Defaults merged with a TOML file, without environment overrides.
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let figment = Figment::from(Serialized::defaults(Self::default()));
        match file {
            Some(path) => figment.merge(Toml::file(path)),
            None => figment,
        }
    }

    /// Load defaults + TOML file only, falling back to defaults on error.
    #[must_use]
    pub fn load_from_path(path: &Path) -> Self {
        match Self::figment(Some(path)).extract::<Self>() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load {}, using defaults: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "refresh_interval_secs",
                message: "must be at least 1".into(),
            });
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid {
                field: "workers",
                message: "must be at least 1".into(),
            });
        }
        if self
            .extensions
            .iter()
            .all(|e| e.trim_start_matches('.').is_empty())
        {
            return Err(ConfigError::Invalid {
                field: "extensions",
                message: "at least one extension is required".into(),
            });
        }
        Ok(())
    }

    /// Effective registry database path.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| data_dir().join("hash_store.db"))
    }

    /// Effective alert log path.
    #[must_use]
    pub fn alert_log_path(&self) -> PathBuf {
        self.alert_log_path
            .clone()
            .unwrap_or_else(|| data_dir().join("logs").join("alerts_log.txt"))
    }

    /// Directories that must never be watched: the tool's own state.
    #[must_use]
    pub fn self_paths(&self) -> Vec<PathBuf> {
        [self.database_path(), self.alert_log_path()]
            .iter()
            .filter_map(|p| p.parent().map(Path::to_path_buf))
            .filter(|p| !p.as_os_str().is_empty())
            .collect()
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Default platform-specific configuration file path.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "dlpwatch", "dlpwatch")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

fn data_dir() -> PathBuf {
    ProjectDirs::from("com", "dlpwatch", "dlpwatch")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".dlpwatch"))
}
