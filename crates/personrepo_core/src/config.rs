//! Runtime configuration for the repository core.
//!
//! # Responsibility
//! - Load settings from an optional JSON file.
//! - Apply `PERSONREPO_*` environment overrides on top.
//!
//! # Invariants
//! - A validated config has a non-zero busy timeout and page size.
//! - `database_path = None` means an in-memory store.

use crate::logging::parse_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const ENV_DB_PATH: &str = "PERSONREPO_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "PERSONREPO_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "PERSONREPO_LOG_DIR";
pub const ENV_PAGE_SIZE: &str = "PERSONREPO_PAGE_SIZE";

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
    Invalid { field: &'static str, message: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "cannot parse config `{}`: {source}", path.display())
            }
            Self::Invalid { field, message } => write!(f, "invalid `{field}`: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Invalid { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub database_path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
    pub default_page_size: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            busy_timeout_ms: 5_000,
            log_level: crate::logging::default_log_level().to_string(),
            log_dir: None,
            default_page_size: 20,
        }
    }
}

impl CoreConfig {
    /// Reads a JSON config file. Missing keys fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `path` when given, applies process environment overrides and
    /// validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = base.with_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides looked up through `lookup`, keyed by `PERSONREPO_*` names.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(path) = lookup(ENV_DB_PATH) {
            let trimmed = path.trim();
            self.database_path = if trimmed.is_empty() || trimmed == ":memory:" {
                None
            } else {
                Some(PathBuf::from(trimmed))
            };
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level.trim().to_string();
        }
        if let Some(dir) = lookup(ENV_LOG_DIR) {
            self.log_dir = Some(PathBuf::from(dir.trim()));
        }
        if let Some(size) = lookup(ENV_PAGE_SIZE) {
            self.default_page_size = size.trim().parse().map_err(|err| ConfigError::Invalid {
                field: "default_page_size",
                message: format!("`{size}` is not a page size: {err}"),
            })?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "busy_timeout_ms",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.default_page_size == 0 {
            return Err(ConfigError::Invalid {
                field: "default_page_size",
                message: "must be greater than zero".to_string(),
            });
        }
        if let Err(err) = parse_level(&self.log_level) {
            return Err(ConfigError::Invalid {
                field: "log_level",
                message: err.to_string(),
            });
        }
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid {
                    field: "log_dir",
                    message: format!("must be absolute, got `{}`", dir.display()),
                });
            }
        }
        Ok(())
    }
}
