use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_PATH_VAR: &str = "PIPESH_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub prompt: String,
    pub history: HistoryConfig,
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prompt: "$ ".into(),
            history: HistoryConfig::default(),
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub file: Option<PathBuf>,
    /// Entries kept in memory, 0 is unlimited.
    pub size: usize,
    /// Entries kept in the history file, 0 is unlimited.
    pub file_size: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            file: home_dir().map(|home| home.join(".pipesh_history")),
            size: 500,
            file_size: 2000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub directory: PathBuf,
    /// Used when `RUST_LOG` is not set.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            directory: env::temp_dir(),
            filter: "warn".into(),
        }
    }
}

impl Config {
    /// Reads the config file (if any) and applies the bash-style history variables.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match config_path().filter(|path| path.exists()) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_env(|key| env::var(key).ok());

        Ok(config)
    }

    /// The defaults with the history variables applied, ignoring any config file.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| env::var(key).ok());
        config
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `HISTFILE`, `HISTSIZE` and `HISTFILESIZE` override the file settings. Sizes that
    /// don't parse are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(file) = lookup("HISTFILE").filter(|file| !file.is_empty()) {
            self.history.file = Some(PathBuf::from(file));
        }

        if let Some(size) = lookup("HISTSIZE").and_then(|size| size.trim().parse().ok()) {
            self.history.size = size;
        }

        if let Some(size) = lookup("HISTFILESIZE").and_then(|size| size.trim().parse().ok()) {
            self.history.file_size = size;
        }
    }
}

fn config_path() -> Option<PathBuf> {
    env::var_os(CONFIG_PATH_VAR)
        .map(PathBuf::from)
        .or_else(|| home_dir().map(|home| home.join(".config/pipesh/config.toml")))
}

pub fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}
