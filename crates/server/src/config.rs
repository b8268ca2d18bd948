//! `config.toml` loading.
//!
//! A missing file yields the defaults; a present but invalid file is an error.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use photobridge_connectors::BackendCommand;
use photobridge_protocol::DEFAULT_MAX_LINE_BYTES;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Explicit exiftool binary; otherwise discovered.
    pub exiftool: Option<PathBuf>,
    pub tool_timeout_secs: u64,
    /// Age after which cancelled or never-uploaded sessions are dropped.
    pub session_ttl_secs: u64,
    pub max_line_bytes: usize,
    pub backends: BTreeMap<String, BackendCommand>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exiftool: None,
            tool_timeout_secs: 30,
            session_ttl_secs: 3600,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            backends: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    parse(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn parse(raw: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(raw)
}
