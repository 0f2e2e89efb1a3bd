//! Host configuration
//!
//! Values come from built-in defaults, then an optional JSON file, then
//! command-line flags (applied by `main`).

use crate::network::server::DEFAULT_PORT;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the config file inside the platform config directory
pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// First port to try; the server walks upward when it is taken
    pub port: u16,
    /// Seconds per turn. `None` turns the deadline off.
    pub turn_timeout_secs: Option<u64>,
    pub min_players: usize,
    pub max_players: usize,
    /// Names of automated seats added when the host starts
    pub bots: Vec<String>,
    /// Register the table over mDNS
    pub advertise: bool,
    /// Name shown to browsers when advertising
    pub table_name: String,
    /// Host loop interval in milliseconds
    pub tick_ms: u64,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            turn_timeout_secs: Some(30),
            min_players: 2,
            max_players: 4,
            bots: Vec::new(),
            advertise: false,
            table_name: "rummikub".to_string(),
            tick_ms: 50,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    /// Could not read the file
    Io { path: PathBuf, source: std::io::Error },
    /// File is not valid config JSON
    Parse { path: PathBuf, source: serde_json::Error },
    /// Values that cannot run a table
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "could not read {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "could not parse {}: {}", path.display(), source)
            }
            ConfigError::Invalid(reason) => write!(f, "invalid config: {}", reason),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl Config {
    /// Load from `path`, or from the platform config file when it exists,
    /// or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// `<config dir>/config.json` for this platform
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "rummikub").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_players < 2 {
            return Err(ConfigError::Invalid(format!(
                "min_players must be at least 2, got {}",
                self.min_players
            )));
        }
        if self.max_players < self.min_players {
            return Err(ConfigError::Invalid(format!(
                "max_players ({}) is below min_players ({})",
                self.max_players, self.min_players
            )));
        }
        if self.bots.len() > self.max_players {
            return Err(ConfigError::Invalid(format!(
                "{} bots do not fit in {} seats",
                self.bots.len(),
                self.max_players
            )));
        }
        if self.turn_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid("turn_timeout_secs must be positive".to_string()));
        }
        Ok(())
    }

    pub fn turn_timeout(&self) -> Option<Duration> {
        self.turn_timeout_secs.map(Duration::from_secs)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}
