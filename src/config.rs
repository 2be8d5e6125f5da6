//! Configuration for the ledger node.
//!
//! Values come from an optional `config.toml`, then environment overrides
//! (`URL`, `PORT`, `LEDGER_DATA_DIR`, `LEDGER_DIFFICULTY`, `LEDGER_MINING_REWARD`).

use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_data_dir(),
        }
    }
}

/// Consensus parameters of the ledger
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Leading zero hex digits required of a block hash
    #[serde(default = "default_difficulty")]
    pub difficulty: usize,
    /// Amount credited to the miner of each block
    #[serde(default = "default_mining_reward")]
    pub mining_reward: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            mining_reward: default_mining_reward(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_data_dir() -> String {
    "data/ledger".to_string()
}

fn default_difficulty() -> usize {
    2
}

fn default_mining_reward() -> u64 {
    100
}

impl Config {
    /// Parses a TOML document; missing sections fall back to defaults
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies environment overrides through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("URL") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = parse_env("PORT", port)?;
        }
        if let Some(path) = lookup("LEDGER_DATA_DIR") {
            self.storage.path = path;
        }
        if let Some(difficulty) = lookup("LEDGER_DIFFICULTY") {
            self.ledger.difficulty = parse_env("LEDGER_DIFFICULTY", difficulty)?;
        }
        if let Some(reward) = lookup("LEDGER_MINING_REWARD") {
            self.ledger.mining_reward = parse_env("LEDGER_MINING_REWARD", reward)?;
        }
        self.validate()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.path.is_empty() {
            return Err(ConfigError::Invalid("storage.path must not be empty".to_string()));
        }
        // A sha256 hex digest has 64 digits
        if self.ledger.difficulty > 64 {
            return Err(ConfigError::Invalid(format!(
                "ledger.difficulty must be at most 64, got {}",
                self.ledger.difficulty
            )));
        }
        if self.ledger.mining_reward == 0 {
            return Err(ConfigError::Invalid("ledger.mining_reward must be positive".to_string()));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value,
    })
}

/// Loads `path` if it exists (defaults otherwise) and applies the process environment
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let mut config = if path.exists() {
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Config::from_toml(&source)?
    } else {
        Config::default()
    };

    config.apply_env(|key| std::env::var(key).ok())?;
    Ok(config)
}
