//! Configuration management for deskd.
//!
//! Loads settings from ~/.config/deskd/config.toml or uses defaults.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Config file location relative to the user config directory.
pub const CONFIG_FILE: &str = "deskd/config.toml";

/// Classification oracle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used when the session snapshot carries none
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_model() -> String {
    desk_shared::DEFAULT_MODEL.to_string()
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
        }
    }
}

/// Mail gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// File holding the OAuth access token
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,

    /// Messages fetched per inbox sync
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
}

fn default_token_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("deskd/token")
}

fn default_fetch_limit() -> usize {
    20
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            token_path: default_token_path(),
            fetch_limit: default_fetch_limit(),
        }
    }
}

/// Session store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Session snapshot file
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
}

fn default_snapshot_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("deskd/session.json")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
        }
    }
}

/// Full deskd configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub oracle: OracleConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

impl Config {
    /// Load config from the user config directory, or return defaults.
    pub fn load() -> Self {
        let path = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_FILE);
        Self::load_from_path(&path).unwrap_or_else(|e| {
            warn!("Config not found, using defaults: {}", e);
            Config::default()
        })
    }

    /// Load config from specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save default config to path (for init)
    pub fn save_default(path: &Path) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        info!("Saved default config to {}", path.display());
        Ok(())
    }

    /// Read the oracle API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.oracle.api_key_env).map_err(|_| {
            anyhow::anyhow!("{} is not set in the environment", self.oracle.api_key_env)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.oracle.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.oracle.model, desk_shared::DEFAULT_MODEL);
        assert_eq!(config.gateway.fetch_limit, 20);
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
[oracle]
model = "gemini-pro-latest"

[gateway]
fetch_limit = 50
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.oracle.model, "gemini-pro-latest");
        assert_eq!(config.gateway.fetch_limit, 50);
        // Defaults for missing fields
        assert_eq!(config.oracle.api_key_env, "GEMINI_API_KEY");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deskd/config.toml");
        Config::save_default(&path).unwrap();
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.gateway.fetch_limit, 20);
    }
}
