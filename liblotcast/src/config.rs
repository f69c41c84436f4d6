//! Configuration management for Lotcast

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};
use crate::generator::{DEFAULT_FRAGMENT_THRESHOLD, DEFAULT_MODEL_TIMEOUT};
use crate::orchestrator::DEFAULT_PLATFORM_TIMEOUT;
use crate::quota::DEFAULT_FREE_POST_LIMIT;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Base URL of an OpenAI-compatible completions endpoint; when
    /// absent, only template generation is available
    pub endpoint: Option<String>,
    pub model: Option<String>,
    #[serde(default = "default_fragment_threshold")]
    pub fragment_threshold: usize,
    #[serde(default = "default_model_timeout_secs")]
    pub model_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    #[serde(default = "default_platform_timeout_secs")]
    pub platform_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    #[serde(default = "default_free_post_limit")]
    pub free_post_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    pub platforms: Vec<String>,
}

fn default_fragment_threshold() -> usize {
    DEFAULT_FRAGMENT_THRESHOLD
}

fn default_model_timeout_secs() -> u64 {
    DEFAULT_MODEL_TIMEOUT.as_secs()
}

fn default_platform_timeout_secs() -> u64 {
    DEFAULT_PLATFORM_TIMEOUT.as_secs()
}

fn default_free_post_limit() -> u32 {
    DEFAULT_FREE_POST_LIMIT
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: None,
            fragment_threshold: default_fragment_threshold(),
            model_timeout_secs: default_model_timeout_secs(),
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            platform_timeout_secs: default_platform_timeout_secs(),
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            free_post_limit: default_free_post_limit(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            platforms: vec!["facebook".to_string()],
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/lotcast/posts.db".to_string(),
            },
            generation: GenerationConfig::default(),
            publish: PublishConfig::default(),
            quota: QuotaConfig::default(),
            defaults: DefaultsConfig::default(),
        }
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("LOTCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("lotcast").join("config.toml"))
}

/// Resolve the data directory path following XDG Base Directory spec
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir =
        dirs::data_dir().ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("lotcast"))
}
