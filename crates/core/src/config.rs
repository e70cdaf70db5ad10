use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::{assets::get_config_dir, generation::GenerationOptions};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_BINARY: &str = "ollama";
const CONFIG_FILE_NAME: &str = "simplellm.yml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("File system error: {0}")]
    IO(#[from] std::io::Error),
    #[error("YAML parsing error: {0}")]
    YAMLError(#[from] serde_yaml::Error),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Where the service lives and how long each kind of call may take.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    pub binary: String,
    /// Arguments placed before every service subcommand, e.g. for a wrapper
    /// such as `docker exec <container> ollama`.
    pub binary_args: Vec<String>,
    pub readiness_timeout_ms: u64,
    pub list_timeout_ms: u64,
    pub generate_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            binary: DEFAULT_BINARY.to_string(),
            binary_args: Vec::new(),
            readiness_timeout_ms: 5_000,
            list_timeout_ms: 10_000,
            generate_timeout_ms: 60_000,
        }
    }
}

impl ServiceConfig {
    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }

    pub fn list_timeout(&self) -> Duration {
        Duration::from_millis(self.list_timeout_ms)
    }

    pub fn generate_timeout(&self) -> Duration {
        Duration::from_millis(self.generate_timeout_ms)
    }
}

/// Wait policy after auto-starting the service.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct StartupConfig {
    pub wait_ms: u64,
    pub attempts: u32,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            wait_ms: 3_000,
            attempts: 1,
        }
    }
}

impl StartupConfig {
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        let options = GenerationOptions::default();
        Self {
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        }
    }
}

impl ChatConfig {
    pub fn options(&self) -> GenerationOptions {
        GenerationOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub startup: StartupConfig,
    pub chat: ChatConfig,
}

impl Config {
    fn validate(self) -> Result<Self, ConfigError> {
        if self.service.base_url.trim().is_empty() {
            return Err(ConfigError::Config("service.base_url is empty".to_string()));
        }
        if self.service.binary.trim().is_empty() {
            return Err(ConfigError::Config("service.binary is empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.chat.temperature) {
            return Err(ConfigError::Config(format!(
                "chat.temperature must be between 0 and 2, got {}",
                self.chat.temperature
            )));
        }
        if self.chat.max_tokens == 0 {
            return Err(ConfigError::Config(
                "chat.max_tokens must be positive".to_string(),
            ));
        }
        Ok(self)
    }
}

/// Default location of the optional config file.
pub fn default_config_path() -> PathBuf {
    get_config_dir().join(CONFIG_FILE_NAME)
}

/// Loads the configuration.
///
/// An explicit path must exist. Without one, the default location is read if
/// present and built-in defaults are used otherwise. Nothing is ever written.
#[instrument(skip(config_path))]
pub fn get_config(config_path: Option<PathBuf>) -> Result<Config, ConfigError> {
    load_config(config_path.as_deref(), &default_config_path())
}

fn load_config(explicit: Option<&Path>, fallback: &Path) -> Result<Config, ConfigError> {
    let path = match explicit {
        Some(path) => path,
        None if fallback.exists() => fallback,
        None => {
            debug!("No config file at {}, using defaults", fallback.display());
            return Ok(Config::default());
        }
    };

    debug!("Loading config from {}", path.display());
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    let config: Config = serde_yaml::from_str(&content)?;
    config.validate()
}
