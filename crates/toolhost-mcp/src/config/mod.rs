//! Configuration loading and resolution.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::transport::framing::DEFAULT_MAX_MESSAGE_BYTES;
use crate::types::{McpError, McpResult};

pub const CONFIG_ENV: &str = "TOOLHOST_CONFIG";
pub const LM_STUDIO_URL_ENV: &str = "LM_STUDIO_URL";
pub const DEFAULT_CONFIG_PATH: &str = "config/toolhost.json";

/// Effective server configuration. Every field has a default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub tools: ToolsConfig,
    pub files: FilesConfig,
    pub api: ApiConfig,
    pub lm_studio: LmStudioConfig,
    pub resources: ResourcesConfig,
    pub logging: LoggingConfig,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Tool names to register. Empty means every built-in tool.
    pub enabled: Vec<String>,
}

impl ToolsConfig {
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.is_empty() || self.enabled.iter().any(|n| n == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Root of the file-tool sandbox.
    pub base_path: PathBuf,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("./data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmStudioConfig {
    pub enabled: bool,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for LmStudioConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "http://localhost:1234".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourcesConfig {
    pub enabled: bool,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub tool_timeout_secs: u64,
    pub max_message_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

impl ServerSettings {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

/// Where the configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// `--config` flag; the file must exist.
    Explicit(PathBuf),
    /// `TOOLHOST_CONFIG`; the file must exist.
    Env(PathBuf),
    /// `./config/toolhost.json`, used only if present.
    DefaultFile(PathBuf),
    Defaults,
}

/// Resolve the config source: flag, then environment, then the default file.
pub fn resolve_config_source(explicit: Option<&Path>, env_path: Option<String>) -> ConfigSource {
    if let Some(path) = explicit {
        return ConfigSource::Explicit(path.to_path_buf());
    }

    if let Some(path) = env_path.filter(|p| !p.is_empty()) {
        return ConfigSource::Env(PathBuf::from(path));
    }

    let default_file = PathBuf::from(DEFAULT_CONFIG_PATH);
    if default_file.exists() {
        return ConfigSource::DefaultFile(default_file);
    }

    ConfigSource::Defaults
}

impl ServerConfig {
    /// Read and parse one JSON config file.
    pub fn from_file(path: &Path) -> McpResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            McpError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&text)
            .map_err(|e| McpError::Config(format!("invalid config {}: {e}", path.display())))
    }

    pub fn from_source(source: &ConfigSource) -> McpResult<Self> {
        match source {
            ConfigSource::Explicit(path)
            | ConfigSource::Env(path)
            | ConfigSource::DefaultFile(path) => {
                tracing::info!("Loading configuration from {}", path.display());
                Self::from_file(path)
            }
            ConfigSource::Defaults => {
                tracing::info!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Environment overrides applied after the file is read.
    pub fn apply_overrides(&mut self, lm_studio_url: Option<String>) {
        if let Some(url) = lm_studio_url.filter(|u| !u.is_empty()) {
            tracing::debug!("{LM_STUDIO_URL_ENV} overrides lm_studio.base_url with {url}");
            self.lm_studio.base_url = url;
        }
    }

    pub fn validate(&self) -> McpResult<()> {
        if self.server.max_message_bytes == 0 {
            return Err(McpError::Config(
                "server.max_message_bytes must be greater than zero".to_string(),
            ));
        }
        if self.server.tool_timeout_secs == 0 {
            return Err(McpError::Config(
                "server.tool_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.lm_studio.enabled
            && !(self.lm_studio.base_url.starts_with("http://")
                || self.lm_studio.base_url.starts_with("https://"))
        {
            return Err(McpError::Config(format!(
                "lm_studio.base_url must be an http(s) URL, got {}",
                self.lm_studio.base_url
            )));
        }
        Ok(())
    }
}

/// Load the effective configuration the way the binary does.
pub fn load_config(explicit: Option<&Path>) -> McpResult<ServerConfig> {
    let source = resolve_config_source(explicit, std::env::var(CONFIG_ENV).ok());
    let mut config = ServerConfig::from_source(&source)?;
    config.apply_overrides(std::env::var(LM_STUDIO_URL_ENV).ok());
    config.validate()?;
    Ok(config)
}
