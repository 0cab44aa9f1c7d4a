/// Configuration for the overlay engine
use crate::language::normalize_language_code;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_ERROR_INDICATOR_MS: u64 = 3_000;
pub const DEFAULT_REMOUNT_DEBOUNCE_MS: u64 = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to write config file {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("failed to serialize config: {0}")]
    Serialize(String),
    #[error("invalid endpoint '{0}'")]
    InvalidEndpoint(String),
    #[error("timeoutMs must be greater than zero")]
    ZeroTimeout,
    #[error("unsupported default language '{0}'")]
    UnsupportedLanguage(String),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OverlayConfig {
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_language")]
    pub default_language: String,
    /// How long a failed manual translation keeps its error label.
    #[serde(default = "default_error_indicator_ms")]
    pub error_indicator_ms: u64,
    #[serde(default = "default_remount_debounce_ms")]
    pub remount_debounce_ms: u64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_language() -> String {
    "ko".to_string()
}

fn default_error_indicator_ms() -> u64 {
    DEFAULT_ERROR_INDICATOR_MS
}

fn default_remount_debounce_ms() -> u64 {
    DEFAULT_REMOUNT_DEBOUNCE_MS
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8787/translate".to_string(),
            api_key: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            default_language: default_language(),
            error_indicator_ms: DEFAULT_ERROR_INDICATOR_MS,
            remount_debounce_ms: DEFAULT_REMOUNT_DEBOUNCE_MS,
        }
    }
}

impl OverlayConfig {
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a YAML file and validate it.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string_lossy().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn to_yaml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content =
            serde_yaml::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_string_lossy().to_string(),
                source,
            })?;
        }
        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_string_lossy().to_string(),
            source,
        })
    }

    /// Load from JSON string (for host integration)
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.endpoint_url()?;
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        normalize_language_code(&self.default_language)
            .map_err(|_| ConfigError::UnsupportedLanguage(self.default_language.clone()))?;
        Ok(())
    }

    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(self.endpoint.trim())
            .map_err(|_| ConfigError::InvalidEndpoint(self.endpoint.clone()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEndpoint(self.endpoint.clone()));
        }
        Ok(url)
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn error_indicator_delay(&self) -> Duration {
        Duration::from_millis(self.error_indicator_ms)
    }

    pub fn remount_debounce(&self) -> Duration {
        Duration::from_millis(self.remount_debounce_ms)
    }
}

/// Default location of the config file under the platform config dir.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("translation-overlay")
        .join("config.yaml")
}
