//! Configuration for the Gyft server.
//!
//! Loaded from `gyft.json`. Every field has a default, unknown keys are
//! ignored, and the result is validated before use. The model API key is
//! never stored in the file; the file only names the environment variable
//! that holds it.

use std::path::Path;
use std::time::Duration;

use gyft_gemini::GeminiSettings;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "gyft.json";

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

/// Default request timeout for one model call, in seconds.
const fn default_timeout_secs() -> u64 {
    60
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_page_size() -> usize {
    12
}

const fn default_max_page_size() -> usize {
    100
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Model gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Public catalog paging.
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Where and how to reach the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Base URL of the `generateContent` API.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Timeout for one model call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
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

/// Paging limits for the public catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogConfig {
    /// Page size when the request names none.
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Largest page size a request may ask for.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `gyft.json` in the current directory. If not found, returns
    /// the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is invalid.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            ServerError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads `gyft.json` from `dir`, or defaults when it is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is invalid.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::ConfigParseError` if the file cannot be read or
    /// is not valid JSON, and `ServerError::ConfigValidationError` if the
    /// values are out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(ServerError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ServerError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::ConfigValidationError` on the first failed check.
    pub fn validate(&self) -> Result<()> {
        let gateway = &self.gateway;

        if !(gateway.endpoint.starts_with("http://") || gateway.endpoint.starts_with("https://"))
        {
            return Err(ServerError::config_validation(
                format!("gateway.endpoint must be an http(s) URL, got '{}'", gateway.endpoint),
                "Set gateway.endpoint to e.g. https://generativelanguage.googleapis.com/v1beta in your gyft.json",
            ));
        }

        if gateway.model.trim().is_empty() {
            return Err(ServerError::config_validation(
                "gateway.model must not be empty",
                "Set gateway.model to e.g. gemini-2.0-flash in your gyft.json",
            ));
        }

        if gateway.api_key_env.trim().is_empty() {
            return Err(ServerError::config_validation(
                "gateway.apiKeyEnv must not be empty",
                "Name the environment variable holding the API key, e.g. GEMINI_API_KEY",
            ));
        }

        if gateway.timeout_secs == 0 {
            return Err(ServerError::config_validation(
                "gateway.timeoutSecs must be greater than 0",
                "Set gateway.timeoutSecs to at least 1 second in your gyft.json",
            ));
        }

        if self.server.host.trim().is_empty() {
            return Err(ServerError::config_validation(
                "server.host must not be empty",
                "Set server.host to e.g. 127.0.0.1 in your gyft.json",
            ));
        }

        if self.catalog.max_page_size == 0 {
            return Err(ServerError::config_validation(
                "catalog.maxPageSize must be greater than 0",
                "Set catalog.maxPageSize to at least 1 in your gyft.json",
            ));
        }

        if self.catalog.default_page_size == 0
            || self.catalog.default_page_size > self.catalog.max_page_size
        {
            return Err(ServerError::config_validation(
                format!(
                    "catalog.defaultPageSize must be between 1 and maxPageSize ({})",
                    self.catalog.max_page_size
                ),
                "Lower catalog.defaultPageSize or raise catalog.maxPageSize in your gyft.json",
            ));
        }

        Ok(())
    }

    /// Reads the API key from the configured environment variable.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::MissingCredential` when the variable is unset
    /// or blank.
    pub fn api_key(&self) -> Result<String> {
        self.api_key_with(|name| std::env::var(name).ok())
    }

    /// Like [`Config::api_key`], reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::MissingCredential` when `lookup` yields nothing
    /// or a blank value.
    pub fn api_key_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
        let var = &self.gateway.api_key_env;
        lookup(var)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ServerError::missing_credential(var.as_str()))
    }

    /// Connection settings for the Gemini gateway, with `api_key` filled in.
    #[must_use]
    pub fn gemini_settings(&self, api_key: String) -> GeminiSettings {
        GeminiSettings {
            endpoint: self.gateway.endpoint.clone(),
            model: self.gateway.model.clone(),
            api_key,
            timeout: Duration::from_secs(self.gateway.timeout_secs),
        }
    }

    /// `host:port` for the HTTP listener.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
