//! Configuration management for the chat stream server.
//!
//! Configuration is read once from environment variables (optionally seeded
//! from a `.env` file by the binary) and is read-only afterwards.

use serde::Serialize;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while building the configuration or the provider.
///
/// All of them are fatal at startup: the server never binds its listener
/// when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Live mode was selected but no provider credential is configured.
    #[error("OPENAI_API_KEY is required when USE_MOCK is not enabled")]
    MissingApiKey,

    /// A variable is set but cannot be parsed into the expected type.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    /// The upstream HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    /// Server configuration (host, port)
    pub server: ServerConfig,

    /// Generation provider configuration
    pub provider: ProviderConfig,
}

/// Server-specific configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,
}

/// Settings for the generation provider.
///
/// `use_mock` selects the provider variant once, at construction time.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderConfig {
    /// Serve deterministic synthetic output instead of calling the upstream
    pub use_mock: bool,

    /// Upstream model identifier
    pub model: String,

    /// Upstream credential; required unless `use_mock` is set
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Base URL of the upstream API
    pub api_base: String,

    /// Upstream timeout in seconds: whole request for `complete`, response
    /// headers for `stream`
    pub request_timeout_secs: u64,

    /// Delay between mock fragments in milliseconds
    pub mock_delay_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            use_mock: false,
            model: default_model(),
            api_key: None,
            api_base: default_api_base(),
            request_timeout_secs: default_request_timeout(),
            mock_delay_ms: default_mock_delay(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_model() -> String {
    "gpt-5".to_string()
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_request_timeout() -> u64 {
    300
}

fn default_mock_delay() -> u64 {
    80
}

impl AppConfig {
    /// Build the configuration from process environment variables.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use chat_stream_server::core::config::AppConfig;
    ///
    /// let config = AppConfig::from_env().expect("invalid configuration");
    /// ```
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    ///
    /// Unset and empty variables fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = AppConfig {
            server: ServerConfig::default(),
            provider: ProviderConfig::default(),
        };

        if let Some(host) = get("HOST") {
            config.server.host = host;
        }
        if let Some(port) = get("PORT") {
            config.server.port = parse_value("PORT", &port)?;
        }

        if let Some(use_mock) = get("USE_MOCK") {
            config.provider.use_mock = str_to_bool(&use_mock);
        }
        if let Some(model) = get("OPENAI_MODEL") {
            config.provider.model = model;
        }
        config.provider.api_key = get("OPENAI_API_KEY");
        if let Some(api_base) = get("OPENAI_API_BASE") {
            config.provider.api_base = api_base.trim_end_matches('/').to_string();
        }
        if let Some(timeout) = get("REQUEST_TIMEOUT_SECS") {
            config.provider.request_timeout_secs = parse_value("REQUEST_TIMEOUT_SECS", &timeout)?;
        }
        if let Some(delay) = get("MOCK_DELAY_MS") {
            config.provider.mock_delay_ms = parse_value("MOCK_DELAY_MS", &delay)?;
        }

        Ok(config)
    }

    /// Socket address string the server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Convert string to boolean.
///
/// Accepts: "true", "1", "yes", "on" (case-insensitive)
fn str_to_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
