//! Client configuration: credentials, endpoint, transport and per-call options.

use std::collections::HashMap;
use std::time::Duration;

use crate::client::ClientError;
use crate::model::{GenerationConfig, SafetySetting};

/// Public Gemini endpoint for model-scoped calls.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Environment variable overriding [`DEFAULT_BASE_URL`].
pub const BASE_URL_ENV: &str = "GEMINI_BASE_URL";

/// A secret string type for sensitive data like API keys.
/// Prevents accidental logging or display of secrets.
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret string.
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Get the underlying secret value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// Credentials and endpoint of the Gemini API.
///
/// # Example
/// ```rust
/// use gemstream::options::GeminiConfig;
///
/// let config = GeminiConfig::new("my-key").with_base_url("http://localhost:8080/v1beta/models/");
/// assert_eq!(config.base_url(), "http://localhost:8080/v1beta/models");
/// ```
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    api_key: SecretString,
    base_url: String,
}

impl GeminiConfig {
    /// Create a configuration pointing at the public endpoint.
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Read `GEMINI_API_KEY` and, when set, `GEMINI_BASE_URL`.
    pub fn from_env() -> Result<Self, ClientError> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ClientError::Config(format!("{API_KEY_ENV} is not set")))?;

        let config = Self::new(api_key);
        Ok(match std::env::var(BASE_URL_ENV) {
            Ok(base_url) if !base_url.trim().is_empty() => config.with_base_url(base_url),
            _ => config,
        })
    }

    /// Set the base URL. Trailing slashes are dropped.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Settings for the reqwest-backed transport.
///
/// # Example
/// ```rust
/// use gemstream::options::TransportOptions;
/// use std::time::Duration;
///
/// let options = TransportOptions::default()
///     .with_timeout(Duration::from_secs(30))
///     .with_header("x-goog-user-project".to_string(), "demo".to_string());
/// assert!(options.extra_headers.is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    /// Request timeout. For streaming calls this bounds the whole body read.
    pub timeout: Option<Duration>,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// Additional HTTP headers to include in requests
    pub extra_headers: Option<HashMap<String, String>>,
}

impl TransportOptions {
    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }
}

/// Optional settings forwarded verbatim into generate and count-tokens bodies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateOptions {
    pub generation_config: Option<GenerationConfig>,
    pub safety_settings: Option<Vec<SafetySetting>>,
}

impl GenerateOptions {
    pub fn with_generation_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = Some(config);
        self
    }

    /// Append one safety setting.
    pub fn with_safety_setting(mut self, setting: SafetySetting) -> Self {
        self.safety_settings
            .get_or_insert_with(Vec::new)
            .push(setting);
        self
    }
}
