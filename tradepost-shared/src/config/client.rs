use serde::{Deserialize, Serialize};
use std::{env, fmt, fs, path::Path, path::PathBuf, str::FromStr, time::Duration};
use tracing::debug;
use url::Url;

use super::ConfigError;

const ENV_BASE_URL: &str = "TRADEPOST_API_BASE_URL";
const ENV_LOG_LEVEL: &str = "TRADEPOST_LOG_LEVEL";
const ENV_LOG_FORMAT: &str = "TRADEPOST_LOG_FORMAT";
const ENV_POLL_CONVERSATIONS: &str = "TRADEPOST_POLL_CONVERSATIONS_SECS";
const ENV_POLL_THREAD: &str = "TRADEPOST_POLL_THREAD_SECS";
const ENV_POLL_UNREAD: &str = "TRADEPOST_POLL_UNREAD_SECS";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level directive; `RUST_LOG` still wins when set.
    pub level: String,
    /// Line format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Paths of the messaging endpoints, relative to [`ApiConfig::base_url`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// `POST`, query `senderId`.
    pub send: String,
    /// `GET`, query `userId`.
    pub conversations: String,
    /// `GET`, query `userId`, `otherUserId`, `productId`.
    pub conversation: String,
    /// `GET`, query `userId`.
    pub unread_count: String,
    /// `PUT`, query `userId`; `{messageId}` is substituted.
    pub mark_read: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            send: "/messages/send".to_string(),
            conversations: "/messages/conversations".to_string(),
            conversation: "/messages/conversation".to_string(),
            unread_count: "/messages/unread-count".to_string(),
            mark_read: "/messages/{messageId}/mark-read".to_string(),
        }
    }
}

impl EndpointConfig {
    /// Mark-read path with the message id substituted.
    #[must_use]
    pub fn mark_read_path(&self, message_id: impl fmt::Display) -> String {
        self.mark_read
            .replace("{messageId}", &message_id.to_string())
    }
}

/// Where and how to reach the messaging backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Backend origin, optionally with a path prefix.
    pub base_url: Url,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
    /// Endpoint paths.
    pub endpoints: EndpointConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: 15,
            endpoints: EndpointConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Resolves an endpoint path against the base URL, keeping any path
    /// prefix the base URL carries.
    ///
    /// # Errors
    /// Returns the parse error if the joined string is not a valid URL.
    pub fn url_for(&self, path: &str) -> Result<Url, url::ParseError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/{}", path.trim_start_matches('/')))
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Poll cadences, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Slow cadence for the conversation list.
    pub conversations_seconds: u64,
    /// Fast cadence for the active thread.
    pub thread_seconds: u64,
    /// Cadence of the navigation badge refresh.
    pub unread_seconds: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            conversations_seconds: 60,
            thread_seconds: 5,
            unread_seconds: 30,
        }
    }
}

impl PollingConfig {
    /// Conversation list cadence.
    #[must_use]
    pub const fn conversations_interval(&self) -> Duration {
        Duration::from_secs(self.conversations_seconds)
    }

    /// Active thread cadence.
    #[must_use]
    pub const fn thread_interval(&self) -> Duration {
        Duration::from_secs(self.thread_seconds)
    }

    /// Badge refresh cadence.
    #[must_use]
    pub const fn unread_interval(&self) -> Duration {
        Duration::from_secs(self.unread_seconds)
    }
}

/// Serialization formats accepted for configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.yaml` / `.yml`
    Yaml,
    /// `.json`
    Json,
    /// `.toml`
    Toml,
}

impl ConfigFormat {
    /// Picks the format from a file extension.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnsupportedFormat`] for unknown or missing extensions.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        extension.parse()
    }

    /// Conventional file name for a generated config in this format.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Yaml => "config.yaml",
            Self::Json => "config.json",
            Self::Toml => "config.toml",
        }
    }
}

impl FromStr for ConfigFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            "toml" => Ok(Self::Toml),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Complete client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend location and endpoint paths.
    pub api: ApiConfig,
    /// Poll cadences.
    pub polling: PollingConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Generates a default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Resolves the configuration: defaults, then the file (if any), then
    /// environment variables, then the explicit base URL override, and
    /// finally validation.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the file cannot be read or parsed, an
    /// environment override is malformed, or validation fails.
    pub fn load_config(
        config_path: Option<PathBuf>,
        base_url_override: Option<Url>,
    ) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => Self::from_file(&path)?,
            None => Self::with_defaults(),
        };

        config.apply_env_overrides()?;

        if let Some(base_url) = base_url_override {
            config.api.base_url = base_url;
        }

        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Reads a configuration file; missing fields take their defaults.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let format = ConfigFormat::from_path(path)?;
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), ?format, "loading configuration file");
        Self::parse(&content, format)
    }

    /// Parses configuration text in the given format.
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] when the text is malformed.
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        match format {
            ConfigFormat::Yaml => {
                serde_yml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
            }
            ConfigFormat::Json => {
                serde_json::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
            }
            ConfigFormat::Toml => {
                toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
            }
        }
    }

    /// Serializes the configuration in the given format.
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] if serialization fails.
    pub fn render(&self, format: ConfigFormat) -> Result<String, ConfigError> {
        match format {
            ConfigFormat::Yaml => {
                serde_yml::to_string(self).map_err(|err| ConfigError::Parse(err.to_string()))
            }
            ConfigFormat::Json => {
                serde_json::to_string_pretty(self).map_err(|err| ConfigError::Parse(err.to_string()))
            }
            ConfigFormat::Toml => {
                toml::to_string_pretty(self).map_err(|err| ConfigError::Parse(err.to_string()))
            }
        }
    }

    /// Applies `TRADEPOST_*` environment variables on top of the current values.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidOverride`] when a variable cannot be parsed.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(value) = env::var(ENV_BASE_URL) {
            self.api.base_url = Url::parse(&value).map_err(|_| invalid(ENV_BASE_URL, &value))?;
        }
        if let Ok(value) = env::var(ENV_LOG_LEVEL) {
            self.logging.level = value;
        }
        if let Ok(value) = env::var(ENV_LOG_FORMAT) {
            self.logging.format = value.parse().map_err(|_| invalid(ENV_LOG_FORMAT, &value))?;
        }
        if let Some(seconds) = env_seconds(ENV_POLL_CONVERSATIONS)? {
            self.polling.conversations_seconds = seconds;
        }
        if let Some(seconds) = env_seconds(ENV_POLL_THREAD)? {
            self.polling.thread_seconds = seconds;
        }
        if let Some(seconds) = env_seconds(ENV_POLL_UNREAD)? {
            self.polling.unread_seconds = seconds;
        }
        Ok(())
    }

    /// Validate the complete configuration.
    ///
    /// # Errors
    /// Returns every problem found, not just the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !matches!(self.api.base_url.scheme(), "http" | "https") {
            errors.push(format!(
                "API base URL must use http or https: {}",
                self.api.base_url
            ));
        }
        if self.api.timeout_seconds == 0 {
            errors.push("API timeout must be greater than 0 seconds.".to_string());
        }
        if self.polling.conversations_seconds == 0 {
            errors.push("Conversation poll interval must be greater than 0.".to_string());
        }
        if self.polling.thread_seconds == 0 {
            errors.push("Thread poll interval must be greater than 0.".to_string());
        }
        if self.polling.unread_seconds == 0 {
            errors.push("Unread poll interval must be greater than 0.".to_string());
        }
        if self.polling.thread_seconds >= self.polling.conversations_seconds {
            errors.push(format!(
                "Thread poll interval ({}s) must be shorter than the conversation poll interval ({}s).",
                self.polling.thread_seconds, self.polling.conversations_seconds
            ));
        }
        if !self.api.endpoints.mark_read.contains("{messageId}") {
            errors.push("Mark-read endpoint must contain a {messageId} placeholder.".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn default_base_url() -> Url {
    Url::parse("http://localhost:8080").unwrap_or_else(|_| unreachable!("static URL is valid"))
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidOverride {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn env_seconds(key: &str) -> Result<Option<u64>, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| invalid(key, &value)),
        Err(_) => Ok(None),
    }
}
