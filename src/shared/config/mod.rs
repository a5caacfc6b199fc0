//! Application configuration module
//!
//! Configuration for the client reconnection agent, plus the endpoint paths
//! both sides agree on.

use std::time::Duration;
use thiserror::Error;

/// Path of the realtime upgrade endpoint
pub const WS_PATH: &str = "/api/ws";

/// Path of the read-only registry diagnostics endpoint
pub const WS_STATS_PATH: &str = "/api/ws/stats";

/// Name of the cookie carrying the session credential
pub const SESSION_COOKIE: &str = "sessionId";

/// WebSocket close code the server uses to refuse a credential
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;

const DEFAULT_BASE_INTERVAL: Duration = Duration::from_millis(2000);
const DEFAULT_CAP_INTERVAL: Duration = Duration::from_millis(30_000);
const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Client agent configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Fully derived socket endpoint, e.g. `wss://home.example/api/ws`
    pub endpoint: String,
    /// Session id sent as the `sessionId` cookie on every attempt
    pub session_cookie: Option<String>,
    /// First reconnect delay
    pub base_interval: Duration,
    /// Upper bound for any reconnect delay
    pub cap_interval: Duration,
    /// Scheduled retries allowed before the agent gives up
    pub max_attempts: u32,
}

impl AgentConfig {
    /// Create a new AgentConfigBuilder
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.endpoint.starts_with("ws://") || self.endpoint.starts_with("wss://")) {
            return Err(ConfigError::InvalidUrl(self.endpoint.clone()));
        }
        if self.base_interval.is_zero() {
            return Err(ConfigError::Invalid {
                field: "base_interval",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.cap_interval < self.base_interval {
            return Err(ConfigError::Invalid {
                field: "cap_interval",
                message: "must not be smaller than base_interval".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for AgentConfig
#[derive(Debug, Default)]
pub struct AgentConfigBuilder {
    server_url: Option<String>,
    endpoint: Option<String>,
    session_cookie: Option<String>,
    base_interval: Option<Duration>,
    cap_interval: Option<Duration>,
    max_attempts: Option<u32>,
}

impl AgentConfigBuilder {
    /// Set the HTTP(S) base URL the endpoint is derived from
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    /// Use an explicit socket endpoint instead of deriving one
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Set the session credential
    pub fn session_cookie(mut self, session_id: impl Into<String>) -> Self {
        self.session_cookie = Some(session_id.into());
        self
    }

    pub fn base_interval(mut self, interval: Duration) -> Self {
        self.base_interval = Some(interval);
        self
    }

    pub fn cap_interval(mut self, interval: Duration) -> Self {
        self.cap_interval = Some(interval);
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AgentConfig, ConfigError> {
        let endpoint = match (self.endpoint, self.server_url) {
            (Some(endpoint), _) => endpoint,
            (None, Some(server_url)) => derive_endpoint(&server_url)?,
            (None, None) => return Err(ConfigError::MissingValue("server_url")),
        };

        let config = AgentConfig {
            endpoint,
            session_cookie: self.session_cookie,
            base_interval: self.base_interval.unwrap_or(DEFAULT_BASE_INTERVAL),
            cap_interval: self.cap_interval.unwrap_or(DEFAULT_CAP_INTERVAL),
            max_attempts: self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Map `http(s)://host[/]` to `ws(s)://host/api/ws`
pub fn derive_endpoint(server_url: &str) -> Result<String, ConfigError> {
    let trimmed = server_url.trim().trim_end_matches('/');
    let (scheme, rest) = trimmed
        .split_once("://")
        .ok_or_else(|| ConfigError::InvalidUrl(server_url.to_string()))?;

    let ws_scheme = match scheme {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        _ => return Err(ConfigError::InvalidUrl(server_url.to_string())),
    };
    if rest.is_empty() {
        return Err(ConfigError::InvalidUrl(server_url.to_string()));
    }

    Ok(format!("{}://{}{}", ws_scheme, rest, WS_PATH))
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
}
