/**
 * Server Configuration
 *
 * Loads the server's settings from the environment (after `.env` via
 * `dotenv`), optionally overridden by a TOML file named in
 * `HOMESYNC_CONFIG`.
 *
 * # Environment
 *
 * | Variable             | Default      | Meaning                              |
 * |----------------------|--------------|--------------------------------------|
 * | `API_HOST`           | `0.0.0.0`    | Bind address                         |
 * | `API_PORT`           | `3001`       | Bind port                            |
 * | `SESSION_SECRET`     | dev secret   | HS256 key for session tokens         |
 * | `DATABASE_URL`       | unset        | When set, sessions come from Postgres|
 * | `WS_OUTBOUND_BUFFER` | `64`         | Frames queued per connection         |
 * | `RUST_LOG`           | `info`       | Tracing filter                       |
 *
 * # Error Handling
 *
 * Unparseable values are a `ConfigError`; the binary exits non-zero on it.
 *
 * Loading runs before the tracing subscriber exists, so nothing here logs.
 * `startup_notices` lists what the operator should hear about; the binary
 * logs them once tracing is installed.
 */

use crate::backend::server::state::DEFAULT_OUTBOUND_BUFFER;
use crate::shared::config::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_LOG_FILTER: &str = "info";
const DEV_SESSION_SECRET: &str = "homesync-dev-secret";

/// Where session credentials are validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionBackend {
    /// Signed tokens, no storage lookup
    Jwt { secret: String },
    /// The `sessions` table
    Postgres { database_url: String },
}

/// Fully resolved server settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub session: SessionBackend,
    pub outbound_buffer: usize,
    pub log_filter: String,
    /// Set once `apply_file` has merged a TOML file
    pub overrides_file: Option<PathBuf>,
}

/// Something worth reporting once logging is up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigNotice {
    DevelopmentSecret,
    FileOverrides(PathBuf),
}

impl fmt::Display for ConfigNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DevelopmentSecret => {
                write!(f, "SESSION_SECRET not set, using the development secret")
            }
            Self::FileOverrides(path) => write!(f, "Loaded overrides from {}", path.display()),
        }
    }
}

/// Optional overrides read from `HOMESYNC_CONFIG`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    host: Option<String>,
    port: Option<u16>,
    session_secret: Option<String>,
    database_url: Option<String>,
    outbound_buffer: Option<usize>,
    log_filter: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            session: SessionBackend::Jwt {
                secret: DEV_SESSION_SECRET.to_string(),
            },
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            overrides_file: None,
        }
    }
}

impl ServerConfig {
    /// Load from `.env`, the process environment and `HOMESYNC_CONFIG`
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is normal outside development
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(host) = var("API_HOST") {
            config.host = host;
        }
        if let Some(port) = var("API_PORT") {
            config.port = parse_field("API_PORT", &port)?;
        }
        if let Some(buffer) = var("WS_OUTBOUND_BUFFER") {
            config.outbound_buffer = parse_field("WS_OUTBOUND_BUFFER", &buffer)?;
        }
        if let Some(filter) = var("RUST_LOG") {
            config.log_filter = filter;
        }

        config.session = match (var("DATABASE_URL"), var("SESSION_SECRET")) {
            (Some(database_url), _) => SessionBackend::Postgres { database_url },
            (None, Some(secret)) => SessionBackend::Jwt { secret },
            (None, None) => SessionBackend::Jwt {
                secret: DEV_SESSION_SECRET.to_string(),
            },
        };

        if let Some(path) = var("HOMESYNC_CONFIG") {
            config.apply_file(Path::new(&path))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Override fields with the contents of a TOML file
    pub fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let file: FileConfig = toml::from_str(&text)?;
        self.overrides_file = Some(path.to_path_buf());

        if let Some(host) = file.host {
            self.host = host;
        }
        if let Some(port) = file.port {
            self.port = port;
        }
        if let Some(buffer) = file.outbound_buffer {
            self.outbound_buffer = buffer;
        }
        if let Some(filter) = file.log_filter {
            self.log_filter = filter;
        }
        match (file.database_url, file.session_secret) {
            (Some(database_url), _) => self.session = SessionBackend::Postgres { database_url },
            (None, Some(secret)) => self.session = SessionBackend::Jwt { secret },
            (None, None) => {}
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outbound_buffer == 0 {
            return Err(ConfigError::Invalid {
                field: "outbound_buffer",
                message: "must be at least 1".to_string(),
            });
        }
        if let SessionBackend::Jwt { secret } = &self.session {
            if secret.is_empty() {
                return Err(ConfigError::MissingValue("SESSION_SECRET"));
            }
        }
        if self.host.is_empty() || self.host.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                field: "host",
                message: format!("{:?} is not a host name or address", self.host),
            });
        }
        Ok(())
    }

    pub fn startup_notices(&self) -> Vec<ConfigNotice> {
        let mut notices = Vec::new();
        if matches!(&self.session, SessionBackend::Jwt { secret } if secret == DEV_SESSION_SECRET) {
            notices.push(ConfigNotice::DevelopmentSecret);
        }
        if let Some(path) = &self.overrides_file {
            notices.push(ConfigNotice::FileOverrides(path.clone()));
        }
        notices
    }

    /// Log `startup_notices`; call after the subscriber is installed
    pub fn log_startup_notices(&self) {
        for notice in self.startup_notices() {
            match notice {
                ConfigNotice::DevelopmentSecret => tracing::warn!("[Config] {}", notice),
                ConfigNotice::FileOverrides(_) => tracing::info!("[Config] {}", notice),
            }
        }
    }

    /// `host:port` string handed to the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_field<T>(field: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        field,
        message: format!("{:?}: {}", value, e),
    })
}
