//! Process configuration, resolved once at startup.

use std::path::Path;

use thiserror::Error;

pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
pub const DATABASE_PATH_ENV: &str = "TODO_DATABASE";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const TEST_RESET_ENV: &str = "TODO_TEST_RESET";

pub const DEFAULT_DATABASE_FILE: &str = "todo.sqlite3";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a port number, got {value:?}")]
    InvalidPort { name: &'static str, value: String },
    #[error("{name} must be a boolean flag, got {value:?}")]
    InvalidFlag { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Enables `POST /api/_reset`. Never turn this on in production.
    pub test_reset: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: sqlite_url(Path::new(DEFAULT_DATABASE_FILE)),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            test_reset: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration from `lookup`, falling back to defaults for
    /// unset or blank keys. `DATABASE_URL` wins over `TODO_DATABASE`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(url) = get(DATABASE_URL_ENV) {
            config.database_url = url;
        } else if let Some(path) = get(DATABASE_PATH_ENV) {
            config.database_url = sqlite_url(Path::new(&path));
        }
        if let Some(host) = get(HOST_ENV) {
            config.host = host;
        }
        if let Some(port) = get(PORT_ENV) {
            config.port = parse_port(PORT_ENV, &port)?;
        }
        if let Some(flag) = get(TEST_RESET_ENV) {
            config.test_reset = parse_flag(TEST_RESET_ENV, &flag)?;
        }

        tracing::debug!(
            database_url = %config.database_url,
            test_reset = config.test_reset,
            "Resolved configuration"
        );
        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Connection string for a SQLite file, created on first connect.
pub fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}?mode=rwc", path.to_string_lossy())
}

pub fn parse_port(name: &'static str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidPort {
        name,
        value: value.to_string(),
    })
}

pub fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            name,
            value: value.to_string(),
        }),
    }
}
