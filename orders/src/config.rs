//! Configuration management for the order server.
//!
//! Loads configuration from environment variables with sensible defaults.
//! A `.env` file in the working directory is honoured by the binary.

use bookstore_postgres::PoolConfig;
use bookstore_runtime::NotifierConfig;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Invalid or incomplete configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but does not parse.
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        /// Environment variable name
        key: &'static str,
        /// Raw value
        value: String,
        /// Parser message
        reason: String,
    },

    /// `STORAGE_BACKEND` names an unsupported backend.
    #[error("unknown storage backend {0:?}, expected \"memory\" or \"postgres\"")]
    UnknownBackend(String),

    /// The postgres backend was selected without `DATABASE_URL`.
    #[error("DATABASE_URL is required when STORAGE_BACKEND=postgres")]
    MissingDatabaseUrl,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Order store configuration
    pub storage: StorageConfig,
    /// Notification fan-out tuning
    pub notify: NotifierConfig,
    /// Prometheus exporter port; disabled when unset
    pub metrics_port: Option<u16>,
    /// Lifetime of cached orders; `None` disables the cache
    pub cache_ttl: Option<Duration>,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// How long in-flight requests may run after a shutdown signal
    pub shutdown_timeout: Duration,
}

/// Where orders are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    /// Process-local store; contents are lost on restart.
    Memory,
    /// `PostgreSQL` document store.
    Postgres {
        /// Connection URL
        url: String,
        /// Pool settings
        pool: PoolConfig,
    },
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a variable is malformed or the storage
    /// selection is incomplete.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = NotifierConfig::default();

        Ok(Self {
            server: ServerConfig {
                host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse(&lookup, "PORT", 8080)?,
                shutdown_timeout: Duration::from_secs(parse(&lookup, "SHUTDOWN_TIMEOUT", 30)?),
            },
            storage: storage(&lookup)?,
            notify: NotifierConfig {
                command_buffer: parse(&lookup, "NOTIFY_COMMAND_BUFFER", defaults.command_buffer)?,
                subscriber_buffer: parse(
                    &lookup,
                    "NOTIFY_SUBSCRIBER_BUFFER",
                    defaults.subscriber_buffer,
                )?,
                delivery_timeout: Duration::from_millis(parse(
                    &lookup,
                    "NOTIFY_DELIVERY_TIMEOUT_MS",
                    250,
                )?),
                max_failed_deliveries: parse(
                    &lookup,
                    "NOTIFY_MAX_FAILED_DELIVERIES",
                    defaults.max_failed_deliveries,
                )?,
            },
            metrics_port: lookup("METRICS_PORT")
                .map(|value| parse_value("METRICS_PORT", value))
                .transpose()?,
            cache_ttl: Some(Duration::from_secs(parse(&lookup, "ORDER_CACHE_TTL_SECS", 60)?))
                .filter(|ttl| !ttl.is_zero()),
        })
    }

    /// Address the HTTP server binds to.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn storage<F>(lookup: &F) -> Result<StorageConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let backend = lookup("STORAGE_BACKEND").unwrap_or_else(|| "memory".to_string());

    match backend.trim().to_ascii_lowercase().as_str() {
        "memory" => Ok(StorageConfig::Memory),
        "postgres" => {
            let url = lookup("DATABASE_URL")
                .filter(|url| !url.trim().is_empty())
                .ok_or(ConfigError::MissingDatabaseUrl)?;
            let defaults = PoolConfig::default();

            Ok(StorageConfig::Postgres {
                url,
                pool: PoolConfig {
                    max_connections: parse(
                        lookup,
                        "DATABASE_MAX_CONNECTIONS",
                        defaults.max_connections,
                    )?,
                    connect_timeout: Duration::from_secs(parse(
                        lookup,
                        "DATABASE_CONNECT_TIMEOUT",
                        defaults.connect_timeout.as_secs(),
                    )?),
                },
            })
        }
        _ => Err(ConfigError::UnknownBackend(backend)),
    }
}

fn parse<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    lookup(key).map_or(Ok(default), |value| parse_value(key, value))
}

fn parse_value<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}
