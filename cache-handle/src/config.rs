//! # Cache Configuration
//!
//! Purpose: Describe where the store lives and how the pool in front of it is
//! bounded.
//!
//! ## Design Principles
//! 1. **Plain Data**: Configuration is a cloneable struct with public fields.
//! 2. **Sane Defaults**: `Default` targets a local, unauthenticated store.
//! 3. **Forgiving Environment**: Bad env values fall back to defaults with a warning.

use std::time::Duration;

use tracing::warn;

/// Configuration for the cache handle and its connection pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Store host name or IP.
    pub host: String,
    /// Store TCP port.
    pub port: u16,
    /// Credential sent with `AUTH` on every new connection. `None` skips `AUTH`.
    pub password: Option<String>,
    /// Logical database selected with `SELECT` on every new connection.
    pub db: i64,
    /// Maximum number of idle connections kept by the reaper.
    pub max_idle: usize,
    /// Maximum number of live connections (idle + in-use).
    pub max_size: usize,
    /// Idle connections unused for longer than this are closed.
    pub idle_timeout: Duration,
    /// How often idle connections are trimmed.
    pub reap_interval: Duration,
    /// Maximum time to wait for a free connection. `None` waits indefinitely.
    pub wait_timeout: Option<Duration>,
    /// Maximum time to dial and set up a new connection.
    pub connect_timeout: Option<Duration>,
}

impl CacheConfig {
    const DEFAULT_HOST: &'static str = "127.0.0.1";
    const DEFAULT_PORT: u16 = 6379;
    const DEFAULT_MAX_IDLE: usize = 3;
    const DEFAULT_MAX_SIZE: usize = 16;
    const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(240);
    const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(30);

    /// Creates a configuration for `host:port` with the given credential and
    /// database index. An empty credential disables `AUTH`.
    pub fn new(host: impl Into<String>, port: u16, password: impl Into<String>, db: i64) -> Self {
        let password = password.into();
        CacheConfig {
            host: host.into(),
            port,
            password: (!password.is_empty()).then_some(password),
            db,
            ..CacheConfig::default()
        }
    }

    /// Reads the configuration from `CACHE_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = CacheConfig::default();
        CacheConfig {
            host: std::env::var("CACHE_HOST").unwrap_or(defaults.host),
            port: env_or("CACHE_PORT", defaults.port),
            password: std::env::var("CACHE_PASSWORD")
                .ok()
                .filter(|value| !value.is_empty()),
            db: env_or("CACHE_DB", defaults.db),
            max_idle: env_or("CACHE_MAX_IDLE", defaults.max_idle),
            max_size: env_or("CACHE_MAX_SIZE", defaults.max_size),
            idle_timeout: Duration::from_secs(env_or(
                "CACHE_IDLE_TIMEOUT_SECS",
                defaults.idle_timeout.as_secs(),
            )),
            ..defaults
        }
    }

    /// Returns `host:port`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            host: Self::DEFAULT_HOST.to_string(),
            port: Self::DEFAULT_PORT,
            password: None,
            db: 0,
            max_idle: Self::DEFAULT_MAX_IDLE,
            max_size: Self::DEFAULT_MAX_SIZE,
            idle_timeout: Self::DEFAULT_IDLE_TIMEOUT,
            reap_interval: Self::DEFAULT_REAP_INTERVAL,
            wait_timeout: None,
            connect_timeout: None,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(variable = name, value = %raw, "unparsable value, using default");
            default
        }),
        Err(_) => default,
    }
}
