//! Service configuration.
//!
//! Defaults are overridden by environment variables; a `.env` file is
//! loaded first when present.

use std::env;
use std::time::Duration;

/// Registry used when `REGISTRY_API_URL` is unset.
pub const DEFAULT_REGISTRY_URL: &str = "https://hospital-directory.onrender.com";

/// Maximum data rows accepted per upload.
pub const DEFAULT_MAX_ROWS: usize = 20;

/// HTTP port for `serve`.
pub const DEFAULT_PORT: u16 = 1234;

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Remote registry base URL
    pub registry_url: String,
    /// Upload row limit
    pub max_rows: usize,
    pub create_timeout: Duration,
    pub activate_timeout: Duration,
    pub health_timeout: Duration,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            max_rows: DEFAULT_MAX_ROWS,
            create_timeout: Duration::from_secs(30),
            activate_timeout: Duration::from_secs(30),
            health_timeout: Duration::from_secs(10),
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Load configuration from the environment (and `.env`).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    /// Unparseable values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();
        let secs = |key: &str, fallback: Duration| {
            lookup(key)
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(fallback)
        };

        Self {
            registry_url: lookup("REGISTRY_API_URL").unwrap_or(default.registry_url),
            max_rows: lookup("MAX_BATCH_ROWS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_rows),
            create_timeout: secs("REGISTRY_CREATE_TIMEOUT_SECS", default.create_timeout),
            activate_timeout: secs("REGISTRY_ACTIVATE_TIMEOUT_SECS", default.activate_timeout),
            health_timeout: secs("REGISTRY_HEALTH_TIMEOUT_SECS", default.health_timeout),
            port: lookup("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),
        }
    }
}
