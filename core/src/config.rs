//! Session configuration.
//!
//! `SessionConfig` deserializes from JSON and can be adjusted from
//! `TYPED_HTTP_*` environment variables. Every field has a default, so an
//! empty object is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const ENV_TIMEOUT_MS: &str = "TYPED_HTTP_TIMEOUT_MS";
pub const ENV_CONNECT_TIMEOUT_MS: &str = "TYPED_HTTP_CONNECT_TIMEOUT_MS";
pub const ENV_USER_AGENT: &str = "TYPED_HTTP_USER_AGENT";
pub const ENV_CALLBACK_QUEUE: &str = "TYPED_HTTP_CALLBACK_QUEUE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Whole-exchange timeout. `None` disables it.
    pub timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub user_agent: String,
    /// Response bodies larger than this fail the task with an I/O error.
    pub max_body_bytes: u64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            timeout_ms: Some(30_000),
            connect_timeout_ms: Some(10_000),
            user_agent: concat!("typed-http/", env!("CARGO_PKG_VERSION")).to_string(),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

impl AdapterConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub adapter: AdapterConfig,
    /// Label of a dedicated callback thread. `None` runs handlers on the
    /// adapter's completion thread.
    pub callback_queue: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid session config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value for {name}: {value:?}")]
    Env { name: &'static str, value: String },
}

impl SessionConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Override fields from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    fn apply_vars<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = var(ENV_TIMEOUT_MS) {
            self.adapter.timeout_ms = parse_millis(ENV_TIMEOUT_MS, value)?;
        }
        if let Some(value) = var(ENV_CONNECT_TIMEOUT_MS) {
            self.adapter.connect_timeout_ms = parse_millis(ENV_CONNECT_TIMEOUT_MS, value)?;
        }
        if let Some(value) = var(ENV_USER_AGENT) {
            self.adapter.user_agent = value;
        }
        if let Some(value) = var(ENV_CALLBACK_QUEUE) {
            self.callback_queue = if value.is_empty() { None } else { Some(value) };
        }
        Ok(())
    }
}

/// `0` disables the timeout.
fn parse_millis(name: &'static str, value: String) -> Result<Option<u64>, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(0) => Ok(None),
        Ok(ms) => Ok(Some(ms)),
        Err(_) => Err(ConfigError::Env { name, value }),
    }
}
