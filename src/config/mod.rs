//! # Batch Tracker Configuration
//!
//! Configuration for the counter store connection and job tracking policy.
//! Values come from an optional TOML file layered under `BATCH_TRACKER__*`
//! environment variables (see [`ConfigManager`]).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use batch_tracker::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let namespace = &manager.config().store.namespace;
//! let ignored = &manager.config().ignore_list;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::{
    DEFAULT_MEMBER_TTL_SECONDS, DEFAULT_NAMESPACE, DEFAULT_REDIS_URL, MAX_MEMBER_TTL_SECONDS,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Counter store connection settings
    pub store: StoreConfig,

    /// Job class names that are never tracked as batch members
    pub ignore_list: Vec<String>,

    /// Wire layout of job payloads produced by dispatch
    pub job_platform: JobPlatform,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            ignore_list: Vec::new(),
            job_platform: JobPlatform::default(),
        }
    }
}

impl BatchConfig {
    /// Validate the configuration for the given environment
    pub fn validate(&self, environment: &str) -> ConfigResult<()> {
        if self.store.namespace.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "store.namespace",
                self.store.namespace.clone(),
                "namespace must not be empty",
            ));
        }

        if self.store.member_ttl_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "store.member_ttl_seconds",
                "0",
                "member TTL must be greater than zero",
            ));
        }

        if self.store.member_ttl_seconds > MAX_MEMBER_TTL_SECONDS {
            return Err(ConfigurationError::invalid_value(
                "store.member_ttl_seconds",
                self.store.member_ttl_seconds.to_string(),
                format!("member TTL must not exceed {MAX_MEMBER_TTL_SECONDS} seconds"),
            ));
        }

        if self.store.backend == StoreBackend::Redis
            && self.store.redis_url.resolve(environment).is_none()
        {
            return Err(ConfigurationError::missing_required_field(
                format!("store.redis_url.{environment}"),
                "redis store configuration",
            ));
        }

        if self.ignore_list.iter().any(|name| name.trim().is_empty()) {
            return Err(ConfigurationError::validation_error(
                "ignore_list entries must not be blank",
            ));
        }

        Ok(())
    }

    /// Whether a job class is on the configured ignore-list
    pub fn is_ignored(&self, job_class: &str) -> bool {
        self.ignore_list.iter().any(|name| name == job_class)
    }
}

/// Counter store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub redis_url: RedisUrl,
    pub namespace: String,
    pub member_ttl_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            redis_url: RedisUrl::default(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            member_ttl_seconds: DEFAULT_MEMBER_TTL_SECONDS,
        }
    }
}

impl StoreConfig {
    pub fn member_ttl(&self) -> Duration {
        Duration::from_secs(self.member_ttl_seconds)
    }
}

/// Counter store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Redis,
    #[serde(alias = "in_memory")]
    Memory,
}

/// Counter store URL: a single URL, or one URL per environment
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RedisUrl {
    Single(String),
    PerEnvironment(HashMap<String, String>),
}

impl Default for RedisUrl {
    fn default() -> Self {
        RedisUrl::Single(
            std::env::var("RAILS_REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string()),
        )
    }
}

impl RedisUrl {
    /// Resolve the URL for an environment
    pub fn resolve(&self, environment: &str) -> Option<String> {
        match self {
            RedisUrl::Single(url) if url.trim().is_empty() => None,
            RedisUrl::Single(url) => Some(url.clone()),
            RedisUrl::PerEnvironment(urls) => urls
                .get(environment)
                .filter(|url| !url.trim().is_empty())
                .cloned(),
        }
    }
}

/// Job payload wire layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPlatform {
    /// `job_class` / `job_id` / `arguments`
    #[default]
    ActiveJob,
    /// `class` / `jid` / `args`
    Sidekiq,
}
