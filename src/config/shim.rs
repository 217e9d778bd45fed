//! Shim configuration.

use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::dispatcher::DEFAULT_BACKLOG_WARN;
use crate::core::{AppResult, ShimError};

/// Prefix of environment variables read by [`ShimConfig::from_env`].
pub const ENV_PREFIX: &str = "SHIM_";

fn default_cluster_id() -> String {
    "mycluster".to_string()
}

fn default_cluster_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_policy_group() -> String {
    "queues".to_string()
}

const fn default_scheduling_interval_ms() -> u64 {
    1000
}

const fn default_dispatch_backlog_warn() -> usize {
    DEFAULT_BACKLOG_WARN
}

fn default_worker_threads() -> usize {
    num_cpus::get()
}

/// Root shim configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShimConfig {
    /// Resource manager identifier registered with the scheduler.
    #[serde(default = "default_cluster_id")]
    pub cluster_id: String,
    /// Version reported at registration.
    #[serde(default = "default_cluster_version")]
    pub cluster_version: String,
    /// Queue configuration group the scheduler loads for this shim.
    #[serde(default = "default_policy_group")]
    pub policy_group: String,
    /// Interval between scheduling passes.
    #[serde(default = "default_scheduling_interval_ms")]
    pub scheduling_interval_ms: u64,
    /// Dispatcher backlog that triggers a warning.
    #[serde(default = "default_dispatch_backlog_warn")]
    pub dispatch_backlog_warn: usize,
    /// Worker threads for a dedicated runtime.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            cluster_id: default_cluster_id(),
            cluster_version: default_cluster_version(),
            policy_group: default_policy_group(),
            scheduling_interval_ms: default_scheduling_interval_ms(),
            dispatch_backlog_warn: default_dispatch_backlog_warn(),
            worker_threads: default_worker_threads(),
        }
    }
}

impl ShimConfig {
    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ShimError::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<(), ShimError> {
        if self.cluster_id.trim().is_empty() {
            return Err(ShimError::Config("cluster_id must not be empty".into()));
        }
        if self.policy_group.trim().is_empty() {
            return Err(ShimError::Config("policy_group must not be empty".into()));
        }
        if self.scheduling_interval_ms == 0 {
            return Err(ShimError::Config(
                "scheduling_interval_ms must be greater than 0".into(),
            ));
        }
        if self.dispatch_backlog_warn == 0 {
            return Err(ShimError::Config(
                "dispatch_backlog_warn must be greater than 0".into(),
            ));
        }
        if self.worker_threads == 0 {
            return Err(ShimError::Config(
                "worker_threads must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Scheduling interval as a [`Duration`].
    #[must_use]
    pub const fn scheduling_interval(&self) -> Duration {
        Duration::from_millis(self.scheduling_interval_ms)
    }

    /// Parse configuration from JSON and validate. Missing fields take
    /// their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ShimError::Config`] on parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, ShimError> {
        let cfg: Self = serde_json::from_str(input)
            .map_err(|e| ShimError::Config(format!("parse error: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `SHIM_*` variables, loading `.env` first
    /// when present.
    ///
    /// # Errors
    ///
    /// Fails when a numeric variable does not parse or validation fails.
    pub fn from_env() -> AppResult<Self> {
        // a missing .env file is fine
        let _ = dotenvy::dotenv();
        Self::from_vars(std::env::vars())
    }

    /// Build configuration from `(name, value)` pairs; only `SHIM_*` names
    /// are considered.
    ///
    /// # Errors
    ///
    /// Fails when a numeric variable does not parse or validation fails.
    pub fn from_vars<I>(vars: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut cfg = Self::default();
        for (name, value) in vars {
            let Some(key) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match key {
                "CLUSTER_ID" => cfg.cluster_id = value,
                "CLUSTER_VERSION" => cfg.cluster_version = value,
                "POLICY_GROUP" => cfg.policy_group = value,
                "SCHEDULING_INTERVAL_MS" => {
                    cfg.scheduling_interval_ms = value
                        .parse()
                        .with_context(|| format!("{name}={value} is not a number"))?;
                }
                "DISPATCH_BACKLOG_WARN" => {
                    cfg.dispatch_backlog_warn = value
                        .parse()
                        .with_context(|| format!("{name}={value} is not a number"))?;
                }
                "WORKER_THREADS" => {
                    cfg.worker_threads = value
                        .parse()
                        .with_context(|| format!("{name}={value} is not a number"))?;
                }
                _ => {}
            }
        }
        cfg.validate().context("invalid shim configuration")?;
        Ok(cfg)
    }
}
