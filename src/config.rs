// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::defaults;

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Delay before every resource is reconciled again, whatever the outcome
    pub requeue_interval: Duration,
    /// Delay before a failed reconciliation is retried
    pub error_requeue_interval: Duration,
    /// Upper bound on read-modify-write attempts when a write conflicts
    pub status_update_attempts: u32,
    /// Deadline for reading the logs of a single recover pod
    pub log_read_timeout: Duration,
    /// Name of the injected container counted by the sidecar reconciler
    pub sidecar_container_name: String,
    /// Number of objects reconciled in parallel per controller
    pub max_concurrent_reconciles: u16,
    /// Restrict watches to a single namespace when set
    pub watch_namespace: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            requeue_interval: Duration::from_secs(defaults::REQUEUE_INTERVAL_SECS),
            error_requeue_interval: Duration::from_secs(defaults::ERROR_REQUEUE_SECS),
            status_update_attempts: defaults::STATUS_UPDATE_ATTEMPTS,
            log_read_timeout: Duration::from_secs(defaults::LOG_READ_TIMEOUT_SECS),
            sidecar_container_name: defaults::SIDECAR_CONTAINER_NAME.to_string(),
            max_concurrent_reconciles: defaults::MAX_CONCURRENT_RECONCILES,
            watch_namespace: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = Config::default();

        let requeue_interval = parse_var(&lookup, "REQUEUE_INTERVAL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(base.requeue_interval);
        let error_requeue_interval = parse_var(&lookup, "ERROR_REQUEUE_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(base.error_requeue_interval);
        let status_update_attempts: u32 =
            parse_var(&lookup, "STATUS_UPDATE_ATTEMPTS")?.unwrap_or(base.status_update_attempts);
        let log_read_timeout = parse_var(&lookup, "LOG_READ_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(base.log_read_timeout);
        let max_concurrent_reconciles: u16 = parse_var(&lookup, "MAX_CONCURRENT_RECONCILES")?
            .unwrap_or(base.max_concurrent_reconciles);

        if status_update_attempts == 0 {
            anyhow::bail!("STATUS_UPDATE_ATTEMPTS must be at least 1");
        }

        let sidecar_container_name = lookup("SIDECAR_CONTAINER_NAME")
            .filter(|v| !v.is_empty())
            .unwrap_or(base.sidecar_container_name);
        let watch_namespace = lookup("WATCH_NAMESPACE").filter(|v| !v.is_empty());

        Ok(Config {
            requeue_interval,
            error_requeue_interval,
            status_update_attempts,
            log_read_timeout,
            sidecar_container_name,
            max_concurrent_reconciles,
            watch_namespace,
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        _ => Ok(None),
    }
}
