//! Runtime configuration read from the environment.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::jobs::{BackoffPolicy, JobTable};
use crate::remote::{HttpRemoteStore, RemoteResult};
use crate::util::is_http_url;

pub const REMOTE_URL_VAR: &str = "NIMBUS_REMOTE_URL";
pub const REMOTE_TIMEOUT_VAR: &str = "NIMBUS_REMOTE_TIMEOUT_SECS";
pub const BACKOFF_BASE_VAR: &str = "NIMBUS_BACKOFF_BASE_SECS";
pub const BACKOFF_MAX_VAR: &str = "NIMBUS_BACKOFF_MAX_SECS";
pub const MAX_ATTEMPTS_VAR: &str = "NIMBUS_MAX_ATTEMPTS";
pub const FOLLOWUP_DELAY_VAR: &str = "NIMBUS_FOLLOWUP_DELAY_SECS";
pub const DISPLAY_PATH_VAR: &str = "NIMBUS_DISPLAY_PATH";

const BACKOFF_FACTOR: u32 = 2;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings for the sync subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub remote_url: Option<String>,
    pub remote_timeout: Duration,
    pub backoff: BackoffPolicy,
    /// `None` keeps retrying a mutation forever
    pub max_attempts: Option<u32>,
    /// Delay before re-arming a sync pass that made partial progress
    pub followup_delay: Duration,
    pub display_path: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_url: None,
            remote_timeout: Duration::from_secs(15),
            backoff: BackoffPolicy::default(),
            max_attempts: Some(10),
            followup_delay: Duration::from_secs(60),
            display_path: None,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let remote_url =
            optional_trimmed(&lookup, REMOTE_URL_VAR).map(|url| url.trim_end_matches('/').to_string());
        if let Some(url) = remote_url.as_deref() {
            if !is_http_url(url) {
                return Err(ConfigError::Invalid(format!(
                    "{REMOTE_URL_VAR} must start with http:// or https://"
                )));
            }
        }

        let timeout_secs = parse_u64(&lookup, REMOTE_TIMEOUT_VAR, 15)?;
        if !(1..=120).contains(&timeout_secs) {
            return Err(ConfigError::Invalid(format!(
                "{REMOTE_TIMEOUT_VAR} must be in [1, 120]"
            )));
        }

        let backoff_base = parse_u64(&lookup, BACKOFF_BASE_VAR, 60)?;
        if backoff_base == 0 {
            return Err(ConfigError::Invalid(format!("{BACKOFF_BASE_VAR} must be >= 1")));
        }
        let backoff_max = parse_u64(&lookup, BACKOFF_MAX_VAR, 3_600)?;
        if backoff_max < backoff_base {
            return Err(ConfigError::Invalid(format!(
                "{BACKOFF_MAX_VAR} must be >= {BACKOFF_BASE_VAR}"
            )));
        }

        let max_attempts = parse_u64(&lookup, MAX_ATTEMPTS_VAR, 10)?;
        let max_attempts = match max_attempts {
            0 => None,
            value => Some(u32::try_from(value).map_err(|_| {
                ConfigError::Invalid(format!("{MAX_ATTEMPTS_VAR} is too large"))
            })?),
        };

        let followup_delay = parse_u64(&lookup, FOLLOWUP_DELAY_VAR, 60)?;
        let display_path = optional_trimmed(&lookup, DISPLAY_PATH_VAR).map(PathBuf::from);

        Ok(Self {
            remote_url,
            remote_timeout: Duration::from_secs(timeout_secs),
            backoff: BackoffPolicy::new(
                Duration::from_secs(backoff_base),
                BACKOFF_FACTOR,
                Duration::from_secs(backoff_max),
            ),
            max_attempts,
            followup_delay: Duration::from_secs(followup_delay),
            display_path,
        })
    }

    /// Empty job table carrying the configured retry timings.
    pub const fn job_table(&self) -> JobTable {
        JobTable::new(self.backoff, self.followup_delay)
    }

    /// HTTP client for the configured remote, if any.
    pub fn http_remote(&self) -> RemoteResult<Option<HttpRemoteStore>> {
        self.remote_url
            .as_deref()
            .map(|url| HttpRemoteStore::new(url, self.remote_timeout))
            .transpose()
    }
}

fn parse_u64(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    optional_trimmed(lookup, name).map_or(Ok(default), |value| {
        value
            .parse::<u64>()
            .map_err(|_| ConfigError::Invalid(format!("{name} must be a non-negative integer")))
    })
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
