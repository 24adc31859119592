//! Service configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Retry policy for control-plane requests
///
/// Only transport failures are retried; a relay that answers with a
/// non-success status is never asked twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = no retry)
    pub max_retries: u32,
    /// Delay before the first retry, doubled each attempt
    pub initial_backoff: Duration,
    /// Upper bound for a single backoff delay
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }
}

/// Authorization service configuration options
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Path of the state file
    pub store_path: PathBuf,

    /// RTMP applications streams may be added to (empty = any)
    pub applications: Vec<String>,

    /// Relay control base URL (None = revocation disabled)
    pub control_url: Option<String>,

    /// Interval between expiry sweeps
    pub sweep_interval: Duration,

    /// Timeout for a single control-plane request
    pub control_timeout: Duration,

    /// Retry policy for control-plane transport failures
    pub control_retry: RetryPolicy,

    /// Time allowed for in-flight work after shutdown is requested
    pub shutdown_grace: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("store.db"),
            applications: vec!["stream".to_string()],
            control_url: None,
            sweep_interval: Duration::from_secs(10),
            control_timeout: Duration::from_secs(5),
            control_retry: RetryPolicy::default(),
            shutdown_grace: Duration::from_millis(100),
        }
    }
}

impl AuthConfig {
    /// Create a new config with a custom state file path
    pub fn with_store_path(path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: path.into(),
            ..Default::default()
        }
    }

    /// Load defaults overridden by `RTMP_AUTH_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load defaults overridden through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("RTMP_AUTH_STORE") {
            config.store_path = PathBuf::from(path);
        }
        if let Some(apps) = lookup("RTMP_AUTH_APPS") {
            config.applications = apps
                .split(',')
                .map(str::trim)
                .filter(|app| !app.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(url) = lookup("RTMP_AUTH_CTRL_URL") {
            config.control_url = Some(url).filter(|u| !u.is_empty());
        }
        if let Some(value) = lookup("RTMP_AUTH_SWEEP_INTERVAL_SECS") {
            let secs = parse_number("RTMP_AUTH_SWEEP_INTERVAL_SECS", &value)?;
            config.sweep_interval = Duration::from_secs(secs);
        }
        if let Some(value) = lookup("RTMP_AUTH_CONTROL_TIMEOUT_MS") {
            let ms = parse_number("RTMP_AUTH_CONTROL_TIMEOUT_MS", &value)?;
            config.control_timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }

    /// Set the state file path
    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    /// Set the permitted applications
    pub fn applications<I, S>(mut self, apps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.applications = apps.into_iter().map(Into::into).collect();
        self
    }

    /// Set the relay control base URL
    pub fn control_url(mut self, url: impl Into<String>) -> Self {
        self.control_url = Some(url.into());
        self
    }

    /// Set the expiry sweep interval
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the control request timeout
    pub fn control_timeout(mut self, timeout: Duration) -> Self {
        self.control_timeout = timeout;
        self
    }

    /// Set the control request retry policy
    pub fn control_retry(mut self, policy: RetryPolicy) -> Self {
        self.control_retry = policy;
        self
    }

    /// Set the shutdown grace period
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Check whether `app` may carry streams
    pub fn allows_application(&self, app: &str) -> bool {
        self.applications.is_empty() || self.applications.iter().any(|a| a == app)
    }
}

fn parse_number(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            var,
            value: value.to_string(),
        })
}
