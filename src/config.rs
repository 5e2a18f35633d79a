use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::outbox::Backoff;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got '{value}'")]
    InvalidNumber { key: &'static str, value: String },
    #[error("{key} must be greater than zero")]
    Zero { key: &'static str },
    #[error("OUTBOX_LEASE_MS ({lease:?}) must exceed OUTBOX_PUBLISH_TIMEOUT_MS ({publish_timeout:?})")]
    LeaseTooShort {
        lease: Duration,
        publish_timeout: Duration,
    },
}

/// Tuning for the outbox dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub worker_id: String,
    pub batch_size: usize,
    pub lease: Duration,
    pub poll_interval: Duration,
    pub publish_timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub shutdown_grace: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            worker_id: format!("dispatcher-{}", std::process::id()),
            batch_size: 100,
            lease: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
            publish_timeout: Duration::from_secs(5),
            backoff_base: Duration::from_millis(200),
            backoff_max: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl DispatcherConfig {
    pub fn with_worker_id(mut self, id: impl Into<String>) -> Self {
        self.worker_id = id.into();
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.backoff_base, self.backoff_max)
    }

    /// The lease is renewed before every publish, so it only has to outlast
    /// one publish timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lease <= self.publish_timeout {
            return Err(ConfigError::LeaseTooShort {
                lease: self.lease,
                publish_timeout: self.publish_timeout,
            });
        }
        Ok(())
    }

    /// Load from `OUTBOX_*` variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let batch_size = match lookup("OUTBOX_BATCH_SIZE") {
            Some(value) => parse_positive("OUTBOX_BATCH_SIZE", &value)?,
            None => defaults.batch_size as u64,
        };

        let config = Self {
            worker_id: lookup("OUTBOX_WORKER_ID").unwrap_or(defaults.worker_id),
            batch_size: usize::try_from(batch_size).unwrap_or(usize::MAX),
            lease: millis(&lookup, "OUTBOX_LEASE_MS", defaults.lease)?,
            poll_interval: millis(&lookup, "OUTBOX_POLL_INTERVAL_MS", defaults.poll_interval)?,
            publish_timeout: millis(&lookup, "OUTBOX_PUBLISH_TIMEOUT_MS", defaults.publish_timeout)?,
            backoff_base: millis(&lookup, "OUTBOX_BACKOFF_BASE_MS", defaults.backoff_base)?,
            backoff_max: millis(&lookup, "OUTBOX_BACKOFF_MAX_MS", defaults.backoff_max)?,
            shutdown_grace: millis(&lookup, "OUTBOX_SHUTDOWN_GRACE_MS", defaults.shutdown_grace)?,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Process-level configuration for the `gateway-request` binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub store_path: PathBuf,
    pub dispatcher: DispatcherConfig,
}

impl AppConfig {
    /// Load configuration from the environment, reading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            store_path: env::var("GATEWAY_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("gateway-requests.json")),
            dispatcher: DispatcherConfig::from_env()?,
        })
    }
}

fn parse_positive(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    let parsed: u64 = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber {
            key,
            value: value.to_string(),
        })?;
    if parsed == 0 {
        return Err(ConfigError::Zero { key });
    }
    Ok(parsed)
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match lookup(key) {
        Some(value) => parse_positive(key, &value).map(Duration::from_millis),
        None => Ok(default),
    }
}
