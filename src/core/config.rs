//! Serializable logger configuration
//!
//! Mirrors the configuration record services pass at startup (app name, sink
//! address and credentials, environment, enable flag, level string) plus the
//! pipeline settings. Durations are plain millisecond counts.

use super::log_level::LogLevel;
use super::overflow_policy::OverflowPolicy;
use super::queue::{QueueConfig, DEFAULT_QUEUE_CAPACITY};
use super::retry::RetryPolicy;
use super::shipper::{RemainderPolicy, ShipperConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default bulk index
pub const DEFAULT_INDEX_NAME: &str = "logs-app-default";

/// # Example
///
/// ```
/// use rust_log_shipper::LoggerConfig;
///
/// let config: LoggerConfig = serde_json::from_str(r#"{
///     "app_name": "orders",
///     "host": "http://localhost:9200",
///     "environment": "development",
///     "enable_log": true,
///     "log_level": "debug",
///     "batch_size": 50
/// }"#).unwrap();
///
/// assert_eq!(config.batch_size, 50);
/// assert_eq!(config.queue_capacity, 10_000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub app_name: String,
    pub host: String,
    pub username: String,
    pub password: String,
    pub environment: String,
    /// Ship records to the sink at `host`
    pub enable_log: bool,
    pub log_level: String,
    /// Entries below this level are not shipped (still echoed)
    pub ship_level: String,
    pub index: String,
    pub compress: bool,
    pub request_timeout_ms: u64,

    pub queue_capacity: usize,
    pub overflow_policy: OverflowPolicy,
    pub batch_size: usize,
    pub linger_ms: u64,
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub jitter: bool,
    pub shutdown_grace_ms: u64,
    pub remainder_policy: RemainderPolicy,
    pub fatal_flush_timeout_ms: u64,

    /// Echo every accepted record to stderr
    pub echo: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        let shipper = ShipperConfig::default();
        Self {
            app_name: String::new(),
            host: String::new(),
            username: String::new(),
            password: String::new(),
            environment: String::new(),
            enable_log: false,
            log_level: "info".to_string(),
            ship_level: "info".to_string(),
            index: DEFAULT_INDEX_NAME.to_string(),
            compress: false,
            request_timeout_ms: 10_000,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_policy: OverflowPolicy::default(),
            batch_size: shipper.batch_size,
            linger_ms: shipper.linger.as_millis() as u64,
            max_retries: shipper.retry.max_retries,
            base_backoff_ms: shipper.retry.base_delay.as_millis() as u64,
            max_backoff_ms: shipper.retry.max_delay.as_millis() as u64,
            jitter: shipper.retry.jitter,
            shutdown_grace_ms: shipper.shutdown_grace.as_millis() as u64,
            remainder_policy: shipper.remainder,
            fatal_flush_timeout_ms: 5_000,
            echo: false,
        }
    }
}

impl LoggerConfig {
    /// Minimum level, and whether the string was invalid and `Info` was used.
    pub fn min_level(&self) -> (LogLevel, bool) {
        LogLevel::parse_or_default(&self.log_level)
    }

    pub fn ship_level(&self) -> (LogLevel, bool) {
        LogLevel::parse_or_default(&self.ship_level)
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            capacity: self.queue_capacity,
            overflow_policy: self.overflow_policy,
            enabled: self.enable_log,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_backoff_ms),
            max_delay: Duration::from_millis(self.max_backoff_ms),
            jitter: self.jitter,
        }
    }

    pub fn shipper_config(&self) -> ShipperConfig {
        ShipperConfig {
            batch_size: self.batch_size,
            linger: Duration::from_millis(self.linger_ms),
            retry: self.retry_policy(),
            shutdown_grace: Duration::from_millis(self.shutdown_grace_ms),
            remainder: self.remainder_policy,
            ..ShipperConfig::default()
        }
    }

    pub fn fatal_flush_timeout(&self) -> Duration {
        Duration::from_millis(self.fatal_flush_timeout_ms)
    }

    #[cfg(feature = "elasticsearch")]
    pub fn elasticsearch_config(&self) -> crate::sinks::ElasticsearchConfig {
        let mut config = crate::sinks::ElasticsearchConfig::new(self.host.clone())
            .with_index(self.index.clone())
            .with_compression(self.compress)
            .with_timeout(Duration::from_millis(self.request_timeout_ms));
        if !self.username.is_empty() {
            config = config.with_credentials(self.username.clone(), self.password.clone());
        }
        config
    }
}
