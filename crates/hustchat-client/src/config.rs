//! Client configuration loaded from environment variables.
//!
//! Every setting has a default so the core runs with zero configuration.

use std::path::PathBuf;
use std::time::Duration;

use hustchat_store::changes::DEFAULT_FEED_CAPACITY;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// SQLite file backing the store.
    /// Env: `HUSTCHAT_DB_PATH`
    /// Default: `None`, meaning the platform data directory.
    pub db_path: Option<PathBuf>,

    /// Upper bound for every store round-trip.
    /// Env: `HUSTCHAT_OP_TIMEOUT_MS`
    /// Default: 10 s
    pub operation_timeout: Duration,

    /// Snapshots buffered per live query before the producer waits.
    /// Env: `HUSTCHAT_SUBSCRIPTION_BUFFER`
    /// Default: 16
    pub subscription_buffer: usize,

    /// Change notifications buffered before slow live queries lag.
    /// Env: `HUSTCHAT_CHANGE_FEED_CAPACITY`
    /// Default: 256
    pub change_feed_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            operation_timeout: Duration::from_secs(10),
            subscription_buffer: 16,
            change_feed_capacity: DEFAULT_FEED_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("HUSTCHAT_DB_PATH") {
            if !path.is_empty() {
                config.db_path = Some(PathBuf::from(path));
            }
        }

        if let Some(val) = lookup("HUSTCHAT_OP_TIMEOUT_MS") {
            match parse_positive(&val) {
                Some(ms) => config.operation_timeout = Duration::from_millis(ms as u64),
                None => tracing::warn!(value = %val, "Invalid HUSTCHAT_OP_TIMEOUT_MS, using default"),
            }
        }

        if let Some(val) = lookup("HUSTCHAT_SUBSCRIPTION_BUFFER") {
            match parse_positive(&val) {
                Some(n) => config.subscription_buffer = n,
                None => tracing::warn!(
                    value = %val,
                    "Invalid HUSTCHAT_SUBSCRIPTION_BUFFER, using default"
                ),
            }
        }

        if let Some(val) = lookup("HUSTCHAT_CHANGE_FEED_CAPACITY") {
            match parse_positive(&val) {
                Some(n) => config.change_feed_capacity = n,
                None => tracing::warn!(
                    value = %val,
                    "Invalid HUSTCHAT_CHANGE_FEED_CAPACITY, using default"
                ),
            }
        }

        config
    }
}

fn parse_positive(val: &str) -> Option<usize> {
    val.trim().parse::<usize>().ok().filter(|n| *n > 0)
}
