use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PollError;

/// Upper bound for both poller durations: 30 days.
pub const MAX_DURATION_MS: u64 = 30 * 24 * 60 * 60 * 1_000;

/// Poller timing. Durations are milliseconds in serialized form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Delay between two polls.
    pub interval_ms: u64,
    /// Trailing window re-scanned on every poll.
    pub txn_window_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            txn_window_ms: 5_000,
        }
    }
}

impl PollerConfig {
    /// Build a config from durations. Values too large for `u64`
    /// milliseconds saturate and are then rejected by [`validate`](Self::validate).
    pub fn new(interval: Duration, txn_window: Duration) -> Self {
        Self {
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            txn_window_ms: u64::try_from(txn_window.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn txn_window(&self) -> Duration {
        Duration::from_millis(self.txn_window_ms)
    }

    /// Interval must be positive. Both durations are capped at
    /// [`MAX_DURATION_MS`].
    pub fn validate(&self) -> Result<(), PollError> {
        if self.interval_ms == 0 {
            return Err(PollError::Config("interval must be positive".into()));
        }
        if self.interval_ms > MAX_DURATION_MS {
            return Err(PollError::Config(format!(
                "interval of {}ms exceeds the {MAX_DURATION_MS}ms maximum",
                self.interval_ms
            )));
        }
        if self.txn_window_ms > MAX_DURATION_MS {
            return Err(PollError::Config(format!(
                "txn window of {}ms exceeds the {MAX_DURATION_MS}ms maximum",
                self.txn_window_ms
            )));
        }
        Ok(())
    }

    /// Parse and validate a TOML document such as `interval_ms = 500`.
    pub fn from_toml_str(s: &str) -> Result<Self, PollError> {
        let config: Self = toml::from_str(s).map_err(|e| PollError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// Settings for a [`Watcher`](crate::Watcher).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Capacity of the event channel.
    pub channel_capacity: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self { channel_capacity: 64 }
    }
}

impl WatcherConfig {
    pub fn validate(&self) -> Result<(), PollError> {
        if self.channel_capacity == 0 {
            return Err(PollError::Config("channel capacity must be positive".into()));
        }
        Ok(())
    }
}
