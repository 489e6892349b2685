//! Capacity and retention settings for the session cache.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default memory budget for all cached sessions (500 MiB).
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 500 * 1024 * 1024;
/// Default session time-to-live in seconds.
pub const DEFAULT_TTL_SECONDS: u64 = 60 * 60;
/// Default interval between TTL sweeps in seconds.
pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 15 * 60;

/// Session cache configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Aggregate attachment bytes allowed before oldest sessions are evicted.
    pub max_total_bytes: u64,
    /// Maximum session age in seconds.
    pub ttl_seconds: u64,
    /// Interval between background TTL sweeps in seconds.
    pub sweep_interval_seconds: u64,
    /// Whether the background sweep runs at all.
    pub sweep_enabled: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
            ttl_seconds: DEFAULT_TTL_SECONDS,
            sweep_interval_seconds: DEFAULT_SWEEP_INTERVAL_SECONDS,
            sweep_enabled: true,
        }
    }
}

impl SessionConfig {
    /// Set the memory budget.
    #[must_use]
    pub const fn with_max_total_bytes(mut self, bytes: u64) -> Self {
        self.max_total_bytes = bytes;
        self
    }

    /// Set the session TTL, rounded up to whole seconds.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_seconds = whole_seconds_ceil(ttl);
        self
    }

    /// Set the sweep interval, rounded up to whole seconds.
    #[must_use]
    pub const fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval_seconds = whole_seconds_ceil(interval);
        self
    }

    /// Enable or disable the background sweep.
    #[must_use]
    pub const fn with_sweep_enabled(mut self, enabled: bool) -> Self {
        self.sweep_enabled = enabled;
        self
    }

    /// Session TTL as a [`Duration`].
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Sweep interval as a [`Duration`].
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

/// Whole seconds in `duration`, counting any fraction as a full second.
const fn whole_seconds_ceil(duration: Duration) -> u64 {
    if duration.subsec_nanos() > 0 {
        duration.as_secs().saturating_add(1)
    } else {
        duration.as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.max_total_bytes, 524_288_000);
        assert_eq!(config.ttl(), Duration::from_secs(3600));
        assert_eq!(config.sweep_interval(), Duration::from_secs(900));
        assert!(config.sweep_enabled);
    }

    #[test]
    fn test_builder_methods() {
        let config = SessionConfig::default()
            .with_max_total_bytes(1024)
            .with_ttl(Duration::from_secs(60))
            .with_sweep_interval(Duration::from_secs(5))
            .with_sweep_enabled(false);

        assert_eq!(config.max_total_bytes, 1024);
        assert_eq!(config.ttl_seconds, 60);
        assert_eq!(config.sweep_interval_seconds, 5);
        assert!(!config.sweep_enabled);
    }

    #[test]
    fn test_sub_second_durations_round_up() {
        let config = SessionConfig::default()
            .with_ttl(Duration::from_millis(500))
            .with_sweep_interval(Duration::from_millis(1500));

        assert_eq!(config.ttl(), Duration::from_secs(1));
        assert_eq!(config.sweep_interval(), Duration::from_secs(2));
        assert_eq!(SessionConfig::default().with_ttl(Duration::ZERO).ttl_seconds, 0);
    }
}
