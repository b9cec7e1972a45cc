//! Configuration for the sync orchestrator.

use std::time::Duration;

/// Shortest interval the auto-sync timer will tick at.
pub const MIN_SYNC_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration for sync passes.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Whether the auto-sync task triggers passes on its own.
    pub auto_sync: bool,
    /// Cadence of automatic passes while online.
    pub sync_interval: Duration,
    /// Upper bound on a single executor call. `None` waits indefinitely.
    pub executor_timeout: Option<Duration>,
    /// How many successor operations one conflict may spawn within a pass.
    pub max_conflict_resolutions: u32,
    /// Retry backoff configuration.
    pub retry: RetryConfig,
}

impl SyncConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables automatic passes.
    pub fn with_auto_sync(mut self, enabled: bool) -> Self {
        self.auto_sync = enabled;
        self
    }

    /// Sets the interval between automatic passes, raised to at least
    /// [`MIN_SYNC_INTERVAL`].
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval.max(MIN_SYNC_INTERVAL);
        self
    }

    /// The period the auto-sync timer actually uses.
    #[must_use]
    pub fn tick_period(&self) -> Duration {
        self.sync_interval.max(MIN_SYNC_INTERVAL)
    }

    /// Sets the executor timeout.
    pub fn with_executor_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.executor_timeout = timeout;
        self
    }

    /// Sets the conflict re-attempt bound.
    pub fn with_max_conflict_resolutions(mut self, limit: u32) -> Self {
        self.max_conflict_resolutions = limit;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync: true,
            sync_interval: Duration::from_secs(30),
            executor_timeout: Some(Duration::from_secs(30)),
            max_conflict_resolutions: 3,
            retry: RetryConfig::default(),
        }
    }
}

/// Configuration for retry backoff.
///
/// The delay before retry `n` (counting from zero) is
/// `base_delay * multiplier^n`, capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub multiplier: f64,
    /// Whether to add up to 25% jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a retry configuration with the given base delay.
    pub fn new(base_delay: Duration) -> Self {
        Self {
            base_delay,
            ..Self::default()
        }
    }

    /// Creates a configuration with no delay between retries.
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, enabled: bool) -> Self {
        self.add_jitter = enabled;
        self
    }

    /// Calculates the delay before a retry, given the retry count before
    /// the failure that triggered it.
    pub fn delay_for_retry(&self, retry_count: u32) -> Duration {
        let exponent = i32::try_from(retry_count).unwrap_or(i32::MAX);
        let base = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let delay_secs = base.min(self.max_delay.as_secs_f64());

        if !delay_secs.is_finite() || delay_secs <= 0.0 {
            return Duration::ZERO;
        }

        if self.add_jitter {
            let jitter = delay_secs * 0.25 * rand::random::<f64>();
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
            multiplier: 2.0,
            add_jitter: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new()
            .with_auto_sync(false)
            .with_sync_interval(Duration::from_secs(5))
            .with_executor_timeout(None)
            .with_max_conflict_resolutions(1);

        assert!(!config.auto_sync);
        assert_eq!(config.sync_interval, Duration::from_secs(5));
        assert!(config.executor_timeout.is_none());
        assert_eq!(config.max_conflict_resolutions, 1);
    }

    #[test]
    fn sync_interval_has_a_floor() {
        let config = SyncConfig::new().with_sync_interval(Duration::ZERO);
        assert_eq!(config.sync_interval, MIN_SYNC_INTERVAL);

        let raw = SyncConfig {
            sync_interval: Duration::ZERO,
            ..SyncConfig::default()
        };
        assert_eq!(raw.tick_period(), MIN_SYNC_INTERVAL);
    }

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert!(config.auto_sync);
        assert_eq!(config.executor_timeout, Some(Duration::from_secs(30)));
        assert!(!config.retry.add_jitter);
    }

    #[test]
    fn retry_delay_is_exponential() {
        let config = RetryConfig::new(Duration::from_millis(100)).with_multiplier(2.0);

        assert_eq!(config.delay_for_retry(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_retry(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_retry(3), Duration::from_millis(800));
    }

    #[test]
    fn retry_delay_respects_max() {
        let config = RetryConfig::new(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_multiplier(10.0);

        assert_eq!(config.delay_for_retry(5), Duration::from_secs(5));
        assert_eq!(config.delay_for_retry(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn jitter_stays_within_bound() {
        let config = RetryConfig::new(Duration::from_millis(100)).with_jitter(true);
        let delay = config.delay_for_retry(0);
        assert!(delay >= Duration::from_millis(100));
        assert!(delay <= Duration::from_millis(125));
    }

    #[test]
    fn immediate_has_no_delay() {
        assert_eq!(RetryConfig::immediate().delay_for_retry(4), Duration::ZERO);
    }
}
