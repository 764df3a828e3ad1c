//! Reconnection backoff policy
//!
//! The delay before retry `n` (zero-based) is `min(base * 2^n, cap)`. The
//! schedule is derived from the attempt counter alone, so resetting the
//! counter resets the delay.

use std::time::Duration;

/// Default delay before the first retry
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_secs(1);

/// Default upper bound for any single retry delay
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Default number of retries before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Reconnection configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first retry
    pub base_backoff: Duration,
    /// Cap applied to every retry delay
    pub max_backoff: Duration,
    /// Retries allowed before entering `GivenUp`
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_backoff: DEFAULT_BASE_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReconnectConfig {
    /// Create a configuration from raw values
    #[must_use]
    pub const fn new(base_backoff: Duration, max_backoff: Duration, max_attempts: u32) -> Self {
        Self {
            base_backoff,
            max_backoff,
            max_attempts,
        }
    }

    /// Delay before retry `attempt` (zero-based)
    #[must_use]
    pub fn interval(&self, attempt: u32) -> Duration {
        1u32.checked_shl(attempt)
            .and_then(|factor| self.base_backoff.checked_mul(factor))
            .map_or(self.max_backoff, |delay| delay.min(self.max_backoff))
    }
}

impl From<&chat_common::ReconnectSettings> for ReconnectConfig {
    fn from(settings: &chat_common::ReconnectSettings) -> Self {
        Self {
            base_backoff: Duration::from_millis(settings.base_ms),
            max_backoff: Duration::from_millis(settings.max_ms),
            max_attempts: settings.max_attempts,
        }
    }
}

/// Retry counter plus the interval it implies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    config: ReconnectConfig,
    attempts: u32,
}

impl Backoff {
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// Retries consumed since the last successful open
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Interval the next retry would wait
    #[must_use]
    pub fn current_interval(&self) -> Duration {
        self.config.interval(self.attempts)
    }

    /// Whether the attempt ceiling has been reached
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.attempts >= self.config.max_attempts
    }

    /// Consume one retry, returning its delay
    ///
    /// Returns `None` once the ceiling is reached; the counter is left
    /// unchanged in that case.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        let delay = self.current_interval();
        self.attempts += 1;
        Some(delay)
    }

    /// Back to the initial counter and interval
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    #[must_use]
    pub const fn config(&self) -> &ReconnectConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_default_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.base_backoff, secs(1));
        assert_eq!(config.max_backoff, secs(10));
        assert_eq!(config.max_attempts, 5);
    }

    #[test]
    fn test_interval_doubles_until_cap() {
        let config = ReconnectConfig::new(secs(1), secs(10), 10);
        let delays: Vec<_> = (0..6).map(|n| config.interval(n)).collect();
        assert_eq!(delays, vec![secs(1), secs(2), secs(4), secs(8), secs(10), secs(10)]);
    }

    #[test]
    fn test_interval_matches_formula() {
        let config = ReconnectConfig::new(Duration::from_millis(250), secs(30), 8);
        for n in 0..config.max_attempts {
            let expected = (Duration::from_millis(250) * 2u32.pow(n)).min(secs(30));
            assert_eq!(config.interval(n), expected, "attempt {n}");
        }
    }

    #[test]
    fn test_interval_never_overflows() {
        let config = ReconnectConfig::new(secs(1), secs(10), u32::MAX);
        assert_eq!(config.interval(31), secs(10));
        assert_eq!(config.interval(32), secs(10));
        assert_eq!(config.interval(u32::MAX), secs(10));
    }

    #[test]
    fn test_backoff_sequence_and_exhaustion() {
        let mut backoff = Backoff::new(ReconnectConfig::new(secs(1), secs(10), 3));

        assert_eq!(backoff.next_delay(), Some(secs(1)));
        assert_eq!(backoff.next_delay(), Some(secs(2)));
        assert_eq!(backoff.next_delay(), Some(secs(4)));
        assert!(backoff.is_exhausted());
        assert_eq!(backoff.next_delay(), None);
        assert_eq!(backoff.attempts(), 3);
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff = Backoff::new(ReconnectConfig::default());
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.current_interval(), secs(4));

        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.current_interval(), secs(1));
    }

    #[test]
    fn test_zero_attempts_gives_up_immediately() {
        let mut backoff = Backoff::new(ReconnectConfig::new(secs(1), secs(10), 0));
        assert!(backoff.is_exhausted());
        assert_eq!(backoff.next_delay(), None);
    }
}
