//! Reconnection policy

use std::time::Duration;

use crate::config::Config;

/// Lifetime retry ceiling plus the cool-down applied after a disconnect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Reconnections allowed over the connector's lifetime, never reset
    pub max_retries: u32,
    /// Window after a successful subscribe during which a reconnect waits
    pub cool_down: Duration,
    /// Floor for any cool-down sleep
    pub min_sleep: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: 30,
            cool_down: Duration::from_secs(10),
            min_sleep: Duration::from_secs(1),
        }
    }
}

impl ReconnectPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.max_reconnect_attempts,
            cool_down: Duration::from_secs(config.cool_down_secs),
            min_sleep: Duration::from_secs(config.min_sleep_secs),
        }
    }

    /// Whether another reconnection may be attempted after `retry_count` retries
    pub fn allows_retry(&self, retry_count: u32) -> bool {
        retry_count < self.max_retries
    }

    /// Sleep before reconnecting, given the time since the last successful
    /// subscribe. A session that never subscribed waits the full window.
    pub fn cool_down_delay(&self, since_subscribe: Option<Duration>) -> Duration {
        let elapsed = since_subscribe.unwrap_or(Duration::ZERO);
        if elapsed < self.cool_down {
            (self.cool_down - elapsed).max(self.min_sleep)
        } else {
            Duration::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cool_down_inside_window() {
        let policy = ReconnectPolicy::default();
        assert_eq!(
            policy.cool_down_delay(Some(Duration::from_secs(3))),
            Duration::from_secs(7)
        );
    }

    #[test]
    fn test_no_cool_down_outside_window() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.cool_down_delay(Some(Duration::from_secs(15))), Duration::ZERO);
        assert_eq!(policy.cool_down_delay(Some(Duration::from_secs(10))), Duration::ZERO);
    }

    #[test]
    fn test_cool_down_floor() {
        let policy = ReconnectPolicy::default();
        assert_eq!(
            policy.cool_down_delay(Some(Duration::from_millis(9_500))),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_never_subscribed_waits_full_window() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.cool_down_delay(None), Duration::from_secs(10));
    }

    #[test]
    fn test_retry_ceiling() {
        let policy = ReconnectPolicy {
            max_retries: 3,
            ..Default::default()
        };
        assert!(policy.allows_retry(0));
        assert!(policy.allows_retry(2));
        assert!(!policy.allows_retry(3));

        let no_retries = ReconnectPolicy {
            max_retries: 0,
            ..Default::default()
        };
        assert!(!no_retries.allows_retry(0));
    }

    #[test]
    fn test_from_config() {
        let policy = ReconnectPolicy::from_config(&Config::default());
        assert_eq!(policy, ReconnectPolicy::default());
    }
}
