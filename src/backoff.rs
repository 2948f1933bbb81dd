// file: src/backoff.rs
// description: exponential backoff schedule shared by both channel clients

use std::time::Duration;

/// Reconnect schedule: `base_delay * 2^(attempt-1)` up to `max_attempts`.
///
/// Attempts are numbered from 1. Once the cap is exceeded the policy refuses
/// to schedule and the caller must surface a terminal failure; only an
/// explicit manual reconnect (which resets the attempt counter) resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
        }
    }

    /// Delay before the given reconnect attempt, or `None` when the attempt
    /// budget is exhausted (or `attempt` is zero, which never schedules).
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = 2u32.saturating_pow(attempt - 1);
        Some(self.base_delay.saturating_mul(factor))
    }

    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt > self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_attempts: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_per_attempt() {
        let policy = RetryPolicy::new(Duration::from_millis(100), 5);

        assert_eq!(policy.delay(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay(2), Some(Duration::from_millis(200)));
        assert_eq!(policy.delay(3), Some(Duration::from_millis(400)));
        assert_eq!(policy.delay(4), Some(Duration::from_millis(800)));
        assert_eq!(policy.delay(5), Some(Duration::from_millis(1600)));
    }

    #[test]
    fn refuses_past_the_cap() {
        let policy = RetryPolicy::new(Duration::from_millis(100), 3);

        assert_eq!(policy.delay(3), Some(Duration::from_millis(400)));
        assert_eq!(policy.delay(4), None);
        assert!(policy.is_exhausted(4));
        assert!(!policy.is_exhausted(3));
    }

    #[test]
    fn attempt_zero_never_schedules() {
        let policy = RetryPolicy::new(Duration::from_millis(100), 3);
        assert_eq!(policy.delay(0), None);
    }

    #[test]
    fn large_attempts_saturate_instead_of_overflowing() {
        let policy = RetryPolicy::new(Duration::from_secs(1), u32::MAX);
        // Far past any realistic budget; must not panic.
        assert!(policy.delay(64).is_some());
    }
}
