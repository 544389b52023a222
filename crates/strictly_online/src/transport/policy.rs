//! Exponential backoff for automatic reconnection.

use std::time::Duration;

use derive_getters::Getters;
use derive_setters::Setters;

/// Reconnection schedule: `min(base * 2^attempt, cap)`, at most `max_attempts` tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters, Setters)]
#[setters(prefix = "with_")]
pub struct ReconnectPolicy {
    /// Unit delay multiplied by `2^attempt`.
    base: Duration,
    /// Upper bound on any single delay.
    cap: Duration,
    /// Attempts allowed after a connection is lost before giving up.
    max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Creates a policy.
    pub fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            cap,
            max_attempts,
        }
    }

    /// Delay before the given 1-based attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.cap, |delay| delay.min(self.cap))
    }

    /// Next attempt number and its delay, given how many attempts were made.
    ///
    /// Returns `None` once the ceiling is reached.
    pub fn next_delay(&self, attempts_made: u32) -> Option<(u32, Duration)> {
        if attempts_made >= self.max_attempts {
            return None;
        }
        let attempt = attempts_made + 1;
        Some((attempt, self.delay_for(attempt)))
    }

    /// The full schedule, one delay per allowed attempt.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..=self.max_attempts).map(|a| self.delay_for(a)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule_is_capped() {
        let policy = ReconnectPolicy::default();
        let secs: Vec<u64> = policy.schedule().iter().map(Duration::as_secs).collect();
        assert_eq!(secs, [2, 4, 8, 16, 30]);
    }

    #[test]
    fn test_no_sixth_attempt() {
        let policy = ReconnectPolicy::default();
        let mut made = 0;
        let mut delays = Vec::new();
        while let Some((attempt, delay)) = policy.next_delay(made) {
            made = attempt;
            delays.push(delay);
        }
        assert_eq!(made, 5);
        assert_eq!(delays.len(), 5);
        assert_eq!(policy.next_delay(5), None);
    }

    #[test]
    fn test_huge_attempt_saturates_at_cap() {
        let policy = ReconnectPolicy::default().with_max_attempts(100);
        assert_eq!(policy.delay_for(40), Duration::from_secs(30));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_custom_base() {
        let policy = ReconnectPolicy::default()
            .with_base(Duration::from_millis(100))
            .with_cap(Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(4), Duration::from_secs(1));
    }
}
