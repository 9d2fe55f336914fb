//! Reconnect backoff policy.

use std::time::Duration;

/// Exponential reconnect backoff with a hard attempt cap.
///
/// Delay before reconnect attempt `k` (1-based) is
/// `min(base_delay * 2^(k-1), max_delay)`, optionally plus up to
/// `jitter_max` of random jitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt.
    pub base_delay: Duration,
    /// Upper bound on the deterministic part of the delay.
    pub max_delay: Duration,
    /// Reconnect attempts allowed before the channel enters `Failed`.
    pub max_attempts: u32,
    /// Upper bound on random jitter added to each delay (zero disables it).
    pub jitter_max: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
            jitter_max: Duration::ZERO,
        }
    }
}

impl ReconnectPolicy {
    /// Deterministic delay before reconnect attempt `attempt`.
    ///
    /// Non-decreasing in `attempt` and never above `max_delay`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Delay including random jitter.
    pub fn delay_with_jitter(&self, attempt: u32) -> Duration {
        self.delay(attempt) + random_jitter(self.jitter_max)
    }

    /// Whether `attempt` is beyond the cap.
    pub fn exhausted(&self, attempt: u32) -> bool {
        attempt > self.max_attempts
    }
}

/// Random jitter in `0..=max`. Falls back to no jitter if the OS RNG fails.
fn random_jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    let mut bytes = [0u8; 8];
    if getrandom::getrandom(&mut bytes).is_err() {
        return Duration::ZERO;
    }
    Duration::from_millis(u64::from_le_bytes(bytes) % (max_ms + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_from_base() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(4));
        assert_eq!(policy.delay(5), Duration::from_secs(16));
    }

    #[test]
    fn delay_is_non_decreasing_and_capped() {
        let policy = ReconnectPolicy {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            max_attempts: 50,
            jitter_max: Duration::ZERO,
        };
        let mut previous = Duration::ZERO;
        for attempt in 1..=100 {
            let delay = policy.delay(attempt);
            assert!(delay >= previous, "attempt {} went backwards", attempt);
            assert!(delay <= Duration::from_secs(10));
            previous = delay;
        }
        assert_eq!(policy.delay(100), Duration::from_secs(10));
    }

    #[test]
    fn huge_attempt_does_not_overflow() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay(u32::MAX), policy.max_delay);
    }

    #[test]
    fn exhausted_only_past_cap() {
        let policy = ReconnectPolicy::default();
        assert!(!policy.exhausted(5));
        assert!(policy.exhausted(6));
    }

    #[test]
    fn jitter_bounded() {
        let policy = ReconnectPolicy {
            jitter_max: Duration::from_millis(200),
            ..ReconnectPolicy::default()
        };
        for _ in 0..20 {
            let delay = policy.delay_with_jitter(2);
            assert!(delay >= Duration::from_secs(2));
            assert!(delay <= Duration::from_millis(2200));
        }
    }

    #[test]
    fn zero_jitter_is_deterministic() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_with_jitter(3), policy.delay(3));
    }
}
