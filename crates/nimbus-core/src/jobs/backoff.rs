//! Exponential retry delay for full-failure passes.

use std::time::Duration;

const DEFAULT_BASE: Duration = Duration::from_secs(60);
const DEFAULT_FACTOR: u32 = 2;
const DEFAULT_CAP: Duration = Duration::from_secs(60 * 60);

/// `delay(attempt) = base * factor^attempt`, clamped to `cap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base: Duration,
    factor: u32,
    cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE,
            factor: DEFAULT_FACTOR,
            cap: DEFAULT_CAP,
        }
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration, factor: u32, cap: Duration) -> Self {
        Self {
            base,
            factor: factor.max(1),
            cap: cap.max(base),
        }
    }

    pub const fn base(&self) -> Duration {
        self.base
    }

    pub const fn cap(&self) -> Duration {
        self.cap
    }

    /// Delay before the retry that follows `attempt` earlier full failures.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        self.factor
            .checked_pow(attempt)
            .and_then(|multiplier| self.base.checked_mul(multiplier))
            .map_or(self.cap, |delay| delay.min(self.cap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_from_one_minute() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.next_delay(0), Duration::from_secs(60));
        assert_eq!(policy.next_delay(1), Duration::from_secs(120));
        assert_eq!(policy.next_delay(2), Duration::from_secs(240));
    }

    #[test]
    fn delay_is_capped() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.next_delay(6), Duration::from_secs(3_600));
        assert_eq!(policy.next_delay(40), Duration::from_secs(3_600));
        assert_eq!(policy.next_delay(u32::MAX), Duration::from_secs(3_600));
    }

    #[test]
    fn cap_never_below_base() {
        let policy = BackoffPolicy::new(Duration::from_secs(30), 3, Duration::from_secs(10));
        assert_eq!(policy.next_delay(0), Duration::from_secs(30));
        assert_eq!(policy.next_delay(2), Duration::from_secs(30));
    }
}
