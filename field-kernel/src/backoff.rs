use std::time::Duration;

/// Jitterless doubling backoff schedule, kept separate from the I/O it
/// paces so the timing decisions stay unit-testable.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub initial: Duration,
    pub multiplier: u32,
    pub max_interval: Duration,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            multiplier: 2,
            max_interval: Duration::from_secs(30),
            max_retries: 10,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait before retry number `attempt` (zero-based), or
    /// `None` once the attempt budget is spent.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        let factor = self.multiplier.saturating_pow(attempt);
        Some(self.initial.saturating_mul(factor).min(self.max_interval))
    }

    /// The full delay sequence this policy will produce.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_retries).filter_map(|n| self.delay(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_capped() {
        let policy = RetryPolicy {
            initial: Duration::from_millis(100),
            multiplier: 2,
            max_interval: Duration::from_millis(450),
            max_retries: 5,
        };
        let delays: Vec<_> = policy.delays().map(|d| d.as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 450, 450]);
    }

    #[test]
    fn exhausts_after_max_retries() {
        let policy = RetryPolicy { max_retries: 3, ..RetryPolicy::default() };
        assert!(policy.delay(2).is_some());
        assert!(policy.delay(3).is_none());
        assert_eq!(policy.delays().count(), 3);
    }

    #[test]
    fn default_schedule_is_bounded() {
        let policy = RetryPolicy::default();
        let total: Duration = policy.delays().sum();
        assert!(total < Duration::from_secs(300));
        assert!(policy.delays().all(|d| d <= policy.max_interval));
    }
}
