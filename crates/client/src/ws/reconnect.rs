/// 重连退避策略
///
/// `delay(n) = min(base * 2^n, cap)`，超过最大次数后不再重连

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    base: Duration,
    cap: Duration,
    max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            cap,
            max_attempts,
        }
    }

    /// 第 n 次重连（从 0 开始）前的等待时间
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// 已失败 `attempts` 次后是否还允许继续重连
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy::new(Duration::from_secs(1), Duration::from_secs(30), 5)
    }

    #[test]
    fn test_delay_doubles_until_cap() {
        let policy = policy();
        let delays: Vec<u64> = (0..7).map(|n| policy.delay(n).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);
    }

    #[test]
    fn test_delay_matches_formula_and_is_monotonic() {
        let base = Duration::from_millis(500);
        let cap = Duration::from_secs(20);
        let policy = ReconnectPolicy::new(base, cap, 10);

        let mut previous = Duration::ZERO;
        for n in 0..policy.max_attempts() {
            let expected = (base * 2u32.pow(n)).min(cap);
            let delay = policy.delay(n);
            assert_eq!(delay, expected, "attempt {}", n);
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[test]
    fn test_delay_saturates_on_large_attempts() {
        let policy = policy();
        assert_eq!(policy.delay(40), Duration::from_secs(30));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_attempt_ceiling() {
        let policy = policy();
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(4));
        assert!(!policy.should_retry(5));

        let never = ReconnectPolicy::new(Duration::from_secs(1), Duration::from_secs(1), 0);
        assert!(!never.should_retry(0));
    }
}
