//! Exponential backoff with jitter for failed deliveries.

use std::time::Duration;

use rand::Rng;

/// Backoff policy applied after consecutive delivery failures.
///
/// The delay after `n` consecutive failures is
/// `min(base * 2^n, max_delay)` plus up to `jitter` of that delay, so
/// clients that failed together do not retry together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Base delay, normally the flush interval.
    pub base: Duration,
    /// Ceiling before jitter.
    pub max_delay: Duration,
    /// Consecutive failure count is capped here to bound growth.
    pub max_failures: u32,
    /// Maximum extra delay as a fraction of the computed delay (0.0 to 1.0).
    pub jitter: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            max_failures: 6,
            jitter: 0.2,
        }
    }
}

impl Backoff {
    /// Next failure count after one more failure.
    pub fn next_failures(&self, failures: u32) -> u32 {
        failures.saturating_add(1).min(self.max_failures)
    }

    /// Delay before jitter for the given failure count.
    pub fn base_delay(&self, failures: u32) -> Duration {
        let exponent = failures.min(self.max_failures).min(20);
        let multiplier = 2_u32.saturating_pow(exponent);
        self.base.saturating_mul(multiplier).min(self.max_delay)
    }

    /// Delay including random jitter.
    pub fn delay(&self, failures: u32) -> Duration {
        apply_jitter(self.base_delay(failures), self.jitter)
    }

    /// Upper bound of [`Backoff::delay`] for the given failure count.
    pub fn max_jittered_delay(&self, failures: u32) -> Duration {
        self.base_delay(failures)
            .mul_f64(1.0 + self.jitter.clamp(0.0, 1.0))
    }
}

/// Add up to `jitter_factor` of `duration` on top of it.
fn apply_jitter(duration: Duration, jitter_factor: f64) -> Duration {
    if jitter_factor.is_nan() || jitter_factor <= 0.0 || duration.is_zero() {
        return duration;
    }

    let clamped = jitter_factor.min(1.0);
    let extra = rand::rng().random_range(0.0..clamped);
    duration + duration.mul_f64(extra)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> Backoff {
        Backoff {
            base: Duration::from_millis(5000),
            max_delay: Duration::from_millis(60_000),
            max_failures: 6,
            jitter: 0.0,
        }
    }

    #[test]
    fn doubles_per_failure_until_capped() {
        let p = policy();
        assert_eq!(p.base_delay(1), Duration::from_millis(10_000));
        assert_eq!(p.base_delay(2), Duration::from_millis(20_000));
        assert_eq!(p.base_delay(3), Duration::from_millis(40_000));
        assert_eq!(p.base_delay(4), Duration::from_millis(60_000));
        assert_eq!(p.base_delay(6), Duration::from_millis(60_000));
        assert_eq!(p.base_delay(u32::MAX), Duration::from_millis(60_000));
    }

    #[test]
    fn failure_count_is_capped() {
        let p = policy();
        assert_eq!(p.next_failures(0), 1);
        assert_eq!(p.next_failures(5), 6);
        assert_eq!(p.next_failures(6), 6);
        assert_eq!(p.next_failures(u32::MAX), 6);
    }

    #[test]
    fn zero_jitter_is_deterministic() {
        let p = policy();
        assert_eq!(p.delay(1), p.base_delay(1));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let p = Backoff {
            jitter: 0.2,
            ..policy()
        };
        for _ in 0..200 {
            let d = p.delay(1);
            assert!(d >= Duration::from_millis(10_000));
            assert!(d <= p.max_jittered_delay(1));
        }
        assert_eq!(p.max_jittered_delay(1), Duration::from_millis(12_000));
    }
}
