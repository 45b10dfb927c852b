//! Exponential backoff schedule.

use rand::Rng;
use std::time::Duration;

/// Computes the delay before retry number `attempt` (0-based).
///
/// The delay is `min * factor^attempt`, clamped to `max`. With `jitter`, the
/// delay is drawn uniformly from `[min, min * factor^attempt)` before
/// clamping.
pub fn calculate_duration(
    min: Duration,
    max: Duration,
    factor: f64,
    jitter: bool,
    attempt: u32,
) -> Duration {
    let min_secs = min.as_secs_f64();
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let mut secs = min_secs * factor.powi(exponent);
    if jitter {
        secs = rand::thread_rng().gen_range(0.0..1.0) * (secs - min_secs) + min_secs;
    }

    if !secs.is_finite() || secs >= max.as_secs_f64() {
        return max;
    }
    Duration::from_secs_f64(secs.max(0.0))
}

/// A fixed backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub min: Duration,
    pub max: Duration,
    pub factor: f64,
    pub jitter: bool,
}

impl Backoff {
    /// Creates a schedule without jitter.
    pub fn new(min: Duration, max: Duration, factor: f64) -> Self {
        Self {
            min,
            max,
            factor,
            jitter: false,
        }
    }

    /// Enables jitter.
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    /// Delay before retry number `attempt`.
    pub fn duration(&self, attempt: u32) -> Duration {
        calculate_duration(self.min, self.max, self.factor, self.jitter, attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: Duration = Duration::from_millis(100);
    const MAX: Duration = Duration::from_secs(30);

    #[test]
    fn test_schedule_doubles_from_floor() {
        let backoff = Backoff::new(MIN, MAX, 2.0);
        assert_eq!(backoff.duration(0), Duration::from_millis(100));
        assert_eq!(backoff.duration(1), Duration::from_millis(200));
        assert_eq!(backoff.duration(2), Duration::from_millis(400));
        assert_eq!(backoff.duration(5), Duration::from_millis(3200));
        assert_eq!(backoff.duration(8), Duration::from_millis(25_600));
    }

    #[test]
    fn test_schedule_clamps_to_ceiling() {
        let backoff = Backoff::new(MIN, MAX, 2.0);
        for attempt in 9..15 {
            assert_eq!(backoff.duration(attempt), MAX, "attempt {attempt}");
        }
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        assert_eq!(calculate_duration(MIN, MAX, 2.0, false, u32::MAX), MAX);
        assert_eq!(calculate_duration(MIN, MAX, 2.0, true, 5000), MAX);
    }

    #[test]
    fn test_factor_one_is_constant() {
        let backoff = Backoff::new(MIN, MAX, 1.0);
        assert_eq!(backoff.duration(0), MIN);
        assert_eq!(backoff.duration(10), MIN);
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let backoff = Backoff::new(MIN, MAX, 2.0).with_jitter();
        for _ in 0..100 {
            let d = backoff.duration(4);
            assert!(d >= MIN && d <= Duration::from_millis(1600), "{d:?}");
        }
    }
}
