//! Interval functions computing the delay before the next retry attempt.

use std::time::Duration;

/// Computes the delay before retry attempt `attempt` (1-indexed: the delay
/// awaited before the *second* overall attempt is `interval(1)`).
pub trait IntervalFunction: Send + Sync {
    fn interval(&self, attempt: usize) -> Duration;
}

/// Always waits the same duration.
pub struct FixedInterval {
    duration: Duration,
}

impl FixedInterval {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl IntervalFunction for FixedInterval {
    fn interval(&self, _attempt: usize) -> Duration {
        self.duration
    }
}

/// Doubles the interval on each attempt, capped at `max_interval`.
pub struct ExponentialBackoff {
    initial_interval: Duration,
    multiplier: f64,
    max_interval: Duration,
}

impl ExponentialBackoff {
    pub fn new(initial_interval: Duration) -> Self {
        Self {
            initial_interval,
            multiplier: 2.0,
            max_interval: Duration::from_secs(30),
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = max_interval;
        self
    }
}

impl IntervalFunction for ExponentialBackoff {
    fn interval(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let factor = self.multiplier.powi(exponent);
        let scaled = self.initial_interval.as_secs_f64() * factor;
        Duration::from_secs_f64(scaled).min(self.max_interval)
    }
}

/// Exponential backoff with full jitter: the delay is drawn uniformly from
/// `[0, exponential_interval(attempt)]`, spreading out retries from
/// concurrent callers that failed at the same moment.
pub struct ExponentialRandomBackoff {
    base: ExponentialBackoff,
}

impl ExponentialRandomBackoff {
    pub fn new(initial_interval: Duration) -> Self {
        Self {
            base: ExponentialBackoff::new(initial_interval),
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.base = self.base.with_multiplier(multiplier);
        self
    }

    pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.base = self.base.with_max_interval(max_interval);
        self
    }
}

impl IntervalFunction for ExponentialRandomBackoff {
    fn interval(&self, attempt: usize) -> Duration {
        let upper = self.base.interval(attempt);
        if upper.is_zero() {
            return upper;
        }
        let jitter: f64 = rand::random();
        Duration::from_secs_f64(upper.as_secs_f64() * jitter)
    }
}

/// Wraps an arbitrary closure as an [`IntervalFunction`].
pub struct FnInterval<F>(F)
where
    F: Fn(usize) -> Duration + Send + Sync;

impl<F> FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> IntervalFunction for FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    fn interval(&self, attempt: usize) -> Duration {
        (self.0)(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_interval_never_changes() {
        let f = FixedInterval::new(Duration::from_millis(50));
        assert_eq!(f.interval(1), Duration::from_millis(50));
        assert_eq!(f.interval(10), Duration::from_millis(50));
    }

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let f = ExponentialBackoff::new(Duration::from_millis(100))
            .with_max_interval(Duration::from_millis(350));
        assert_eq!(f.interval(1), Duration::from_millis(100));
        assert_eq!(f.interval(2), Duration::from_millis(200));
        assert_eq!(f.interval(3), Duration::from_millis(350));
        assert_eq!(f.interval(4), Duration::from_millis(350));
    }

    #[test]
    fn exponential_random_backoff_stays_within_bound() {
        let f = ExponentialRandomBackoff::new(Duration::from_millis(100));
        for attempt in 1..5 {
            let upper = ExponentialBackoff::new(Duration::from_millis(100)).interval(attempt);
            let sampled = f.interval(attempt);
            assert!(sampled <= upper);
        }
    }

    #[test]
    fn fn_interval_delegates_to_closure() {
        let f = FnInterval::new(|attempt| Duration::from_millis(attempt as u64 * 10));
        assert_eq!(f.interval(3), Duration::from_millis(30));
    }
}
