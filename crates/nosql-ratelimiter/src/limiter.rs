//! A token-bucket rate limiter matching the `consumeUnitsWithTimeout`
//! contract used by the execution engine.

use crate::config::RateLimiterConfig;
use crate::events::RateLimiterEvent;
use nosql_core::{EventListeners, ExecutionEvent as _};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Returned when the deadline elapses and `always_consume` was `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumeTimedOut;

impl std::fmt::Display for ConsumeTimedOut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "timed out waiting for rate limiter capacity")
    }
}

impl std::error::Error for ConsumeTimedOut {}

struct Bucket {
    /// May go negative: a forced (`always_consume`) charge can push the
    /// bucket below zero, which simply means the next caller waits longer.
    balance: f64,
    last_refill: Instant,
}

/// A client-local token bucket for one (table, direction) pair.
///
/// Capacity is `limit_per_second * duration_seconds`; refill happens
/// continuously at `limit_per_second` units/sec, computed lazily on each
/// call rather than via a background tick.
pub struct RateLimiter {
    limit_per_second: f64,
    capacity: f64,
    bucket: Mutex<Bucket>,
    current_rate: Mutex<f64>,
    name: String,
    pub(crate) event_listeners: EventListeners<RateLimiterEvent>,
}

impl RateLimiter {
    /// Starts a [`RateLimiterConfigBuilder`] with the crate defaults.
    pub fn builder() -> crate::config::RateLimiterConfigBuilder {
        crate::config::RateLimiterConfigBuilder::new()
    }

    pub fn new(config: RateLimiterConfig) -> Self {
        let capacity = config.limit_per_second * config.duration_seconds;
        Self {
            limit_per_second: config.limit_per_second,
            capacity,
            bucket: Mutex::new(Bucket {
                balance: capacity,
                last_refill: Instant::now(),
            }),
            current_rate: Mutex::new(0.0),
            name: config.name,
            event_listeners: config.event_listeners,
        }
    }

    pub fn limit_per_second(&self) -> f64 {
        self.limit_per_second
    }

    /// Percent of the limit recently used for backpressure signalling
    /// (forced to >=100 by the engine after a throttling response).
    pub fn current_rate(&self) -> f64 {
        *self.current_rate.lock().unwrap()
    }

    pub fn set_current_rate(&self, percent: f64) {
        *self.current_rate.lock().unwrap() = percent;
    }

    fn refill_locked(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            bucket.balance = (bucket.balance + elapsed * self.limit_per_second).min(self.capacity);
            bucket.last_refill = now;
        }
    }

    /// The 3-argument contract used for most calls: `units == 0` only
    /// blocks while the bucket is negative (the pre-dispatch "wait until
    /// serviceable" probe); `always_consume` forces the charge through even
    /// past the deadline instead of failing.
    pub async fn consume_units_with_timeout(
        &self,
        units: i64,
        timeout: Duration,
        always_consume: bool,
    ) -> Result<Duration, ConsumeTimedOut> {
        self.consume_units_with_timeout_pct(units, timeout, always_consume, 100.0)
            .await
    }

    /// The richer 4-argument variant: `percent` scales the effective
    /// refill rate this call is allowed to draw against, so one oversized
    /// request can't claim the entire per-table budget.
    pub async fn consume_units_with_timeout_pct(
        &self,
        units: i64,
        timeout: Duration,
        always_consume: bool,
        percent: f64,
    ) -> Result<Duration, ConsumeTimedOut> {
        let start = Instant::now();
        let scale = (percent / 100.0).clamp(0.0, 1.0).max(f64::MIN_POSITIVE);

        loop {
            let now = Instant::now();
            let mut bucket = self.bucket.lock().unwrap();
            self.refill_locked(&mut bucket, now);

            let serviceable = if units == 0 {
                bucket.balance >= 0.0
            } else {
                bucket.balance >= units as f64
            };

            if serviceable {
                if units != 0 {
                    bucket.balance -= units as f64;
                }
                drop(bucket);
                let waited = now.duration_since(start);
                self.emit(if waited.is_zero() {
                    RateLimiterEvent::Consumed {
                        pattern_name: self.name.clone(),
                        timestamp: now,
                        units,
                    }
                } else {
                    RateLimiterEvent::Waited {
                        pattern_name: self.name.clone(),
                        timestamp: now,
                        units,
                        wait: waited,
                    }
                });
                return Ok(waited);
            }

            let needed = if units == 0 {
                -bucket.balance
            } else {
                units as f64 - bucket.balance
            };
            let wait_for_refill =
                Duration::from_secs_f64((needed / (self.limit_per_second * scale)).max(0.0));
            drop(bucket);

            let elapsed = now.duration_since(start);
            let remaining = timeout.saturating_sub(elapsed);

            if wait_for_refill > remaining {
                if always_consume {
                    let mut bucket = self.bucket.lock().unwrap();
                    if units != 0 {
                        bucket.balance -= units as f64;
                    }
                    drop(bucket);
                    self.emit(RateLimiterEvent::Waited {
                        pattern_name: self.name.clone(),
                        timestamp: Instant::now(),
                        units,
                        wait: timeout,
                    });
                    return Ok(timeout);
                }
                self.emit(RateLimiterEvent::TimedOut {
                    pattern_name: self.name.clone(),
                    timestamp: Instant::now(),
                    units,
                    timeout,
                });
                return Err(ConsumeTimedOut);
            }

            sleep(wait_for_refill.min(remaining)).await;
        }
    }

    fn emit(&self, event: RateLimiterEvent) {
        self.event_listeners.emit(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimiterConfigBuilder;

    fn limiter(limit_per_second: f64, duration_seconds: f64) -> RateLimiter {
        RateLimiter::new(
            RateLimiterConfigBuilder::new()
                .limit_per_second(limit_per_second)
                .duration_seconds(duration_seconds)
                .build(),
        )
    }

    #[tokio::test]
    async fn consumes_immediately_within_capacity() {
        let rl = limiter(100.0, 1.0);
        let waited = rl
            .consume_units_with_timeout(50, Duration::from_millis(100), false)
            .await
            .unwrap();
        assert!(waited.is_zero());
    }

    #[tokio::test]
    async fn zero_units_probe_blocks_only_when_negative() {
        let rl = limiter(10.0, 1.0);
        // Drain below zero via a forced overdraft.
        rl.consume_units_with_timeout(10, Duration::from_millis(10), false)
            .await
            .unwrap();
        rl.consume_units_with_timeout(5, Duration::from_millis(10), true)
            .await
            .unwrap();

        let start = Instant::now();
        rl.consume_units_with_timeout(0, Duration::from_millis(600), false)
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test]
    async fn times_out_when_not_always_consume() {
        let rl = limiter(1.0, 1.0);
        let result = rl
            .consume_units_with_timeout(100, Duration::from_millis(20), false)
            .await;
        assert_eq!(result, Err(ConsumeTimedOut));
    }

    #[tokio::test]
    async fn always_consume_forces_negative_balance_without_error() {
        let rl = limiter(1.0, 1.0);
        let waited = rl
            .consume_units_with_timeout(100, Duration::from_millis(20), true)
            .await
            .unwrap();
        assert_eq!(waited, Duration::from_millis(20));
        assert!(
            rl.consume_units_with_timeout(0, Duration::from_millis(0), false)
                .await
                .is_err(),
            "bucket should now be deeply negative"
        );
    }

    #[tokio::test]
    async fn refills_over_time() {
        let rl = limiter(100.0, 1.0);
        rl.consume_units_with_timeout(100, Duration::from_millis(10), false)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        let waited = rl
            .consume_units_with_timeout(10, Duration::from_millis(10), false)
            .await
            .unwrap();
        assert!(waited.is_zero());
    }
}
