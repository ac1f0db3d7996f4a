use crate::events::RateLimiterEvent;
use nosql_core::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for a [`crate::RateLimiter`].
pub struct RateLimiterConfig {
    pub(crate) limit_per_second: f64,
    pub(crate) duration_seconds: f64,
    pub(crate) event_listeners: EventListeners<RateLimiterEvent>,
    pub(crate) name: String,
}

/// Builder for [`RateLimiterConfig`].
pub struct RateLimiterConfigBuilder {
    limit_per_second: f64,
    duration_seconds: f64,
    event_listeners: EventListeners<RateLimiterEvent>,
    name: String,
}

impl Default for RateLimiterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiterConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - limit_per_second: 0 (callers must size the limiter off the
    ///   table's read/write unit limits before first use)
    /// - duration_seconds: 1.0, giving a one-second bucket
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            limit_per_second: 0.0,
            duration_seconds: 1.0,
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Sets the steady-state admission rate, in units per second.
    pub fn limit_per_second(mut self, limit: f64) -> Self {
        self.limit_per_second = limit;
        self
    }

    /// Sets the bucket size, in seconds of `limit_per_second` throughput.
    ///
    /// A value of 1.0 lets the limiter burst up to one second's worth of
    /// units before it starts making callers wait.
    pub fn duration_seconds(mut self, duration: f64) -> Self {
        self.duration_seconds = duration;
        self
    }

    /// Sets the name for this rate limiter instance (used in events).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked when units are consumed, immediately or
    /// after a wait.
    ///
    /// # Callback Signature
    /// `Fn(Duration)` - the time this call spent waiting for refill. Close
    /// to zero when units were immediately available.
    pub fn on_consumed<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            match event {
                RateLimiterEvent::Consumed { .. } => f(Duration::ZERO),
                RateLimiterEvent::Waited { wait, .. } => f(*wait),
                _ => {}
            }
        }));
        self
    }

    /// Registers a callback invoked when a call times out without
    /// consuming units (`always_consume == false`).
    ///
    /// # Callback Signature
    /// `Fn(Duration)` - the configured timeout that was exceeded.
    pub fn on_timed_out<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::TimedOut { timeout, .. } = event {
                f(*timeout);
            }
        }));
        self
    }

    /// Builds the rate limiter.
    pub fn build(self) -> crate::RateLimiter {
        let config = RateLimiterConfig {
            limit_per_second: self.limit_per_second,
            duration_seconds: self.duration_seconds,
            event_listeners: self.event_listeners,
            name: self.name,
        };

        crate::RateLimiter::new(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RateLimiter;

    #[test]
    fn test_builder_defaults() {
        let _rl = RateLimiter::builder().build();
    }

    #[test]
    fn test_builder_custom_values() {
        let _rl = RateLimiter::builder()
            .limit_per_second(100.0)
            .duration_seconds(2.0)
            .name("test-limiter")
            .build();
    }

    #[test]
    fn test_event_listeners() {
        let _rl = RateLimiter::builder()
            .on_consumed(|_| {})
            .on_timed_out(|_| {})
            .build();
    }
}
