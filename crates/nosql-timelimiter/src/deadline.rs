use crate::events::TimeLimiterEvent;
use nosql_core::{EventListeners, ExecutionEvent as _};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::error::Elapsed;

/// Tracks a single absolute deadline and bounds a future against whatever
/// of it remains.
///
/// The execution engine constructs one `Deadline` from the request's
/// overall timeout at the start of `execute`, then re-derives the
/// remaining budget at each suspension point named in the concurrency
/// model (limiter waits, channel acquisition, the HTTP round trip, retry
/// delay) by calling [`Deadline::remaining`] rather than recomputing from
/// the original timeout, so earlier waits are never double-counted.
pub struct Deadline {
    start: Instant,
    duration: Duration,
    name: String,
    event_listeners: EventListeners<TimeLimiterEvent>,
}

impl Deadline {
    pub fn new(duration: Duration) -> Self {
        Self {
            start: Instant::now(),
            duration,
            name: "<unnamed>".to_string(),
            event_listeners: EventListeners::new(),
        }
    }

    pub fn named(duration: Duration, name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            duration,
            name: name.into(),
            event_listeners: EventListeners::new(),
        }
    }

    pub fn with_event_listeners(mut self, listeners: EventListeners<TimeLimiterEvent>) -> Self {
        self.event_listeners = listeners;
        self
    }

    /// Time left before the deadline, zero if already elapsed.
    pub fn remaining(&self) -> Duration {
        self.duration.saturating_sub(self.start.elapsed())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Runs `fut`, failing with [`Elapsed`] if it doesn't resolve before
    /// the deadline. Emits a `Completed`/`TimedOut` event either way.
    pub async fn bounded<F: Future>(&self, fut: F) -> Result<F::Output, Elapsed> {
        let start = Instant::now();
        let result = tokio::time::timeout(self.remaining(), fut).await;
        match &result {
            Ok(_) => self.event_listeners.emit(&TimeLimiterEvent::Completed {
                pattern_name: self.name.clone(),
                timestamp: Instant::now(),
                duration: start.elapsed(),
            }),
            Err(_) => self.event_listeners.emit(&TimeLimiterEvent::TimedOut {
                pattern_name: self.name.clone(),
                timestamp: Instant::now(),
                timeout: self.duration,
            }),
        }
        result
    }
}
