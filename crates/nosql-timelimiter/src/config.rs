use crate::events::TimeLimiterEvent;
use nosql_core::{EventListeners, FnListener};
use std::time::Duration;

/// Builder for a [`crate::Deadline`].
pub struct DeadlineBuilder {
    name: String,
    event_listeners: EventListeners<TimeLimiterEvent>,
}

impl Default for DeadlineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DeadlineBuilder {
    pub fn new() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            event_listeners: EventListeners::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked when a bounded future completes.
    ///
    /// # Callback Signature
    /// `Fn(Duration)` - how long the future actually took.
    pub fn on_completed<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let TimeLimiterEvent::Completed { duration, .. } = event {
                f(*duration);
            }
        }));
        self
    }

    /// Registers a callback invoked when the deadline elapses first.
    ///
    /// # Callback Signature
    /// `Fn(Duration)` - the configured timeout that was exceeded.
    pub fn on_timed_out<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let TimeLimiterEvent::TimedOut { timeout, .. } = event {
                f(*timeout);
            }
        }));
        self
    }

    pub fn build(self, duration: Duration) -> crate::Deadline {
        crate::Deadline::named(duration, self.name).with_event_listeners(self.event_listeners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let _deadline = DeadlineBuilder::new().build(Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_event_listeners() {
        let deadline = DeadlineBuilder::new()
            .on_completed(|_| {})
            .on_timed_out(|_| {})
            .build(Duration::from_millis(50));
        let _ = deadline.bounded(async { 1 }).await;
    }
}
