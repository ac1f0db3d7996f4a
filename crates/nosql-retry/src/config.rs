use crate::backoff::{ExponentialBackoff, ExponentialRandomBackoff, FixedInterval, IntervalFunction};
use crate::events::RetryEvent;
use crate::handler::DefaultRetryHandler;
use crate::policy::{default_retry_predicate, RetryPredicate};
use nosql_core::{EventListeners, FnListener};
use std::sync::Arc;
use std::time::Duration;

/// Builder for a [`DefaultRetryHandler`].
pub struct RetryHandlerConfigBuilder<Req: ?Sized> {
    max_attempts: usize,
    interval_fn: Option<Arc<dyn IntervalFunction>>,
    retry_predicate: Option<RetryPredicate>,
    event_listeners: EventListeners<RetryEvent>,
    name: String,
    _phantom: std::marker::PhantomData<fn(&Req)>,
}

impl<Req: ?Sized> Default for RetryHandlerConfigBuilder<Req> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req: ?Sized> RetryHandlerConfigBuilder<Req> {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - max_attempts: 10
    /// - backoff: exponential with 100ms initial interval
    /// - retry predicate: [`NoSqlError::is_retryable`](nosql_core::NoSqlError::is_retryable)
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            max_attempts: 10,
            interval_fn: None,
            retry_predicate: None,
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
            _phantom: std::marker::PhantomData,
        }
    }

    /// Sets the maximum number of attempts, including the initial one.
    pub fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets a fixed backoff interval.
    pub fn fixed_backoff(mut self, duration: Duration) -> Self {
        self.interval_fn = Some(Arc::new(FixedInterval::new(duration)));
        self
    }

    /// Sets exponential backoff with default settings.
    pub fn exponential_backoff(mut self, initial_interval: Duration) -> Self {
        self.interval_fn = Some(Arc::new(ExponentialBackoff::new(initial_interval)));
        self
    }

    /// Sets exponential backoff with full jitter.
    pub fn exponential_random_backoff(mut self, initial_interval: Duration) -> Self {
        self.interval_fn = Some(Arc::new(ExponentialRandomBackoff::new(initial_interval)));
        self
    }

    /// Sets a custom interval function for backoff.
    pub fn backoff<I>(mut self, interval_fn: I) -> Self
    where
        I: IntervalFunction + 'static,
    {
        self.interval_fn = Some(Arc::new(interval_fn));
        self
    }

    /// Sets a predicate to determine which errors should be retried.
    pub fn retry_on<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&nosql_core::NoSqlError) -> bool + Send + Sync + 'static,
    {
        self.retry_predicate = Some(Arc::new(predicate));
        self
    }

    /// Sets the name for this retry handler instance (used in events).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback when a retry attempt is about to be made.
    ///
    /// # Callback Signature
    /// `Fn(usize, Duration)` - attempt number (1-indexed) and delay.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Retry { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        }));
        self
    }

    /// Registers a callback when all retry attempts are exhausted.
    ///
    /// # Callback Signature
    /// `Fn(usize)` - total attempts made, including the initial one.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Error { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Registers a callback when an error is ignored and not retried.
    pub fn on_ignored_error<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, RetryEvent::IgnoredError { .. }) {
                f();
            }
        }));
        self
    }

    /// Builds the retry handler.
    pub fn build(self) -> DefaultRetryHandler<Req> {
        let interval_fn = self
            .interval_fn
            .unwrap_or_else(|| Arc::new(ExponentialBackoff::new(Duration::from_millis(100))));
        let predicate = self.retry_predicate.unwrap_or_else(default_retry_predicate);

        DefaultRetryHandler::new(
            interval_fn,
            predicate,
            self.max_attempts,
            self.event_listeners,
            self.name,
        )
    }
}
