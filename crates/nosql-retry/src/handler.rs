//! The `RetryHandler` collaborator: decides whether to retry and how long
//! to wait before the next attempt.

use crate::backoff::{ExponentialBackoff, IntervalFunction};
use crate::events::RetryEvent;
use crate::policy::{default_retry_predicate, RetryPredicate};
use async_trait::async_trait;
use nosql_core::{EventListeners, ExecutionEvent as _, NoSqlError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Consulted by the execution engine on every retryable failure.
///
/// `do_retry` decides whether another attempt should be made; if it
/// returns `true` the engine awaits `delay` before re-entering its loop.
/// Both methods see the same `num_retries` and `error` the engine just
/// observed, so implementations can track per-request or global state.
#[async_trait]
pub trait RetryHandler<Req: ?Sized>: Send + Sync {
    async fn do_retry(&self, request: &Req, num_retries: u32, error: &NoSqlError) -> bool;

    async fn delay(&self, request: &Req, num_retries: u32, error: &NoSqlError);
}

/// Composes an [`IntervalFunction`] with a [`RetryPredicate`] and a
/// maximum attempt count. This is what `RetryHandlerConfigBuilder::build`
/// produces, and is a reasonable default for most callers.
///
/// `Req` is `?Sized` so one handler instance can serve every request kind
/// through a `&dyn Request` reference, rather than being parameterized per
/// concrete request type.
pub struct DefaultRetryHandler<Req: ?Sized> {
    interval_fn: Arc<dyn IntervalFunction>,
    predicate: RetryPredicate,
    max_attempts: usize,
    event_listeners: EventListeners<RetryEvent>,
    name: String,
    _phantom: std::marker::PhantomData<fn(&Req)>,
}

impl<Req: ?Sized> DefaultRetryHandler<Req> {
    pub fn new(
        interval_fn: Arc<dyn IntervalFunction>,
        predicate: RetryPredicate,
        max_attempts: usize,
        event_listeners: EventListeners<RetryEvent>,
        name: String,
    ) -> Self {
        Self {
            interval_fn,
            predicate,
            max_attempts,
            event_listeners,
            name,
            _phantom: std::marker::PhantomData,
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }
}

impl<Req: ?Sized> Default for DefaultRetryHandler<Req> {
    fn default() -> Self {
        Self::new(
            Arc::new(ExponentialBackoff::new(Duration::from_millis(100))),
            default_retry_predicate(),
            10,
            EventListeners::new(),
            "<unnamed>".to_string(),
        )
    }
}

#[async_trait]
impl<Req: ?Sized> RetryHandler<Req> for DefaultRetryHandler<Req>
where
    Req: Send + Sync,
{
    async fn do_retry(&self, _request: &Req, num_retries: u32, error: &NoSqlError) -> bool {
        let num_retries = num_retries as usize;
        if num_retries >= self.max_attempts {
            self.event_listeners.emit(&RetryEvent::Error {
                pattern_name: self.name.clone(),
                timestamp: Instant::now(),
                attempts: num_retries,
            });
            return false;
        }
        if !(self.predicate)(error) {
            self.event_listeners.emit(&RetryEvent::IgnoredError {
                pattern_name: self.name.clone(),
                timestamp: Instant::now(),
            });
            return false;
        }
        true
    }

    async fn delay(&self, _request: &Req, num_retries: u32, _error: &NoSqlError) {
        let wait = self.interval_fn.interval(num_retries as usize + 1);
        self.event_listeners.emit(&RetryEvent::Retry {
            pattern_name: self.name.clone(),
            timestamp: Instant::now(),
            attempt: num_retries as usize + 1,
            delay: wait,
        });
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}
