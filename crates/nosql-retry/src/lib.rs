//! Retry handler and backoff strategies for NoSQL driver request execution.
//!
//! The execution engine consults a [`handler::RetryHandler`] collaborator
//! on every retryable failure: `do_retry` decides whether to try again,
//! `delay` awaits the backoff interval. [`handler::DefaultRetryHandler`]
//! composes an [`backoff::IntervalFunction`] with a retry predicate over
//! [`nosql_core::NoSqlError`] and is what most callers want.
//!
//! # Examples
//!
//! ```
//! use nosql_retry::RetryHandlerConfigBuilder;
//! use std::time::Duration;
//!
//! let _handler = RetryHandlerConfigBuilder::<()>::new()
//!     .max_attempts(5)
//!     .exponential_backoff(Duration::from_millis(100))
//!     .on_retry(|attempt, delay| {
//!         println!("retry {attempt} after {delay:?}");
//!     })
//!     .build();
//! ```

mod backoff;
mod config;
mod events;
mod handler;
mod policy;

pub use backoff::{
    ExponentialBackoff, ExponentialRandomBackoff, FixedInterval, FnInterval, IntervalFunction,
};
pub use config::RetryHandlerConfigBuilder;
pub use events::RetryEvent;
pub use handler::{DefaultRetryHandler, RetryHandler};
pub use policy::{default_retry_predicate, RetryPredicate};
