//! Deadline bookkeeping and a timeout-bounded future helper for the NoSQL
//! driver.
//!
//! The execution engine derives one [`Deadline`] from a request's overall
//! timeout and re-derives the remaining budget from it at each suspension
//! point (limiter waits, channel acquisition, the HTTP round trip, retry
//! delay), rather than re-timing from the original deadline, so waits
//! already spent are never double-counted against the request.
//!
//! # Examples
//!
//! ```
//! use nosql_timelimiter::Deadline;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let deadline = Deadline::new(Duration::from_secs(5));
//! let result = deadline.bounded(async { 42 }).await;
//! assert_eq!(result, Ok(42));
//! # }
//! ```

mod config;
mod deadline;
mod events;

pub use config::DeadlineBuilder;
pub use deadline::Deadline;
pub use events::TimeLimiterEvent;
