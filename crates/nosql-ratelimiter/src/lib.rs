//! A client-side token-bucket rate limiter used to pace read and write
//! units against a table's provisioned (or on-demand) throughput.
//!
//! The execution engine keeps one [`RateLimiter`] per table per direction
//! (read/write), sized from the table's limits and refreshed in the
//! background as those limits change. Both sides of the engine's
//! pre-dispatch and post-response bookkeeping go through
//! [`RateLimiter::consume_units_with_timeout`].
//!
//! # Examples
//!
//! ```
//! use nosql_ratelimiter::RateLimiter;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let limiter = RateLimiter::builder()
//!     .limit_per_second(100.0)
//!     .duration_seconds(1.0)
//!     .on_consumed(|wait| {
//!         if wait > Duration::from_millis(0) {
//!             println!("waited {:?} for units", wait);
//!         }
//!     })
//!     .build();
//!
//! let _ = limiter
//!     .consume_units_with_timeout(10, Duration::from_millis(500), false)
//!     .await;
//! # }
//! ```

mod config;
mod events;
mod limiter;

pub use config::{RateLimiterConfig, RateLimiterConfigBuilder};
pub use events::RateLimiterEvent;
pub use limiter::{ConsumeTimedOut, RateLimiter};
