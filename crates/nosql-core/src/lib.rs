//! Core error types and event system shared by the NoSQL driver crates.
//!
//! - [`error`]: the wire error-code table, [`NoSqlError`], and the
//!   engine-level [`ExecutionError`] / [`RequestTimeoutError`] types.
//! - [`events`]: a small observer system (listeners, not a `tracing`
//!   dependency) used to surface retries, limiter waits and background
//!   refresh outcomes to callers that want them.

pub mod error;
pub mod events;

pub use error::{ExecutionError, NoSqlError, NoSqlErrorCode, RequestTimeoutError, Result};
pub use events::{EventListener, EventListeners, ExecutionEvent, FnListener};
