//! The predicate deciding whether an error is worth retrying.

use nosql_core::NoSqlError;
use std::sync::Arc;

/// A predicate over a [`NoSqlError`] deciding whether it should be retried.
pub type RetryPredicate = Arc<dyn Fn(&NoSqlError) -> bool + Send + Sync>;

/// The default predicate: defers to [`NoSqlError::is_retryable`], which
/// reflects the error-code table's throttling/server-error ranges.
pub fn default_retry_predicate() -> RetryPredicate {
    Arc::new(|error: &NoSqlError| error.is_retryable())
}
