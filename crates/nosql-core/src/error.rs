//! Error types shared by the NoSQL driver crates.
//!
//! [`NoSqlErrorCode`] mirrors the wire protocol's numeric error-code space
//! one-to-one: user errors occupy 1-49, throttling occupies 50-99, and server
//! errors occupy 100 and above. [`NoSqlError`] pairs a code with the
//! server-or-client-supplied message. [`RequestTimeoutError`] is the engine's
//! own terminal error when the per-request deadline is exhausted before any
//! attempt succeeds; it keeps the last observed error as its `source()` so
//! root causes are never lost.

use std::fmt;
use std::time::Duration;

/// Closed set of error codes used on the wire and by the execution engine.
///
/// Ranges, from the protocol definition:
/// - `1..50`: user errors (bad requests, schema problems, auth).
/// - `50..100`: throttling (client is exceeding its provisioned capacity).
/// - `100..150`: server-side errors, some of them retryable.
/// - `1001`: internal-only sentinel meaning "retry the operation locally",
///   never sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum NoSqlErrorCode {
    UnknownOperation = 1,
    TableNotFound = 2,
    IndexNotFound = 3,
    IllegalArgument = 4,
    RowSizeLimitExceeded = 5,
    KeySizeLimitExceeded = 6,
    BatchOpNumberLimitExceeded = 7,
    RequestSizeLimitExceeded = 8,
    TableExists = 9,
    IndexExists = 10,
    InvalidAuthorization = 11,
    InsufficientPermission = 12,
    ResourceExists = 13,
    ResourceNotFound = 14,
    TableLimitExceeded = 15,
    IndexLimitExceeded = 16,
    BadProtocolMessage = 17,
    EvolutionLimitExceeded = 18,
    TableDeploymentLimitExceeded = 19,
    TenantDeploymentLimitExceeded = 20,
    OperationNotSupported = 21,
    EtagMismatch = 22,
    CannotCancelWorkRequest = 23,
    UnsupportedProtocol = 24,

    ReadLimitExceeded = 50,
    WriteLimitExceeded = 51,
    SizeLimitExceeded = 52,
    OperationLimitExceeded = 53,

    RequestTimeout = 100,
    ServerError = 101,
    ServiceUnavailable = 102,
    TableBusy = 103,
    SecurityInfoUnavailable = 104,
    RetryAuthentication = 105,
    UnknownError = 125,
    IllegalState = 126,

    /// Not a wire code. Signals the send/receive loop to retry locally
    /// without involving the caller's retry handler (auth refresh, the
    /// 30ms `SecurityInfoUnavailable` spin, etc).
    InternalRetry = 1001,
}

impl NoSqlErrorCode {
    /// Reconstructs a code from the numeric value read off the wire.
    ///
    /// Unrecognized codes (a newer server talking to an older driver) fall
    /// back to [`NoSqlErrorCode::UnknownError`] rather than failing to parse
    /// the response at all.
    pub fn from_int(v: i32) -> Self {
        use NoSqlErrorCode::*;
        match v {
            1 => UnknownOperation,
            2 => TableNotFound,
            3 => IndexNotFound,
            4 => IllegalArgument,
            5 => RowSizeLimitExceeded,
            6 => KeySizeLimitExceeded,
            7 => BatchOpNumberLimitExceeded,
            8 => RequestSizeLimitExceeded,
            9 => TableExists,
            10 => IndexExists,
            11 => InvalidAuthorization,
            12 => InsufficientPermission,
            13 => ResourceExists,
            14 => ResourceNotFound,
            15 => TableLimitExceeded,
            16 => IndexLimitExceeded,
            17 => BadProtocolMessage,
            18 => EvolutionLimitExceeded,
            19 => TableDeploymentLimitExceeded,
            20 => TenantDeploymentLimitExceeded,
            21 => OperationNotSupported,
            22 => EtagMismatch,
            23 => CannotCancelWorkRequest,
            24 => UnsupportedProtocol,
            50 => ReadLimitExceeded,
            51 => WriteLimitExceeded,
            52 => SizeLimitExceeded,
            53 => OperationLimitExceeded,
            100 => RequestTimeout,
            101 => ServerError,
            102 => ServiceUnavailable,
            103 => TableBusy,
            104 => SecurityInfoUnavailable,
            105 => RetryAuthentication,
            126 => IllegalState,
            1001 => InternalRetry,
            _ => UnknownError,
        }
    }

    /// User errors occupy codes 1-49: the caller did something the server
    /// will never accept no matter how many times it's retried.
    pub fn is_user_error(&self) -> bool {
        (*self as i32) < 50
    }

    /// Throttling occupies codes 50-99. The engine treats these as
    /// retryable but also folds them back into the rate limiter's current
    /// utilization so subsequent requests slow down locally.
    pub fn is_throttling(&self) -> bool {
        let v = *self as i32;
        (50..100).contains(&v)
    }

    pub fn is_read_throttling(&self) -> bool {
        matches!(self, NoSqlErrorCode::ReadLimitExceeded)
    }

    pub fn is_write_throttling(&self) -> bool {
        matches!(self, NoSqlErrorCode::WriteLimitExceeded)
    }

    /// Security metadata (auth tables, policies) hasn't propagated to the
    /// node handling the request yet. Retried aggressively for a short
    /// window before falling back to the caller's retry handler.
    pub fn is_security_info_unavailable(&self) -> bool {
        matches!(self, NoSqlErrorCode::SecurityInfoUnavailable)
    }

    pub fn is_retry_authentication(&self) -> bool {
        matches!(self, NoSqlErrorCode::RetryAuthentication)
    }

    pub fn is_invalid_authorization(&self) -> bool {
        matches!(self, NoSqlErrorCode::InvalidAuthorization)
    }

    /// Server-side errors in the 100-124 range that are safe to retry
    /// (transient overload, not a request-shape problem).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NoSqlErrorCode::ServerError
                | NoSqlErrorCode::ServiceUnavailable
                | NoSqlErrorCode::TableBusy
        ) || self.is_throttling()
            || self.is_security_info_unavailable()
            || self.is_retry_authentication()
    }
}

impl fmt::Display for NoSqlErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// An error returned by the service, carrying the protocol's numeric code
/// and whatever message text accompanied it.
#[derive(Debug, Clone)]
pub struct NoSqlError {
    pub code: NoSqlErrorCode,
    pub message: String,
}

impl NoSqlError {
    pub fn new(code: NoSqlErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn from_int(code: i32, message: impl Into<String>) -> Self {
        Self::new(NoSqlErrorCode::from_int(code), message)
    }

    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::new(NoSqlErrorCode::IllegalArgument, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for NoSqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for NoSqlError {}

/// Shorthand used throughout the driver crates.
pub type Result<T> = std::result::Result<T, NoSqlError>;

/// Raised when the per-request timeout budget is exhausted without a
/// successful response, across any number of attempts. Keeps the last
/// observed error as the source so the caller can still see why attempts
/// were failing.
#[derive(Debug, thiserror::Error)]
#[error("Request timed out after {timeout_ms}ms: {detail}")]
pub struct RequestTimeoutError {
    pub timeout_ms: u64,
    pub detail: String,
    #[source]
    pub last_error: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl RequestTimeoutError {
    pub fn new(timeout_ms: u64, detail: impl Into<String>) -> Self {
        Self {
            timeout_ms,
            detail: detail.into(),
            last_error: None,
        }
    }

    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.last_error = Some(Box::new(source));
        self
    }
}

/// The top-level error returned by the execution engine.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// A terminal, server-signalled (or caller-caused) error.
    #[error(transparent)]
    NoSql(#[from] NoSqlError),

    /// The request's timeout budget was exhausted.
    #[error(transparent)]
    Timeout(#[from] RequestTimeoutError),

    /// The underlying HTTP transport failed in a way that isn't modeled as
    /// a `NoSqlError` (connection refused, TLS failure, etc). These are
    /// always retried within the loop; seeing one escape means retries were
    /// exhausted or retrying was disallowed.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The background task driving this request was cancelled.
    #[error("request interrupted: {0}")]
    Interrupted(String),
}

impl ExecutionError {
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ExecutionError::NoSql(e) if e.code.is_throttling() => Some(Duration::from_millis(10)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_round_trips_through_wire_ints() {
        assert_eq!(NoSqlErrorCode::from_int(2), NoSqlErrorCode::TableNotFound);
        assert_eq!(NoSqlErrorCode::from_int(50), NoSqlErrorCode::ReadLimitExceeded);
        assert_eq!(NoSqlErrorCode::from_int(100), NoSqlErrorCode::RequestTimeout);
        assert_eq!(NoSqlErrorCode::from_int(9999), NoSqlErrorCode::UnknownError);
    }

    #[test]
    fn ranges_classify_correctly() {
        assert!(NoSqlErrorCode::IllegalArgument.is_user_error());
        assert!(!NoSqlErrorCode::IllegalArgument.is_throttling());
        assert!(NoSqlErrorCode::ReadLimitExceeded.is_throttling());
        assert!(NoSqlErrorCode::ReadLimitExceeded.is_read_throttling());
        assert!(NoSqlErrorCode::WriteLimitExceeded.is_write_throttling());
        assert!(NoSqlErrorCode::ServerError.is_retryable());
        assert!(!NoSqlErrorCode::TableNotFound.is_retryable());
    }

    #[test]
    fn timeout_error_preserves_source() {
        let inner = NoSqlError::new(NoSqlErrorCode::ServerError, "overloaded");
        let err = RequestTimeoutError::new(1000, "after 3 retries").with_source(inner);
        assert!(std::error::Error::source(&err).is_some());
    }

    const _: () = {
        const fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<ExecutionError>();
    };
}
