//! Request shapes and the common accounting every request kind carries.
//!
//! Concrete request types (`GetTableRequest`, and whatever put/get/query
//! types a full driver adds) hold a [`RequestBase`] and implement
//! [`Request`] by delegating the shared bookkeeping to it; only
//! `does_reads`/`does_writes`/`serialize`/`deserialize` are type-specific.

use crate::config::ClientConfig;
use crate::result::ResponseBody;
use nosql_core::NoSqlError;
use nosql_ratelimiter::RateLimiter;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Current provisioned throughput for a table, as last reported by the
/// server in a `TableResult`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TableLimits {
    pub read_units: i64,
    pub write_units: i64,
}

/// Per-request retry bookkeeping, copied into the result on success and
/// reported in `RequestTimeoutError`'s message on exhaustion.
#[derive(Debug, Clone, Default)]
pub struct RetryStats {
    pub num_retries: u32,
    pub retry_exceptions: std::collections::HashMap<String, u32>,
    pub retry_delay_ms: u64,
}

impl RetryStats {
    pub fn record(&mut self, error_kind: impl Into<String>) {
        self.num_retries += 1;
        *self.retry_exceptions.entry(error_kind.into()).or_insert(0) += 1;
    }

    pub fn add_delay(&mut self, delay: Duration) {
        self.retry_delay_ms += delay.as_millis() as u64;
    }
}

/// Fields shared by every request kind.
pub struct RequestBase {
    pub table_name: Option<String>,
    pub timeout: Duration,
    pub compartment: Option<String>,
    /// 0 means "use the configured default"; otherwise 1..=100.
    pub rate_limit_percent: f64,
    pub read_limiter: Option<Arc<RateLimiter>>,
    pub write_limiter: Option<Arc<RateLimiter>>,
    pub retry_stats: RetryStats,
    pub start_time: Option<Instant>,
}

impl Default for RequestBase {
    fn default() -> Self {
        Self {
            table_name: None,
            timeout: Duration::ZERO,
            compartment: None,
            rate_limit_percent: 0.0,
            read_limiter: None,
            write_limiter: None,
            retry_stats: RetryStats::default(),
            start_time: None,
        }
    }
}

fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Common contract every request type implements, per the collaborator
/// list the execution engine drives requests through.
pub trait Request: Send + Sync {
    fn base(&self) -> &RequestBase;
    fn base_mut(&mut self) -> &mut RequestBase;

    fn is_query_request(&self) -> bool {
        false
    }

    fn does_reads(&self) -> bool;
    fn does_writes(&self) -> bool;

    fn set_defaults(&mut self, config: &ClientConfig) {
        let base = self.base_mut();
        if base.timeout.is_zero() {
            base.timeout = Duration::from_secs(5);
        }
        if base.rate_limit_percent == 0.0 {
            base.rate_limit_percent = config.default_rate_limiter_percent();
        }
        if base.compartment.is_none() {
            base.compartment = config.default_compartment.clone();
        }
    }

    fn validate(&self) -> Result<(), NoSqlError> {
        let base = self.base();
        if base.timeout.is_zero() {
            return Err(NoSqlError::illegal_argument("timeout must be greater than zero"));
        }
        if let Some(name) = &base.table_name {
            if name.is_empty() {
                return Err(NoSqlError::illegal_argument("table name must not be empty"));
            }
            if !is_valid_identifier(name) {
                return Err(NoSqlError::illegal_argument(format!(
                    "'{name}' is not a valid table name"
                )));
            }
        }
        if base.rate_limit_percent != 0.0 && !(1.0..=100.0).contains(&base.rate_limit_percent) {
            return Err(NoSqlError::illegal_argument(
                "rate limiter percent must be 0 or in [1, 100]",
            ));
        }
        Ok(())
    }

    fn table_name(&self) -> Option<&str> {
        self.base().table_name.as_deref()
    }

    fn timeout(&self) -> Duration {
        self.base().timeout
    }

    fn compartment(&self) -> Option<&str> {
        self.base().compartment.as_deref()
    }

    fn rate_limit_percent(&self) -> f64 {
        self.base().rate_limit_percent
    }

    fn read_limiter(&self) -> Option<Arc<RateLimiter>> {
        self.base().read_limiter.clone()
    }

    fn write_limiter(&self) -> Option<Arc<RateLimiter>> {
        self.base().write_limiter.clone()
    }

    fn set_read_limiter(&mut self, limiter: Option<Arc<RateLimiter>>) {
        self.base_mut().read_limiter = limiter;
    }

    fn set_write_limiter(&mut self, limiter: Option<Arc<RateLimiter>>) {
        self.base_mut().write_limiter = limiter;
    }

    fn retry_stats(&self) -> &RetryStats {
        &self.base().retry_stats
    }

    fn retry_stats_mut(&mut self) -> &mut RetryStats {
        &mut self.base_mut().retry_stats
    }

    fn start_time(&self) -> Option<Instant> {
        self.base().start_time
    }

    fn set_start_time(&mut self, at: Instant) {
        self.base_mut().start_time = Some(at);
    }

    /// Appends this request's operation-specific payload after the serial
    /// version header the engine already wrote.
    fn serialize(&self, out: &mut Vec<u8>) -> Result<(), NoSqlError>;

    /// Decodes a successful (status-code-0) response body.
    fn deserialize(&mut self, body: &[u8]) -> Result<ResponseBody, NoSqlError>;

    /// Lets the engine downcast a `&mut dyn Request` back to its concrete
    /// type for the query pre-dispatch special case. Implementations
    /// should simply return `self`.
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

/// Fetches a table's current limits and metadata. Used both by callers and
/// internally by the background limiter-refresh worker.
pub struct GetTableRequest {
    base: RequestBase,
}

impl GetTableRequest {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            base: RequestBase {
                table_name: Some(table_name.into()),
                timeout: Duration::from_millis(1000),
                ..RequestBase::default()
            },
        }
    }
}

impl Request for GetTableRequest {
    fn base(&self) -> &RequestBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RequestBase {
        &mut self.base
    }

    fn does_reads(&self) -> bool {
        false
    }

    fn does_writes(&self) -> bool {
        false
    }

    fn serialize(&self, out: &mut Vec<u8>) -> Result<(), NoSqlError> {
        out.push(b'T');
        let name = self.base.table_name.as_deref().unwrap_or_default();
        out.extend_from_slice(&(name.len() as u32).to_be_bytes());
        out.extend_from_slice(name.as_bytes());
        Ok(())
    }

    fn deserialize(&mut self, body: &[u8]) -> Result<ResponseBody, NoSqlError> {
        if body.len() < 16 {
            return Err(NoSqlError::illegal_argument("truncated GetTable response"));
        }
        let read_units = i64::from_be_bytes(body[0..8].try_into().unwrap());
        let write_units = i64::from_be_bytes(body[8..16].try_into().unwrap());
        Ok(ResponseBody::Table(crate::result::TableResult {
            limits: TableLimits {
                read_units,
                write_units,
            },
            ..Default::default()
        }))
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
