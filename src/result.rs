//! Result types returned by `Engine::execute`.

use crate::query::QueryDriver;
use crate::request::{RetryStats, TableLimits};
use std::sync::Arc;
use std::time::Duration;

/// Fields common to every successful result.
#[derive(Debug, Clone, Default)]
pub struct ResultMeta {
    pub read_units_used: i64,
    pub write_units_used: i64,
    pub rate_limit_delayed_ms: u64,
    pub retry_stats: RetryStats,
}

/// Generic operation result (put/get/delete and similar single-row ops).
#[derive(Debug, Clone, Default)]
pub struct OpResult {
    pub meta: ResultMeta,
    pub value: Option<Vec<u8>>,
}

/// Result of a `GetTableRequest`/DDL operation: carries the table's current
/// provisioned throughput alongside the generic result fields.
#[derive(Debug, Clone, Default)]
pub struct TableResult {
    pub meta: ResultMeta,
    pub limits: TableLimits,
}

/// Result of a query execution. Empty (`rows` is empty, `driver` unset or
/// already exhausted) for the pre-dispatch fast paths described in the
/// query continuation state machine.
#[derive(Clone, Default)]
pub struct QueryResult {
    pub meta: ResultMeta,
    pub rows: Vec<Vec<u8>>,
    pub driver: Option<Arc<QueryDriver>>,
}

impl std::fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResult")
            .field("rows", &self.rows.len())
            .field("has_driver", &self.driver.is_some())
            .finish()
    }
}

impl QueryResult {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// The decoded body of a successful (status-code-0) response, produced by
/// a request's `deserialize`. The engine matches on this to decide whether
/// `update_rate_limiters` applies and to assemble the final typed result.
#[derive(Debug, Clone)]
pub enum ResponseBody {
    Op(OpResult),
    Table(TableResult),
    Query(QueryResult),
}

impl ResponseBody {
    pub fn table_limits(&self) -> Option<TableLimits> {
        match self {
            ResponseBody::Table(t) => Some(t.limits),
            _ => None,
        }
    }

    pub fn into_meta_mut(&mut self) -> &mut ResultMeta {
        match self {
            ResponseBody::Op(r) => &mut r.meta,
            ResponseBody::Table(r) => &mut r.meta,
            ResponseBody::Query(r) => &mut r.meta,
        }
    }
}

impl ResultMeta {
    pub fn add_rate_delay(&mut self, delay: Duration) {
        self.rate_limit_delayed_ms += delay.as_millis() as u64;
    }
}
