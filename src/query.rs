//! Query requests and the advanced-query continuation state machine.
//!
//! An advanced query that is prepared but not simple binds a
//! [`QueryDriver`] on its first execution; every subsequent call to
//! `execute` on that same request is a local no-op that never reaches the
//! network (see the pre-dispatch sequence). The driver holds only a weak
//! reference back to the engine so the engine never retains a driver and
//! the two can't form a reference cycle.

use crate::engine::Engine;
use crate::request::{Request, RequestBase, TableLimits};
use crate::result::{QueryResult, ResponseBody};
use nosql_core::NoSqlError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Ceiling applied when clamping `max_read_kb` for queries that didn't
/// request an explicit limit (see the pre-dispatch clamp rule).
pub const READ_KB_LIMIT: u32 = 2048;

/// Floor applied by the same clamp rule, so a starved limiter never zeroes
/// out a query's read budget entirely.
pub const READ_KB_FLOOR: u32 = 10;

/// Server-side continuation for an in-progress advanced query. Bound into
/// a `QueryRequest` once the server has compiled the query plan; re-used
/// by the driver to resume work without re-sending the statement.
pub struct QueryDriver {
    engine: Weak<Engine>,
    topology_seq: AtomicU64,
}

impl QueryDriver {
    pub fn new(engine: Weak<Engine>) -> Self {
        Self {
            engine,
            topology_seq: AtomicU64::new(0),
        }
    }

    /// Upgrades the weak back-reference. `None` once the engine has been
    /// dropped, at which point the driver can no longer make progress.
    pub fn engine(&self) -> Option<Arc<Engine>> {
        self.engine.upgrade()
    }

    pub fn topology_seq(&self) -> u64 {
        self.topology_seq.load(Ordering::Acquire)
    }

    pub fn set_topology_seq(&self, seq: u64) {
        self.topology_seq.store(seq, Ordering::Release);
    }
}

pub struct QueryRequest {
    base: RequestBase,
    pub statement: String,
    pub is_prepared: bool,
    pub is_simple_query: bool,
    pub max_read_kb: u32,
    driver: Option<Arc<QueryDriver>>,
    engine: Weak<Engine>,
}

impl QueryRequest {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            base: RequestBase::default(),
            statement: statement.into(),
            is_prepared: false,
            is_simple_query: true,
            max_read_kb: 0,
            driver: None,
            engine: Weak::new(),
        }
    }

    pub fn prepared(mut self, prepared: bool) -> Self {
        self.is_prepared = prepared;
        self
    }

    pub fn simple(mut self, simple: bool) -> Self {
        self.is_simple_query = simple;
        self
    }

    pub fn max_read_kb(mut self, kb: u32) -> Self {
        self.max_read_kb = kb;
        self
    }

    /// True once a prior execution bound a continuation driver; re-running
    /// `execute` on a request in this state is a local no-op.
    pub fn has_driver(&self) -> bool {
        self.driver.is_some()
    }

    pub fn driver(&self) -> Option<&Arc<QueryDriver>> {
        self.driver.as_ref()
    }

    pub fn bind_driver(&mut self, driver: Arc<QueryDriver>) {
        self.driver = Some(driver);
    }

    /// Lets the engine hand this request a back-reference to itself before
    /// dispatch, so `deserialize` can bind a [`QueryDriver`] of its own if
    /// the server's response calls for one.
    pub(crate) fn set_engine(&mut self, engine: Weak<Engine>) {
        self.engine = engine;
    }

    /// Clamps `max_read_kb` against the per-query share of the read
    /// limiter's budget when the caller didn't pick an explicit value.
    pub fn clamp_max_read_kb(&mut self, limit_per_second: f64, percent: f64) {
        if self.max_read_kb != 0 {
            return;
        }
        let share = (percent * limit_per_second) / 100.0;
        let clamped = share.clamp(READ_KB_FLOOR as f64, READ_KB_LIMIT as f64);
        self.max_read_kb = clamped as u32;
    }
}

impl Request for QueryRequest {
    fn base(&self) -> &RequestBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RequestBase {
        &mut self.base
    }

    fn is_query_request(&self) -> bool {
        true
    }

    fn does_reads(&self) -> bool {
        true
    }

    fn does_writes(&self) -> bool {
        false
    }

    fn serialize(&self, out: &mut Vec<u8>) -> Result<(), NoSqlError> {
        out.push(b'Q');
        out.push(self.is_prepared as u8);
        out.push(self.is_simple_query as u8);
        out.extend_from_slice(&self.max_read_kb.to_be_bytes());
        out.extend_from_slice(&(self.statement.len() as u32).to_be_bytes());
        out.extend_from_slice(self.statement.as_bytes());
        Ok(())
    }

    fn deserialize(&mut self, body: &[u8]) -> Result<ResponseBody, NoSqlError> {
        if body.is_empty() {
            return Ok(ResponseBody::Query(QueryResult::empty()));
        }
        // A single marker byte is enough for this driver's wire contract:
        // non-zero means the server wants a continuation bound.
        let binds_driver = body[0] != 0;
        let mut result = QueryResult::empty();
        if binds_driver {
            let driver = match &self.driver {
                Some(existing) => existing.clone(),
                None => {
                    let driver = Arc::new(QueryDriver::new(self.engine.clone()));
                    self.driver = Some(driver.clone());
                    driver
                }
            };
            result.driver = Some(driver);
        }
        let _ = TableLimits::default();
        Ok(ResponseBody::Query(result))
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_floors_at_ten_for_a_slow_limiter() {
        let mut req = QueryRequest::new("select * from t");
        req.clamp_max_read_kb(1.0, 100.0);
        assert_eq!(req.max_read_kb, READ_KB_FLOOR);
    }

    #[test]
    fn clamp_ceils_at_read_kb_limit_for_a_fast_limiter() {
        let mut req = QueryRequest::new("select * from t");
        req.clamp_max_read_kb(50_000.0, 100.0);
        assert_eq!(req.max_read_kb, READ_KB_LIMIT);
    }

    #[test]
    fn clamp_is_a_no_op_once_the_caller_set_a_value() {
        let mut req = QueryRequest::new("select * from t").max_read_kb(77);
        req.clamp_max_read_kb(1.0, 100.0);
        assert_eq!(req.max_read_kb, 77);
    }

    #[test]
    fn fresh_request_has_no_driver() {
        let req = QueryRequest::new("select * from t");
        assert!(!req.has_driver());
    }

    #[test]
    fn deserialize_binds_a_new_driver_when_the_response_asks_for_one() {
        let mut req = QueryRequest::new("select * from t");
        assert!(!req.has_driver());
        let result = req.deserialize(&[1u8]).unwrap();
        match result {
            ResponseBody::Query(q) => assert!(q.driver.is_some()),
            _ => panic!("expected a query result"),
        }
        assert!(req.has_driver());
    }

    #[test]
    fn deserialize_reuses_an_already_bound_driver() {
        let mut req = QueryRequest::new("select * from t");
        let driver = Arc::new(QueryDriver::new(Weak::new()));
        req.bind_driver(driver.clone());
        let result = req.deserialize(&[1u8]).unwrap();
        match result {
            ResponseBody::Query(q) => assert!(Arc::ptr_eq(&q.driver.unwrap(), &driver)),
            _ => panic!("expected a query result"),
        }
    }
}
