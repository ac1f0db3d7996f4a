//! Error types for the driver crate.
//!
//! The wire error-code table and the engine-level failure types live in
//! `nosql-core` so the resilience crates can depend on them without
//! depending on this crate; re-exported here for callers of `nosql-driver`.

pub use nosql_core::{ExecutionError, NoSqlError, NoSqlErrorCode, RequestTimeoutError, Result};
