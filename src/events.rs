//! Execution-time observability events.
//!
//! Mirrors the `ExecutionEvent` pattern used by the sibling resilience
//! crates (see `nosql_retry::events::RetryEvent`,
//! `nosql_timelimiter::events::TimeLimiterEvent`): a plain enum callers can
//! subscribe to via [`nosql_core::EventListeners`] without depending on a
//! `tracing` subscriber.

use nosql_core::ExecutionEvent;
use std::time::Instant;

/// Events emitted by the execution engine at its main seams.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A new loop iteration is starting for a request.
    IterationStart {
        timestamp: Instant,
        table: String,
        attempt: u32,
    },
    /// A rate limiter blocked the request for some duration.
    LimiterWait {
        timestamp: Instant,
        table: String,
        direction: &'static str,
        waited_ms: u64,
    },
    /// The retry handler was consulted and chose to retry.
    Retry {
        timestamp: Instant,
        table: String,
        attempt: u32,
        reason: String,
    },
    /// A background table-limits refresh completed.
    BackgroundRefresh {
        timestamp: Instant,
        table: String,
        succeeded: bool,
    },
}

impl ExecutionEvent for EngineEvent {
    fn event_type(&self) -> &'static str {
        match self {
            EngineEvent::IterationStart { .. } => "IterationStart",
            EngineEvent::LimiterWait { .. } => "LimiterWait",
            EngineEvent::Retry { .. } => "Retry",
            EngineEvent::BackgroundRefresh { .. } => "BackgroundRefresh",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            EngineEvent::IterationStart { timestamp, .. }
            | EngineEvent::LimiterWait { timestamp, .. }
            | EngineEvent::Retry { timestamp, .. }
            | EngineEvent::BackgroundRefresh { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            EngineEvent::IterationStart { table, .. }
            | EngineEvent::LimiterWait { table, .. }
            | EngineEvent::Retry { table, .. }
            | EngineEvent::BackgroundRefresh { table, .. } => table,
        }
    }
}
