//! Events emitted by a [`crate::RateLimiter`] as it admits or delays units.

use nosql_core::ExecutionEvent;
use std::time::{Duration, Instant};

/// Events emitted while consuming units from a rate limiter.
#[derive(Debug, Clone)]
pub enum RateLimiterEvent {
    /// Units were consumed without having to wait for refill.
    Consumed {
        pattern_name: String,
        timestamp: Instant,
        units: i64,
    },
    /// The caller waited for refill before units were consumed.
    Waited {
        pattern_name: String,
        timestamp: Instant,
        units: i64,
        wait: Duration,
    },
    /// The deadline elapsed before enough units refilled and
    /// `always_consume` was `false`, so nothing was charged.
    TimedOut {
        pattern_name: String,
        timestamp: Instant,
        units: i64,
        timeout: Duration,
    },
}

impl ExecutionEvent for RateLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RateLimiterEvent::Consumed { .. } => "Consumed",
            RateLimiterEvent::Waited { .. } => "Waited",
            RateLimiterEvent::TimedOut { .. } => "TimedOut",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RateLimiterEvent::Consumed { timestamp, .. }
            | RateLimiterEvent::Waited { timestamp, .. }
            | RateLimiterEvent::TimedOut { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            RateLimiterEvent::Consumed { pattern_name, .. }
            | RateLimiterEvent::Waited { pattern_name, .. }
            | RateLimiterEvent::TimedOut { pattern_name, .. } => pattern_name,
        }
    }
}
