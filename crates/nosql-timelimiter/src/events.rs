use nosql_core::ExecutionEvent;
use std::time::{Duration, Instant};

/// Events emitted by [`crate::Deadline::bounded`].
#[derive(Debug, Clone)]
pub enum TimeLimiterEvent {
    /// The wrapped future resolved before the deadline.
    Completed {
        pattern_name: String,
        timestamp: Instant,
        duration: Duration,
    },
    /// The deadline elapsed before the wrapped future resolved.
    TimedOut {
        pattern_name: String,
        timestamp: Instant,
        timeout: Duration,
    },
}

impl ExecutionEvent for TimeLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TimeLimiterEvent::Completed { .. } => "Completed",
            TimeLimiterEvent::TimedOut { .. } => "TimedOut",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            TimeLimiterEvent::Completed { timestamp, .. }
            | TimeLimiterEvent::TimedOut { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            TimeLimiterEvent::Completed { pattern_name, .. }
            | TimeLimiterEvent::TimedOut { pattern_name, .. } => pattern_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_types() {
        let now = Instant::now();
        let completed = TimeLimiterEvent::Completed {
            pattern_name: "t".into(),
            timestamp: now,
            duration: Duration::from_millis(5),
        };
        assert_eq!(completed.event_type(), "Completed");

        let timed_out = TimeLimiterEvent::TimedOut {
            pattern_name: "t".into(),
            timestamp: now,
            timeout: Duration::from_millis(5),
        };
        assert_eq!(timed_out.event_type(), "TimedOut");
    }
}
