//! The per-table rate-limiter map and its background refresh protocol.
//!
//! Entries are created lazily: the first request against a table that
//! reads or writes but has no limiters yet schedules a background
//! `GetTable` off the caller's critical path, via the dedicated
//! single-thread worker in [`nosql_executor::worker::RefreshWorker`].
//! Marking a table's next-refresh-at deadline *before* submitting the task
//! is itself the single-flight guard: a concurrent caller's
//! `table_needs_refresh` check sees the deadline pushed out and skips.

use crate::engine::Engine;
use crate::request::{GetTableRequest, Request};
use crate::result::ResponseBody;
use nosql_executor::worker::RefreshWorker;
use nosql_ratelimiter::RateLimiter;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

/// How long a successful background refresh holds off the next one.
const LIMITER_REFRESH_PERIOD: Duration = Duration::from_secs(10 * 60);

/// How soon a failed refresh is allowed to retry.
const LIMITER_REFRESH_RETRY: Duration = Duration::from_millis(100);

fn burst_horizon_seconds() -> f64 {
    std::env::var("NOSQL_TEST_RATE_LIMITER_DURATION_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(30.0)
}

struct LimiterEntry {
    read: Arc<RateLimiter>,
    write: Arc<RateLimiter>,
}

pub struct RateLimiterMap {
    entries: Mutex<HashMap<String, LimiterEntry>>,
    refresh_clock: Mutex<HashMap<String, Instant>>,
    worker: RefreshWorker,
    duration_seconds: f64,
    weak_self: Weak<RateLimiterMap>,
}

impl RateLimiterMap {
    /// Builds the map behind an `Arc`, since `background_update_limiters`
    /// needs to hand a clone of itself to a task it does not otherwise
    /// own (only `&self`, never `self: Arc<Self>`, is required of
    /// callers).
    pub fn new(worker_queue_capacity: usize) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            entries: Mutex::new(HashMap::new()),
            refresh_clock: Mutex::new(HashMap::new()),
            worker: RefreshWorker::new(worker_queue_capacity),
            duration_seconds: burst_horizon_seconds(),
            weak_self: weak.clone(),
        })
    }

    pub fn read_limiter(&self, table: &str) -> Option<Arc<RateLimiter>> {
        self.entries.lock().unwrap().get(table).map(|e| e.read.clone())
    }

    pub fn write_limiter(&self, table: &str) -> Option<Arc<RateLimiter>> {
        self.entries.lock().unwrap().get(table).map(|e| e.write.clone())
    }

    /// Creates or replaces the entry for `table`. A limiter's current
    /// utilization percentage carries over into its replacement so a
    /// capacity change doesn't reset backpressure state. Units `<= 0` for
    /// both directions removes the entry instead.
    pub fn update(&self, table: &str, read_units: i64, write_units: i64, duration_seconds: f64) {
        let mut entries = self.entries.lock().unwrap();
        if read_units <= 0 && write_units <= 0 {
            entries.remove(table);
            return;
        }

        let prior_read_rate = entries.get(table).map(|e| e.read.current_rate());
        let prior_write_rate = entries.get(table).map(|e| e.write.current_rate());

        let read = Arc::new(
            RateLimiter::builder()
                .limit_per_second(read_units.max(0) as f64)
                .duration_seconds(duration_seconds)
                .name(format!("{table}-read"))
                .build(),
        );
        let write = Arc::new(
            RateLimiter::builder()
                .limit_per_second(write_units.max(0) as f64)
                .duration_seconds(duration_seconds)
                .name(format!("{table}-write"))
                .build(),
        );
        if let Some(rate) = prior_read_rate {
            read.set_current_rate(rate);
        }
        if let Some(rate) = prior_write_rate {
            write.set_current_rate(rate);
        }

        entries.insert(table.to_string(), LimiterEntry { read, write });
    }

    pub fn remove(&self, table: &str) {
        self.entries.lock().unwrap().remove(table);
        self.refresh_clock.lock().unwrap().remove(table);
    }

    pub fn reset(&self, table: &str) {
        if let Some(entry) = self.entries.lock().unwrap().get(table) {
            entry.read.set_current_rate(0.0);
            entry.write.set_current_rate(0.0);
        }
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
        self.refresh_clock.lock().unwrap().clear();
    }

    fn table_needs_refresh(&self, table: &str) -> bool {
        match self.refresh_clock.lock().unwrap().get(table) {
            Some(at) => Instant::now() >= *at,
            None => true,
        }
    }

    /// Schedules (or skips) a background `GetTable` for `table`. Reentrant
    /// with respect to `engine`: the submitted task calls back into
    /// `Engine::execute`, which must not hold any engine-wide lock across
    /// its own loop.
    pub fn background_update_limiters(&self, engine: &Weak<Engine>, table: &str) {
        if !self.table_needs_refresh(table) {
            return;
        }
        self.refresh_clock
            .lock()
            .unwrap()
            .insert(table.to_string(), Instant::now() + LIMITER_REFRESH_PERIOD);

        let Some(map) = self.weak_self.upgrade() else {
            return;
        };
        let engine = engine.clone();
        let table_owned = table.to_string();
        let fallback_table = table_owned.clone();
        let duration_seconds = self.duration_seconds;

        let submitted = self.worker.try_submit(async move {
            let Some(engine) = engine.upgrade() else {
                return;
            };
            let mut request = GetTableRequest::new(table_owned.clone());
            let outcome = engine.execute(&mut request).await;
            match outcome {
                Ok(ResponseBody::Table(result)) => {
                    #[cfg(feature = "tracing")]
                    tracing::info!(table = %table_owned, "background limiter refresh succeeded");
                    map.update(
                        &table_owned,
                        result.limits.read_units,
                        result.limits.write_units,
                        duration_seconds,
                    );
                }
                _ => {
                    #[cfg(feature = "tracing")]
                    tracing::info!(table = %table_owned, "background limiter refresh failed, retrying soon");
                    map.refresh_clock
                        .lock()
                        .unwrap()
                        .insert(table_owned, Instant::now() + LIMITER_REFRESH_RETRY);
                }
            }
        });

        if submitted.is_err() {
            // Queue full: give up on this attempt and let the next
            // foreground call that sees the table retry.
            self.refresh_clock
                .lock()
                .unwrap()
                .insert(fallback_table, Instant::now());
        }
    }
}
