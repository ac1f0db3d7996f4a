//! The execution engine: the retry-and-rate-limited request loop described
//! in the component design's central section.
//!
//! `Engine::execute` is reentrant by construction — no engine-wide lock is
//! held across the loop — because the background limiter refresh calls
//! back into it for `GetTableRequest` while a caller's own `execute` may
//! already be in flight.

use crate::codec::{classify_response, write_serial_version, Classified};
use crate::config::ClientConfig;
use crate::events::EngineEvent;
use crate::http::{Channel, HttpClient, HttpRequest};
use crate::limiter_map::RateLimiterMap;
use crate::query::{QueryDriver, QueryRequest};
use crate::request::Request;
use crate::result::ResponseBody;
use nosql_core::{EventListeners, ExecutionError, NoSqlError, RequestTimeoutError};
use nosql_timelimiter::Deadline;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::{Duration, Instant};
use tokio::time::sleep;

const NOSQL_DATA_PATH: &str = "/V2/nosql/data";
const TRANSPORT_COOLDOWN: Duration = Duration::from_millis(10);
const SECURITY_INFO_COOLDOWN: Duration = Duration::from_millis(100);
const SECURITY_INFO_FAST_RETRIES: u32 = 10;

static USER_AGENT: OnceLock<String> = OnceLock::new();

/// `"NoSQL-RustSDK/<version> (<os>/<arch>; tokio-<major>)"`, computed once
/// per process.
fn user_agent() -> &'static str {
    USER_AGENT.get_or_init(|| {
        format!(
            "NoSQL-RustSDK/{} ({}/{}; tokio-1)",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH,
        )
    })
}

enum LoopOutcome {
    Continue,
    Break,
}

/// Owns the HTTP client, the rate-limiter map, and per-client counters.
/// Construct with [`Engine::new`], which returns an `Arc` since query
/// continuations hold a weak reference back to it.
pub struct Engine {
    config: ClientConfig,
    http: Arc<dyn HttpClient>,
    limiter_map: Arc<RateLimiterMap>,
    next_request_id: AtomicU64,
    shutdown: AtomicBool,
    weak_self: Weak<Engine>,
    event_listeners: EventListeners<EngineEvent>,
}

impl Engine {
    pub fn new(config: ClientConfig, http: Arc<dyn HttpClient>) -> Arc<Self> {
        Self::with_event_listeners(config, http, EventListeners::new())
    }

    /// Same as [`Engine::new`], but with a caller-supplied set of
    /// [`EngineEvent`] listeners wired in from construction — `Arc<Engine>`
    /// offers no interior mutability for adding listeners afterward.
    pub fn with_event_listeners(
        config: ClientConfig,
        http: Arc<dyn HttpClient>,
        event_listeners: EventListeners<EngineEvent>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            config,
            http,
            limiter_map: RateLimiterMap::new(64),
            next_request_id: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
            weak_self: weak.clone(),
            event_listeners,
        })
    }

    pub fn limiter_map(&self) -> &Arc<RateLimiterMap> {
        &self.limiter_map
    }

    fn weak_handle(&self) -> Weak<Engine> {
        self.weak_self.clone()
    }

    fn next_request_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Idempotent shutdown: tears down the HTTP client and auth provider.
    /// In-flight `execute` calls see transport errors and terminate.
    pub async fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        self.http.shutdown().await;
        self.config.auth_provider.close().await;
    }

    /// Runs the full pre-dispatch-then-retry-loop described in the
    /// execution engine's component design for one request.
    pub async fn execute<R: Request>(&self, request: &mut R) -> Result<ResponseBody, ExecutionError> {
        request.set_defaults(&self.config);
        request.validate()?;

        if let Some(query) = request.as_any_mut().downcast_mut::<QueryRequest>() {
            if query.has_driver() {
                return Ok(ResponseBody::Query(crate::result::QueryResult::empty()));
            }
            if query.is_prepared && !query.is_simple_query {
                let driver = Arc::new(QueryDriver::new(self.weak_handle()));
                query.bind_driver(driver);
                return Ok(ResponseBody::Query(crate::result::QueryResult::empty()));
            }
        }

        *request.retry_stats_mut() = Default::default();

        self.resolve_limiters(request);

        if let Some(query) = request.as_any_mut().downcast_mut::<QueryRequest>() {
            if query.max_read_kb == 0 {
                if let Some(read_limiter) = request.read_limiter() {
                    query.clamp_max_read_kb(read_limiter.limit_per_second(), query.rate_limit_percent());
                }
            }
        }

        request.set_start_time(Instant::now());
        let start = request.start_time().expect("just set above");
        let timeout = request.timeout();
        let mut last_error: Option<ExecutionError> = None;

        loop {
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                break;
            }
            let mut iteration_timeout = timeout - elapsed;
            let attempt = request.retry_stats().num_retries;
            let table_label = request.table_name().unwrap_or("").to_string();

            self.event_listeners.emit(&EngineEvent::IterationStart {
                timestamp: Instant::now(),
                table: table_label.clone(),
                attempt,
            });
            #[cfg(feature = "tracing")]
            tracing::debug!(target: self.config.tracing_target, table = %table_label, attempt, "iteration start");

            if let Some(read_limiter) = request.read_limiter() {
                match read_limiter
                    .consume_units_with_timeout(0, iteration_timeout, false)
                    .await
                {
                    Ok(delay) => {
                        request.retry_stats_mut().add_delay(delay);
                        if !delay.is_zero() {
                            self.event_listeners.emit(&EngineEvent::LimiterWait {
                                timestamp: Instant::now(),
                                table: table_label.clone(),
                                direction: "read",
                                waited_ms: delay.as_millis() as u64,
                            });
                        }
                    }
                    Err(_) => {
                        last_error = Some(ExecutionError::NoSql(NoSqlError::new(
                            nosql_core::NoSqlErrorCode::RequestTimeout,
                            "timed out waiting on the read rate limiter",
                        )));
                        break;
                    }
                }
            }
            if let Some(write_limiter) = request.write_limiter() {
                match write_limiter
                    .consume_units_with_timeout(0, iteration_timeout, false)
                    .await
                {
                    Ok(delay) => {
                        request.retry_stats_mut().add_delay(delay);
                        if !delay.is_zero() {
                            self.event_listeners.emit(&EngineEvent::LimiterWait {
                                timestamp: Instant::now(),
                                table: table_label.clone(),
                                direction: "write",
                                waited_ms: delay.as_millis() as u64,
                            });
                        }
                    }
                    Err(_) => {
                        last_error = Some(ExecutionError::NoSql(NoSqlError::new(
                            nosql_core::NoSqlErrorCode::RequestTimeout,
                            "timed out waiting on the write rate limiter",
                        )));
                        break;
                    }
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                break;
            }
            iteration_timeout = timeout - elapsed;
            let deadline = Deadline::new(iteration_timeout);

            let auth_string = match self.config.auth_provider.authorization_string(&*request).await {
                Ok(s) => s,
                Err(err) => match self.handle_auth_failure(request, err).await {
                    Ok(LoopOutcome::Continue) => continue,
                    Ok(LoopOutcome::Break) => break,
                    Err(terminal) => return Err(terminal),
                },
            };
            if let Err(err) = self.config.auth_provider.validate_auth_string(&auth_string) {
                return Err(ExecutionError::NoSql(err));
            }

            let channel = match self.http.acquire_channel(iteration_timeout).await {
                Ok(channel) => channel,
                Err(transport_err) => {
                    request.retry_stats_mut().record("TransportError");
                    last_error = Some(ExecutionError::Transport(Box::new(transport_err)));
                    sleep(TRANSPORT_COOLDOWN).await;
                    continue;
                }
            };

            let mut body = Vec::new();
            write_serial_version(&mut body);
            if let Err(err) = request.serialize(&mut body) {
                self.http.release_channel(channel);
                return Err(ExecutionError::NoSql(err));
            }

            let max_len = self.config.max_content_length().min(self.http.max_content_length());
            if body.len() > max_len {
                self.http.release_channel(channel);
                return Err(ExecutionError::NoSql(NoSqlError::new(
                    nosql_core::NoSqlErrorCode::RequestSizeLimitExceeded,
                    format!("request of {} bytes exceeds the {} byte limit", body.len(), max_len),
                )));
            }

            let headers = match self.build_headers(request, &auth_string, body.len()) {
                Ok(h) => h,
                Err(err) => {
                    self.http.release_channel(channel);
                    return Err(ExecutionError::NoSql(err));
                }
            };

            let http_request = HttpRequest {
                method: "POST",
                path: NOSQL_DATA_PATH.to_string(),
                headers,
                body,
            };

            let send_result = deadline.bounded(self.http.send(http_request, channel)).await;
            let response = match send_result {
                Ok(Ok(response)) => response,
                Ok(Err(transport_err)) => {
                    request.retry_stats_mut().record("TransportError");
                    last_error = Some(ExecutionError::Transport(Box::new(transport_err)));
                    sleep(TRANSPORT_COOLDOWN).await;
                    continue;
                }
                Err(_elapsed) => break,
            };

            match classify_response(response.status, &response.body, &response.reason_phrase) {
                Classified::Success(payload) => {
                    if let Some(query) = request.as_any_mut().downcast_mut::<QueryRequest>() {
                        query.set_engine(self.weak_handle());
                    }
                    let mut body_result = match request.deserialize(&payload) {
                        Ok(r) => r,
                        Err(err) => return Err(ExecutionError::NoSql(err)),
                    };

                    if let (Some(limits), Some(table)) =
                        (body_result.table_limits(), request.table_name())
                    {
                        self.limiter_map.update(
                            table,
                            limits.read_units,
                            limits.write_units,
                            self.refresh_burst_horizon(),
                        );
                    }

                    let meta = body_result.into_meta_mut();
                    if let Some(read_limiter) = request.read_limiter() {
                        if let Ok(delay) = read_limiter
                            .consume_units_with_timeout(meta.read_units_used, iteration_timeout, true)
                            .await
                        {
                            meta.add_rate_delay(delay);
                        }
                    }
                    if let Some(write_limiter) = request.write_limiter() {
                        if let Ok(delay) = write_limiter
                            .consume_units_with_timeout(meta.write_units_used, iteration_timeout, true)
                            .await
                        {
                            meta.add_rate_delay(delay);
                        }
                    }
                    meta.retry_stats = request.retry_stats().clone();
                    return Ok(body_result);
                }
                Classified::Failure(error) => {
                    match self.classify_failure(request, error, &mut last_error).await {
                        Ok(LoopOutcome::Continue) => continue,
                        Ok(LoopOutcome::Break) => break,
                        Err(terminal) => return Err(terminal),
                    }
                }
            }
        }

        Err(ExecutionError::Timeout(
            RequestTimeoutError::new(
                timeout.as_millis() as u64,
                format!(
                    "after {} retries",
                    request.retry_stats().num_retries
                ),
            )
            .with_source(OpaqueLastError(last_error)),
        ))
    }

    fn resolve_limiters<R: Request>(&self, request: &mut R) {
        let Some(table) = request.table_name().map(str::to_string) else {
            return;
        };

        if request.read_limiter().is_none() {
            if let Some(limiter) = self.limiter_map.read_limiter(&table) {
                request.set_read_limiter(Some(limiter));
            } else if self.config.rate_limiting_enabled() && request.does_reads() {
                self.limiter_map.background_update_limiters(&self.weak_handle(), &table);
            }
        }
        if request.write_limiter().is_none() {
            if let Some(limiter) = self.limiter_map.write_limiter(&table) {
                request.set_write_limiter(Some(limiter));
            } else if self.config.rate_limiting_enabled() && request.does_writes() {
                self.limiter_map.background_update_limiters(&self.weak_handle(), &table);
            }
        }
    }

    fn refresh_burst_horizon(&self) -> f64 {
        std::env::var("NOSQL_TEST_RATE_LIMITER_DURATION_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30.0)
    }

    fn build_headers<R: Request>(
        &self,
        request: &R,
        auth_string: &str,
        content_length: usize,
    ) -> Result<HashMap<String, String>, NoSqlError> {
        let mut headers = HashMap::new();
        headers.insert("Host".to_string(), self.config.service_url().to_string());
        headers.insert(
            "Content-Type".to_string(),
            "application/octet-stream".to_string(),
        );
        headers.insert(
            "Accept".to_string(),
            "application/octet-stream".to_string(),
        );
        headers.insert("Connection".to_string(), "keep-alive".to_string());
        headers.insert("User-Agent".to_string(), user_agent().to_string());
        headers.insert(
            "x-nosql-request-id".to_string(),
            self.next_request_id().to_string(),
        );
        headers.insert("Content-Length".to_string(), content_length.to_string());
        self.config
            .auth_provider
            .set_required_headers(auth_string, request, &mut headers)?;
        Ok(headers)
    }

    /// Handles an `AuthenticationError` raised while obtaining the
    /// authorization string itself (as opposed to one signalled back by
    /// the server in a response).
    async fn handle_auth_failure<R: Request>(
        &self,
        request: &mut R,
        error: NoSqlError,
    ) -> Result<LoopOutcome, ExecutionError> {
        if self.config.auth_provider.is_cloud() {
            return Err(ExecutionError::NoSql(error));
        }
        request.retry_stats_mut().record("AuthenticationError");
        match self.config.auth_provider.bootstrap_login().await {
            Ok(()) => Ok(LoopOutcome::Continue),
            Err(_) => Err(ExecutionError::NoSql(error)),
        }
    }

    /// The exception classification table: decides continue/break/throw
    /// for a terminal-looking response and applies the side effects
    /// (limiter rate forcing, retry-handler consultation) each row names.
    async fn classify_failure<R: Request>(
        &self,
        request: &mut R,
        error: NoSqlError,
        last_error: &mut Option<ExecutionError>,
    ) -> Result<LoopOutcome, ExecutionError> {
        if error.code.is_invalid_authorization() || error.code.is_retry_authentication() {
            return self.handle_auth_failure(request, error).await;
        }

        if error.code.is_security_info_unavailable() {
            request.retry_stats_mut().record("SecurityInfoNotReadyError");
            let attempt = request.retry_stats().num_retries;
            if attempt <= SECURITY_INFO_FAST_RETRIES {
                sleep(SECURITY_INFO_COOLDOWN).await;
            } else {
                let should_retry = self
                    .config
                    .retry_handler
                    .do_retry(&*request, attempt, &error)
                    .await;
                if !should_retry {
                    return Err(ExecutionError::NoSql(error));
                }
                self.config.retry_handler.delay(&*request, attempt, &error).await;
            }
            *last_error = Some(ExecutionError::NoSql(error));
            return Ok(LoopOutcome::Continue);
        }

        if error.code.is_throttling() {
            let kind = if error.code.is_write_throttling() {
                "WriteThrottlingError"
            } else {
                "ReadThrottlingError"
            };
            request.retry_stats_mut().record(kind);
            if let Some(write_limiter) = request.write_limiter() {
                write_limiter.set_current_rate(write_limiter.current_rate().max(100.0));
            }
            if let Some(read_limiter) = request.read_limiter() {
                read_limiter.set_current_rate(read_limiter.current_rate().max(100.0));
            }
            return self.consult_retry_handler(request, error, last_error).await;
        }

        if error.code.is_retryable() {
            request.retry_stats_mut().record(error.code.to_string());
            return self.consult_retry_handler(request, error, last_error).await;
        }

        Err(ExecutionError::NoSql(error))
    }

    async fn consult_retry_handler<R: Request>(
        &self,
        request: &mut R,
        error: NoSqlError,
        last_error: &mut Option<ExecutionError>,
    ) -> Result<LoopOutcome, ExecutionError> {
        let attempt = request.retry_stats().num_retries;
        let should_retry = self
            .config
            .retry_handler
            .do_retry(&*request, attempt, &error)
            .await;
        *last_error = Some(ExecutionError::NoSql(error.clone()));
        if !should_retry {
            #[cfg(feature = "tracing")]
            tracing::warn!(target: self.config.tracing_target, %error, "retries exhausted");
            return Err(ExecutionError::NoSql(error));
        }
        self.event_listeners.emit(&EngineEvent::Retry {
            timestamp: Instant::now(),
            table: request.table_name().unwrap_or("").to_string(),
            attempt,
            reason: error.code.to_string(),
        });
        #[cfg(feature = "tracing")]
        tracing::warn!(target: self.config.tracing_target, attempt, %error, "retrying request");
        self.config.retry_handler.delay(&*request, attempt, &error).await;
        Ok(LoopOutcome::Continue)
    }
}

/// Wraps whatever the loop last observed so `RequestTimeoutError::source`
/// still points at a real cause even when it was an `ExecutionError`
/// rather than a bare `NoSqlError`.
#[derive(Debug)]
struct OpaqueLastError(Option<ExecutionError>);

impl std::fmt::Display for OpaqueLastError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(err) => write!(f, "{err}"),
            None => write!(f, "no attempt completed"),
        }
    }
}

impl std::error::Error for OpaqueLastError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}
