//! Integration coverage for the boundary scenarios named in the execution
//! engine's design (advanced-query continuations, throttling recovery, and
//! background limiter refresh single-flight). Scenarios already exercised
//! by `engine.rs`'s own unit tests (timeout-beats-retry, oversized-request)
//! aren't repeated here.

use async_trait::async_trait;
use nosql_driver::{
    AuthorizationProvider, Channel, ClientConfig, Engine, ExecutionError, HttpClient, HttpRequest,
    HttpResponse, ProxyConfig, QueryRequest, Request, ResponseBody, TransportError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct NoopAuth;

#[async_trait]
impl AuthorizationProvider for NoopAuth {
    async fn authorization_string(&self, _request: &dyn Request) -> Result<String, nosql_driver::NoSqlError> {
        Ok("Bearer test".to_string())
    }

    fn validate_auth_string(&self, _auth_string: &str) -> Result<(), nosql_driver::NoSqlError> {
        Ok(())
    }

    fn set_required_headers(
        &self,
        _auth_string: &str,
        _request: &dyn Request,
        _headers: &mut HashMap<String, String>,
    ) -> Result<(), nosql_driver::NoSqlError> {
        Ok(())
    }

    async fn close(&self) {}
}

fn test_config() -> ClientConfig {
    ClientConfig::builder()
        .service_url("http://localhost:8080")
        .auth_provider(Arc::new(NoopAuth))
        .build()
        .unwrap()
}

fn table_result_body(read_units: i64, write_units: i64) -> Vec<u8> {
    let mut body = vec![0u8];
    body.extend_from_slice(&read_units.to_be_bytes());
    body.extend_from_slice(&write_units.to_be_bytes());
    body
}

fn throttled_body(code: u8, message: &str) -> Vec<u8> {
    let mut body = vec![code];
    body.extend_from_slice(&(message.len() as u32).to_be_bytes());
    body.extend_from_slice(message.as_bytes());
    body
}

/// S2: a write-throttling response on the first call, a success on the
/// second. The retry should be transparent to the caller and the limiter's
/// forced utilization should be visible afterward.
struct ThrottleThenSucceed {
    calls: AtomicUsize,
}

#[async_trait]
impl HttpClient for ThrottleThenSucceed {
    async fn acquire_channel(&self, _timeout: Duration) -> Result<Channel, TransportError> {
        Ok(Channel { id: 1 })
    }

    async fn send(&self, _request: HttpRequest, _channel: Channel) -> Result<HttpResponse, TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == 0 {
            Ok(HttpResponse {
                status: 200,
                reason_phrase: "OK".to_string(),
                body: throttled_body(51, "write units exceeded"),
            })
        } else {
            Ok(HttpResponse {
                status: 200,
                reason_phrase: "OK".to_string(),
                body: table_result_body(16, 8),
            })
        }
    }

    fn max_content_length(&self) -> usize {
        1024 * 1024
    }

    async fn shutdown(&self) {}
}

#[tokio::test]
async fn throttled_write_retries_once_then_succeeds() {
    let transport = Arc::new(ThrottleThenSucceed {
        calls: AtomicUsize::new(0),
    });
    let engine = Engine::new(test_config(), transport.clone());

    // Pre-populate the limiter map so the engine attaches limiters to the
    // request and the throttling row of the classification table has
    // something to force to >= 100%.
    engine.limiter_map().update("t", 100, 100, 1.0);

    let mut request = nosql_driver::GetTableRequest::new("t");
    let result = engine.execute(&mut request).await.unwrap();
    match result {
        ResponseBody::Table(t) => {
            assert_eq!(t.limits.read_units, 16);
            assert_eq!(t.limits.write_units, 8);
        }
        _ => panic!("expected a table result"),
    }

    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    assert_eq!(request.retry_stats().num_retries, 1);
    assert!(engine.limiter_map().write_limiter("t").unwrap().current_rate() >= 100.0);
}

/// Prepared-and-not-simple queries take the pre-dispatch shortcut named in
/// the component design: the driver is bound before any network call, and a
/// second execution is a local no-op. Distinct from S3/S4 below, where the
/// driver is bound from a server response instead.
struct PanicsIfCalled;

#[async_trait]
impl HttpClient for PanicsIfCalled {
    async fn acquire_channel(&self, _timeout: Duration) -> Result<Channel, TransportError> {
        panic!("advanced-query pre-dispatch must never acquire a channel");
    }

    async fn send(&self, _request: HttpRequest, _channel: Channel) -> Result<HttpResponse, TransportError> {
        panic!("advanced-query pre-dispatch must never send a request");
    }

    fn max_content_length(&self) -> usize {
        1024
    }

    async fn configure_proxy(&self, _config: ProxyConfig) -> Result<(), TransportError> {
        Ok(())
    }

    async fn shutdown(&self) {}
}

#[tokio::test]
async fn advanced_query_binds_a_driver_without_any_network_call() {
    let engine = Engine::new(test_config(), Arc::new(PanicsIfCalled));
    let mut request = QueryRequest::new("select * from t")
        .prepared(true)
        .simple(false);

    let first = engine.execute(&mut request).await.unwrap();
    match first {
        ResponseBody::Query(q) => assert!(q.rows.is_empty()),
        _ => panic!("expected a query result"),
    }
    assert!(request.has_driver());

    let second = engine.execute(&mut request).await.unwrap();
    match second {
        ResponseBody::Query(q) => assert!(q.rows.is_empty()),
        _ => panic!("expected a query result"),
    }
}

/// S3/S4: a query that is neither prepared nor simple goes to the network
/// on its first execution; a response that binds a driver makes the second
/// execution a local no-op, same as the pre-dispatch shortcut above.
struct BindsDriverThenCounts {
    calls: AtomicUsize,
}

#[async_trait]
impl HttpClient for BindsDriverThenCounts {
    async fn acquire_channel(&self, _timeout: Duration) -> Result<Channel, TransportError> {
        Ok(Channel { id: 1 })
    }

    async fn send(&self, _request: HttpRequest, _channel: Channel) -> Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(HttpResponse {
            status: 200,
            reason_phrase: "OK".to_string(),
            // leading byte 0 is the status-code-0 success marker the codec
            // strips; the byte after it is the query wire format's
            // binds-driver marker.
            body: vec![0u8, 1u8],
        })
    }

    fn max_content_length(&self) -> usize {
        1024 * 1024
    }

    async fn shutdown(&self) {}
}

#[tokio::test]
async fn advanced_query_round_trip_binds_a_driver_then_is_a_local_noop() {
    let transport = Arc::new(BindsDriverThenCounts {
        calls: AtomicUsize::new(0),
    });
    let engine = Engine::new(test_config(), transport.clone());
    let mut request = QueryRequest::new("select * from t")
        .prepared(false)
        .simple(false);

    let first = engine.execute(&mut request).await.unwrap();
    let driver = match first {
        ResponseBody::Query(q) => q.driver.expect("response should bind a driver"),
        _ => panic!("expected a query result"),
    };
    assert!(request.has_driver());
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(
        &driver.engine().expect("driver's engine handle should still upgrade"),
        &engine,
    ));

    let second = engine.execute(&mut request).await.unwrap();
    match second {
        ResponseBody::Query(q) => assert!(q.rows.is_empty()),
        _ => panic!("expected a query result"),
    }
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
}

/// S5: concurrent callers against a table with no limiter entry should
/// trigger exactly one background `GetTable`, with the foreground calls
/// proceeding without waiting on it.
struct CountingGetTableTransport {
    get_table_calls: AtomicUsize,
}

#[async_trait]
impl HttpClient for CountingGetTableTransport {
    async fn acquire_channel(&self, _timeout: Duration) -> Result<Channel, TransportError> {
        Ok(Channel { id: 1 })
    }

    async fn send(&self, _request: HttpRequest, _channel: Channel) -> Result<HttpResponse, TransportError> {
        self.get_table_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(HttpResponse {
            status: 200,
            reason_phrase: "OK".to_string(),
            body: table_result_body(100, 100),
        })
    }

    fn max_content_length(&self) -> usize {
        1024 * 1024
    }

    async fn shutdown(&self) {}
}

#[tokio::test]
async fn background_refresh_is_single_flight_across_concurrent_callers() {
    let transport = Arc::new(CountingGetTableTransport {
        get_table_calls: AtomicUsize::new(0),
    });
    let engine = Engine::new(test_config(), transport.clone());

    // Drives `background_update_limiters` directly (as `resolve_limiters`
    // does for any read/write request against a table with no limiter
    // entry yet), rather than through a full `execute` whose own network
    // call would be indistinguishable from the GetTable refresh on the
    // same stub transport.
    let mut handles = Vec::new();
    for _ in 0..25 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let weak = Arc::downgrade(&engine);
            engine.limiter_map().background_update_limiters(&weak, "hot_table");
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Give the single background worker time to finish its one refresh.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.get_table_calls.load(Ordering::SeqCst), 1);
    assert!(engine.limiter_map().read_limiter("hot_table").is_some());
}

/// S7 at the integration level: a query with no explicit `max_read_kb`
/// picks up the clamp once a limiter is attached.
#[tokio::test]
async fn query_without_an_explicit_read_budget_is_clamped_on_dispatch() {
    struct RejectsQueryPayload;

    #[async_trait]
    impl HttpClient for RejectsQueryPayload {
        async fn acquire_channel(&self, _timeout: Duration) -> Result<Channel, TransportError> {
            Ok(Channel { id: 1 })
        }

        async fn send(&self, _request: HttpRequest, _channel: Channel) -> Result<HttpResponse, TransportError> {
            Ok(HttpResponse {
                status: 200,
                reason_phrase: "OK".to_string(),
                body: vec![0u8, 0u8],
            })
        }

        fn max_content_length(&self) -> usize {
            1024 * 1024
        }

        async fn shutdown(&self) {}
    }

    let engine = Engine::new(test_config(), Arc::new(RejectsQueryPayload));
    engine.limiter_map().update("t", 1, 1, 1.0);

    let mut request = QueryRequest::new("select * from t").simple(true);
    request.base_mut().table_name = Some("t".to_string());

    let result = engine.execute(&mut request).await;
    assert!(matches!(result, Ok(ResponseBody::Query(_)) | Err(ExecutionError::NoSql(_))));
    assert_eq!(request.max_read_kb, nosql_driver::READ_KB_FLOOR);
}
