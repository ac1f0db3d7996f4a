//! Client configuration.
//!
//! `ClientConfig` / `ClientConfigBuilder` follows the same builder idiom
//! used throughout this crate family (compare
//! [`nosql_ratelimiter::RateLimiterConfigBuilder`],
//! [`nosql_retry::RetryHandlerConfigBuilder`]): a builder with chainable
//! setters and sensible defaults, finished by `.build()`. Fields the
//! server contract requires but the caller left unset produce an
//! `IllegalArgumentError` rather than a panic.

use crate::auth::AuthorizationProvider;
use crate::request::Request;
use nosql_core::NoSqlError;
use nosql_retry::{DefaultRetryHandler, RetryHandler, RetryHandlerConfigBuilder};
use std::sync::Arc;
use std::time::Duration;

/// Opaque handle for whatever TLS context the caller's `HttpClient`
/// implementation needs; the engine never inspects it.
#[derive(Clone, Default)]
pub struct TlsContext(pub(crate) Arc<dyn std::any::Any + Send + Sync>);

impl TlsContext {
    pub fn new<T: std::any::Any + Send + Sync + 'static>(inner: T) -> Self {
        Self(Arc::new(inner))
    }

    pub fn downcast_ref<T: std::any::Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

/// Client-side driver configuration, read once at `Engine` construction.
pub struct ClientConfig {
    pub(crate) service_url: String,
    pub(crate) is_secure: bool,
    pub(crate) tls_context: Option<TlsContext>,
    pub(crate) thread_count: usize,
    pub(crate) connection_pool_size: usize,
    pub(crate) max_pending: usize,
    pub(crate) max_content_length: usize,
    pub(crate) max_chunk_size: usize,
    pub(crate) proxy: Option<(String, u16)>,
    pub(crate) auth_provider: Arc<dyn AuthorizationProvider>,
    pub(crate) rate_limiting_enabled: bool,
    pub(crate) default_rate_limiter_percent: f64,
    pub(crate) default_compartment: Option<String>,
    pub(crate) retry_handler: Arc<dyn RetryHandler<dyn Request>>,
    pub(crate) tracing_target: &'static str,
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    pub fn is_secure(&self) -> bool {
        self.is_secure
    }

    pub fn max_content_length(&self) -> usize {
        self.max_content_length
    }

    pub fn rate_limiting_enabled(&self) -> bool {
        self.rate_limiting_enabled
    }

    pub fn default_rate_limiter_percent(&self) -> f64 {
        self.default_rate_limiter_percent
    }
}

/// Builder for [`ClientConfig`].
pub struct ClientConfigBuilder {
    service_url: Option<String>,
    tls_context: Option<TlsContext>,
    thread_count: usize,
    connection_pool_size: usize,
    max_pending: usize,
    max_content_length: usize,
    max_chunk_size: usize,
    proxy: Option<(String, u16)>,
    auth_provider: Option<Arc<dyn AuthorizationProvider>>,
    rate_limiting_enabled: bool,
    default_rate_limiter_percent: f64,
    default_compartment: Option<String>,
    retry_handler: Option<Arc<dyn RetryHandler<dyn Request>>>,
    tracing_target: &'static str,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            service_url: None,
            tls_context: None,
            thread_count: 4,
            connection_pool_size: 16,
            max_pending: 64,
            max_content_length: 2 * 1024 * 1024,
            max_chunk_size: 64 * 1024,
            proxy: None,
            auth_provider: None,
            rate_limiting_enabled: true,
            default_rate_limiter_percent: 100.0,
            default_compartment: None,
            retry_handler: None,
            tracing_target: "nosql_driver",
        }
    }

    pub fn service_url(mut self, url: impl Into<String>) -> Self {
        self.service_url = Some(url.into());
        self
    }

    pub fn tls_context(mut self, context: TlsContext) -> Self {
        self.tls_context = Some(context);
        self
    }

    pub fn thread_count(mut self, n: usize) -> Self {
        self.thread_count = n;
        self
    }

    pub fn connection_pool_size(mut self, n: usize) -> Self {
        self.connection_pool_size = n;
        self
    }

    pub fn max_pending(mut self, n: usize) -> Self {
        self.max_pending = n;
        self
    }

    pub fn max_content_length(mut self, n: usize) -> Self {
        self.max_content_length = n;
        self
    }

    pub fn max_chunk_size(mut self, n: usize) -> Self {
        self.max_chunk_size = n;
        self
    }

    pub fn proxy(mut self, host: impl Into<String>, port: u16) -> Self {
        self.proxy = Some((host.into(), port));
        self
    }

    pub fn auth_provider(mut self, provider: Arc<dyn AuthorizationProvider>) -> Self {
        self.auth_provider = Some(provider);
        self
    }

    pub fn rate_limiting_enabled(mut self, enabled: bool) -> Self {
        self.rate_limiting_enabled = enabled;
        self
    }

    pub fn default_rate_limiter_percent(mut self, percent: f64) -> Self {
        self.default_rate_limiter_percent = percent;
        self
    }

    pub fn default_compartment(mut self, compartment: impl Into<String>) -> Self {
        self.default_compartment = Some(compartment.into());
        self
    }

    pub fn retry_handler(mut self, handler: Arc<dyn RetryHandler<dyn Request>>) -> Self {
        self.retry_handler = Some(handler);
        self
    }

    pub fn tracing_target(mut self, target: &'static str) -> Self {
        self.tracing_target = target;
        self
    }

    pub fn build(self) -> Result<ClientConfig, NoSqlError> {
        let service_url = self
            .service_url
            .ok_or_else(|| NoSqlError::illegal_argument("service_url is required"))?;

        let is_secure = if let Some(rest) = service_url.strip_prefix("https://") {
            let _ = rest;
            true
        } else if service_url.starts_with("http://") {
            false
        } else {
            return Err(NoSqlError::illegal_argument(
                "service_url must use the http or https scheme",
            ));
        };

        if is_secure && self.tls_context.is_none() {
            return Err(NoSqlError::illegal_argument(
                "tls_context is required for an https service_url",
            ));
        }

        let auth_provider = self
            .auth_provider
            .ok_or_else(|| NoSqlError::illegal_argument("auth_provider is required"))?;

        if !(0.0..=100.0).contains(&self.default_rate_limiter_percent) {
            return Err(NoSqlError::illegal_argument(
                "default_rate_limiter_percent must be in [0, 100]",
            ));
        }

        let retry_handler = self
            .retry_handler
            .unwrap_or_else(|| Arc::new(default_retry_handler()) as Arc<dyn RetryHandler<dyn Request>>);

        Ok(ClientConfig {
            service_url,
            is_secure,
            tls_context: self.tls_context,
            thread_count: self.thread_count,
            connection_pool_size: self.connection_pool_size,
            max_pending: self.max_pending,
            max_content_length: self.max_content_length,
            max_chunk_size: self.max_chunk_size,
            proxy: self.proxy,
            auth_provider,
            rate_limiting_enabled: self.rate_limiting_enabled,
            default_rate_limiter_percent: self.default_rate_limiter_percent,
            default_compartment: self.default_compartment,
            retry_handler,
            tracing_target: self.tracing_target,
        })
    }
}

fn default_retry_handler() -> DefaultRetryHandler<dyn Request> {
    RetryHandlerConfigBuilder::new()
        .max_attempts(10)
        .exponential_backoff(Duration::from_millis(100))
        .name("nosql-driver")
        .build()
}
