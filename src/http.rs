//! The HTTP/TLS collaborator contract.
//!
//! Out of scope for this crate's own implementation (connection pooling,
//! TLS handshakes); the engine drives requests through this trait so
//! tests can substitute a stub transport, matching the way the teacher
//! crate family keeps its resilience primitives independent of any
//! particular `Service` implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// A transport-level failure: connection refused, TLS handshake failure,
/// channel pool exhaustion, or similar. Always retried within the engine's
/// loop (subject to the retry handler and remaining deadline).
#[derive(Debug)]
pub struct TransportError(pub Box<dyn std::error::Error + Send + Sync>);

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.0.as_ref())
    }
}

impl TransportError {
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Box::new(err))
    }

    pub fn from_message(msg: impl Into<String>) -> Self {
        #[derive(Debug)]
        struct Message(String);
        impl fmt::Display for Message {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
        impl std::error::Error for Message {}
        Self(Box::new(Message(msg.into())))
    }
}

/// A leased connection from the client's pool. Returned to the pool when
/// dropped, or explicitly via [`HttpClient::release_channel`] after the
/// response handler has fully read the body.
pub struct Channel {
    pub id: u64,
}

pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

pub struct HttpRequest {
    pub method: &'static str,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

pub struct HttpResponse {
    pub status: u16,
    pub reason_phrase: String,
    pub body: Vec<u8>,
}

/// The low-level transport the execution engine sends requests through.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Waits up to `timeout` for a free channel from the connection pool.
    async fn acquire_channel(&self, timeout: Duration) -> Result<Channel, TransportError>;

    /// Sends `request` over `channel` and awaits the full response.
    async fn send(
        &self,
        request: HttpRequest,
        channel: Channel,
    ) -> Result<HttpResponse, TransportError>;

    /// Largest request body this client (or the deployment it targets)
    /// will accept; the engine checks the encoded size against it before
    /// sending.
    fn max_content_length(&self) -> usize;

    /// Returns a channel to the pool without sending anything further on
    /// it; called on every iteration's cleanup path.
    fn release_channel(&self, _channel: Channel) {}

    async fn configure_proxy(&self, _config: ProxyConfig) -> Result<(), TransportError> {
        Ok(())
    }

    async fn shutdown(&self);
}
