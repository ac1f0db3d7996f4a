//! Client-side execution engine for a hosted NoSQL key-value/tabular
//! service.
//!
//! [`Engine`] drives a [`Request`] through the pre-dispatch sequence
//! (defaulting, validation, query continuation handling), a retry-and-
//! rate-limited send loop, and the exception classification table that
//! decides whether a failure is retried, forced through a rate-limiter
//! backoff, or returned to the caller. The pieces it's built from:
//!
//! - [`config`]: [`ClientConfig`] / [`ClientConfigBuilder`].
//! - [`request`]: the [`Request`] trait and [`GetTableRequest`].
//! - [`query`]: [`QueryRequest`] and the advanced-query [`QueryDriver`]
//!   continuation.
//! - [`result`]: response bodies and their accounting ([`ResultMeta`],
//!   [`TableResult`], [`QueryResult`]).
//! - [`http`]: the [`HttpClient`] transport contract callers implement.
//! - [`auth`]: the [`AuthorizationProvider`] contract callers implement.
//! - [`codec`]: wire framing and server response classification.
//! - [`limiter_map`]: the per-table rate limiter cache and its
//!   background refresh.
//!
//! Retrying, rate limiting, and timeout accounting are delegated to the
//! sibling `nosql-retry`, `nosql-ratelimiter`, and `nosql-timelimiter`
//! crates rather than reimplemented here.

mod auth;
mod codec;
mod config;
mod engine;
mod error;
mod events;
mod http;
mod limiter_map;
mod query;
mod request;
mod result;

pub use auth::AuthorizationProvider;
pub use codec::SERIAL_VERSION;
pub use config::{ClientConfig, ClientConfigBuilder, TlsContext};
pub use engine::Engine;
pub use error::{ExecutionError, NoSqlError, NoSqlErrorCode, RequestTimeoutError, Result};
pub use events::EngineEvent;
pub use http::{Channel, HttpClient, HttpRequest, HttpResponse, ProxyConfig, TransportError};
pub use limiter_map::RateLimiterMap;
pub use query::{QueryDriver, QueryRequest, READ_KB_FLOOR, READ_KB_LIMIT};
pub use request::{GetTableRequest, Request, RequestBase, RetryStats, TableLimits};
pub use result::{OpResult, QueryResult, ResponseBody, ResultMeta, TableResult};
