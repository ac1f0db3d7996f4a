//! A dedicated single-threaded executor used for background table-limit
//! refresh.
//!
//! The [`Executor`] trait abstracts over "where does this future run";
//! [`worker::RefreshWorker`] is the concrete single-thread runtime the
//! rate-limiter map hands its background `GetTable` refreshes to, so at
//! most one refresh is ever running at a time regardless of how many
//! caller tasks are concurrently calling into the engine.

mod executor;
pub mod worker;

pub use executor::{CurrentRuntime, Executor};
pub use worker::{QueueRejected, RefreshWorker};
