//! # mysql-metrics
//!
//! Lock-free performance counters for the connection pool.
//!
//! The write side is a handful of `u64` atomics bumped with relaxed
//! ordering, cheap enough to sit on the acquire/execute hot paths. The
//! read side takes a [`MetricsSnapshot`] with acquire ordering; callers
//! accept mild inter-counter skew in exchange for never serializing the
//! writers.
//!
//! Components hold an `Arc<Metrics>` handed to them at construction.
//! [`Metrics::shared`] returns the process-wide default instance for
//! callers that don't need isolated counters (tests usually do).

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod counters;
mod snapshot;

pub use counters::Metrics;
pub use snapshot::MetricsSnapshot;
