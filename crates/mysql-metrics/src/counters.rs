//! Counter storage and the record operations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::snapshot::MetricsSnapshot;

static SHARED: Lazy<Arc<Metrics>> = Lazy::new(|| Arc::new(Metrics::new()));

/// Process-wide pool and session counters.
///
/// All record operations are wait-free single-atomic bumps and may be
/// called from any thread.
#[derive(Debug, Default)]
pub struct Metrics {
    connections_created: AtomicU64,
    connections_acquired: AtomicU64,
    connections_released: AtomicU64,
    connection_failures: AtomicU64,

    queries_executed: AtomicU64,
    queries_failed: AtomicU64,

    reconnect_attempts: AtomicU64,
    reconnect_successes: AtomicU64,

    // Cumulative time buckets, microseconds.
    acquire_time_us: AtomicU64,
    usage_time_us: AtomicU64,
    query_time_us: AtomicU64,
}

impl Metrics {
    /// A fresh, zeroed counter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The lazily-initialized process-wide instance.
    #[must_use]
    pub fn shared() -> Arc<Metrics> {
        Arc::clone(&SHARED)
    }

    /// A session handshake completed.
    pub fn record_connection_created(&self) {
        self.connections_created.fetch_add(1, Ordering::Relaxed);
    }

    /// A session handshake or acquire attempt failed.
    pub fn record_connection_failed(&self) {
        self.connection_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A caller obtained a session after waiting `duration_us`.
    pub fn record_connection_acquired(&self, duration_us: u64) {
        self.connections_acquired.fetch_add(1, Ordering::Relaxed);
        self.acquire_time_us.fetch_add(duration_us, Ordering::Relaxed);
    }

    /// A caller returned a session it held for `usage_us`.
    pub fn record_connection_released(&self, usage_us: u64) {
        self.connections_released.fetch_add(1, Ordering::Relaxed);
        self.usage_time_us.fetch_add(usage_us, Ordering::Relaxed);
    }

    /// A statement finished after `duration_us`, successfully or not.
    pub fn record_query_executed(&self, duration_us: u64, success: bool) {
        self.queries_executed.fetch_add(1, Ordering::Relaxed);
        self.query_time_us.fetch_add(duration_us, Ordering::Relaxed);
        if !success {
            self.queries_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// A reconnect cycle finished.
    pub fn record_reconnect(&self, success: bool) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
        if success {
            self.reconnect_successes.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// A coherent-enough read of every counter. Individual counters are
    /// loaded with acquire ordering; the set as a whole may exhibit mild
    /// skew under concurrent writers.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_created: self.connections_created.load(Ordering::Acquire),
            connections_acquired: self.connections_acquired.load(Ordering::Acquire),
            connections_released: self.connections_released.load(Ordering::Acquire),
            connection_failures: self.connection_failures.load(Ordering::Acquire),
            queries_executed: self.queries_executed.load(Ordering::Acquire),
            queries_failed: self.queries_failed.load(Ordering::Acquire),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Acquire),
            reconnect_successes: self.reconnect_successes.load(Ordering::Acquire),
            acquire_time_us: self.acquire_time_us.load(Ordering::Acquire),
            usage_time_us: self.usage_time_us.load(Ordering::Acquire),
            query_time_us: self.query_time_us.load(Ordering::Acquire),
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        tracing::info!("resetting performance counters");
        self.connections_created.store(0, Ordering::Release);
        self.connections_acquired.store(0, Ordering::Release);
        self.connections_released.store(0, Ordering::Release);
        self.connection_failures.store(0, Ordering::Release);
        self.queries_executed.store(0, Ordering::Release);
        self.queries_failed.store(0, Ordering::Release);
        self.reconnect_attempts.store(0, Ordering::Release);
        self.reconnect_successes.store(0, Ordering::Release);
        self.acquire_time_us.store(0, Ordering::Release);
        self.usage_time_us.store(0, Ordering::Release);
        self.query_time_us.store(0, Ordering::Release);
    }
}
