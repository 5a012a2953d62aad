//! One live database session with transparent reconnect.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::{Mutex, MutexGuard};
use rand::distributions::Alphanumeric;
use rand::Rng;

use mysql_metrics::Metrics;
use mysql_wire::error::CR_SERVER_GONE_ERROR;
use mysql_wire::{Conn, Driver, WireError};

use crate::backend::BackendSpec;
use crate::error::ClientError;
use crate::result::QueryResult;

/// Upper bound on the reconnect backoff, regardless of the exponential
/// term.
const MAX_RECONNECT_DELAY_MS: u64 = 30_000;

/// Wall-clock milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn random_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

/// Backoff before reconnect attempt `attempt + 1` (`attempt` is 1-based).
///
/// `base * 2^(attempt-1)`, capped at 30 s, scaled by a uniform jitter
/// factor in [0.8, 1.2), never below 1 ms.
fn reconnect_delay(base_ms: u64, attempt: u32) -> Duration {
    let exp = base_ms.saturating_mul(1u64 << (attempt - 1).min(63));
    let capped = exp.min(MAX_RECONNECT_DELAY_MS);
    let jitter: f64 = rand::thread_rng().gen_range(0.8..1.2);
    let delay = (capped as f64 * jitter).round().max(1.0);
    Duration::from_millis(delay as u64)
}

struct SessionInner {
    conn: Option<Box<dyn Conn>>,
    total_reconnects: u64,
    successful_reconnects: u64,
}

/// One live, authenticated session against a single backend.
///
/// The session owns at most one wire handle at a time. Operations that
/// touch the handle serialize on the per-session mutex; the mutex is
/// released around reconnect backoff sleeps, never around the statement
/// round trip itself.
pub struct Session {
    id: String,
    backend: BackendSpec,
    driver: Arc<dyn Driver>,
    metrics: Option<Arc<Metrics>>,
    created_at: i64,
    last_active_at: AtomicI64,
    reconnect_interval_ms: u64,
    max_reconnect_attempts: u32,
    log_statements: bool,
    inner: Mutex<SessionInner>,
}

impl Session {
    /// A fresh session against `backend`. No handshake happens until
    /// [`open`](Self::open).
    pub fn new(
        backend: BackendSpec,
        driver: Arc<dyn Driver>,
        reconnect_interval: Duration,
        max_reconnect_attempts: u32,
    ) -> Self {
        let created_at = now_millis();
        Self {
            id: random_id(),
            backend,
            driver,
            metrics: None,
            created_at,
            last_active_at: AtomicI64::new(created_at),
            reconnect_interval_ms: reconnect_interval.as_millis() as u64,
            max_reconnect_attempts,
            log_statements: false,
            inner: Mutex::new(SessionInner {
                conn: None,
                total_reconnects: 0,
                successful_reconnects: 0,
            }),
        }
    }

    /// Log every statement at debug level.
    #[must_use]
    pub fn log_statements(mut self, enabled: bool) -> Self {
        self.log_statements = enabled;
        self
    }

    /// Record query and reconnect counters into `metrics`.
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Opaque identifier, stable for the session's lifetime.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The backend this session was opened against.
    #[must_use]
    pub fn backend(&self) -> &BackendSpec {
        &self.backend
    }

    /// Creation time, wall-clock milliseconds.
    #[must_use]
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Last activity time, wall-clock milliseconds.
    #[must_use]
    pub fn last_active_at(&self) -> i64 {
        self.last_active_at.load(Ordering::Acquire)
    }

    /// Mark the session as active right now.
    pub fn touch(&self) {
        self.last_active_at.store(now_millis(), Ordering::Release);
    }

    /// Handshake attempts made by [`reconnect`](Self::reconnect) over the
    /// session's lifetime.
    #[must_use]
    pub fn total_reconnects(&self) -> u64 {
        self.inner.lock().total_reconnects
    }

    /// Reconnect cycles that restored the session.
    #[must_use]
    pub fn successful_reconnects(&self) -> u64 {
        self.inner.lock().successful_reconnects
    }

    /// Zero the per-session reconnect counters.
    pub fn reset_reconnect_stats(&self) {
        let mut inner = self.inner.lock();
        inner.total_reconnects = 0;
        inner.successful_reconnects = 0;
        tracing::debug!(session = %self.id, "reconnect statistics reset");
    }

    /// Whether the session currently holds a live handle.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.lock().conn.is_some()
    }

    /// Perform a fresh handshake against the backend.
    ///
    /// On failure no handle is retained, so the call can simply be
    /// repeated.
    pub fn open(&self) -> Result<(), ClientError> {
        let mut inner = self.inner.lock();
        match self.driver.connect(&self.backend.connect_options()) {
            Ok(conn) => {
                inner.conn = Some(conn);
                self.touch();
                tracing::debug!(
                    session = %self.id,
                    host = %self.backend.host,
                    port = self.backend.port,
                    "session opened"
                );
                Ok(())
            }
            Err(err) => {
                tracing::error!(
                    session = %self.id,
                    host = %self.backend.host,
                    port = self.backend.port,
                    code = err.code,
                    "handshake failed: {err}"
                );
                Err(ClientError::ConnectFailed {
                    host: self.backend.host.clone(),
                    port: self.backend.port,
                    source: err,
                })
            }
        }
    }

    /// Close the current handle, if any, and re-handshake with
    /// exponential backoff.
    ///
    /// Makes up to `max_reconnect_attempts` handshakes, sleeping between
    /// attempts but not after the last, with the session mutex released
    /// around each sleep. Either the session ends up with a live handle or
    /// it ends up with none at all.
    pub fn reconnect(&self) -> Result<(), ClientError> {
        let mut inner = self.inner.lock();
        // A concurrent close may already have taken the handle; either way
        // the old stream is gone before the first new handshake.
        inner.conn = None;
        let opts = self.backend.connect_options();

        for attempt in 1..=self.max_reconnect_attempts {
            inner.total_reconnects += 1;
            match self.driver.connect(&opts) {
                Ok(conn) => {
                    inner.conn = Some(conn);
                    inner.successful_reconnects += 1;
                    tracing::debug!(session = %self.id, attempt, "reconnected");
                    if let Some(metrics) = &self.metrics {
                        metrics.record_reconnect(true);
                    }
                    return Ok(());
                }
                Err(err) => {
                    tracing::warn!(
                        session = %self.id,
                        attempt,
                        code = err.code,
                        "reconnect attempt failed: {err}"
                    );
                    if attempt < self.max_reconnect_attempts {
                        let delay = reconnect_delay(self.reconnect_interval_ms, attempt);
                        tracing::debug!(
                            session = %self.id,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "backing off before next reconnect attempt"
                        );
                        MutexGuard::unlocked(&mut inner, || std::thread::sleep(delay));
                    }
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_reconnect(false);
        }
        Err(ClientError::ReconnectExhausted {
            attempts: self.max_reconnect_attempts,
        })
    }

    /// Liveness probe. Updates the activity timestamp on success.
    pub fn ping(&self) -> Result<(), ClientError> {
        let mut inner = self.inner.lock();
        let conn = inner.conn.as_mut().ok_or(ClientError::NotConnected)?;
        conn.ping().map_err(ClientError::SqlExecution)?;
        self.touch();
        Ok(())
    }

    /// Ping the session; on a transport-class ping failure and
    /// `allow_reconnect`, try to restore the stream. Returns the final
    /// liveness.
    pub fn is_valid(&self, allow_reconnect: bool) -> bool {
        {
            let mut inner = self.inner.lock();
            let Some(conn) = inner.conn.as_mut() else {
                tracing::debug!(session = %self.id, "invalid: no handle");
                return false;
            };
            match conn.ping() {
                Ok(()) => {
                    self.touch();
                    return true;
                }
                Err(err) => {
                    tracing::debug!(session = %self.id, code = err.code, "ping failed: {err}");
                    if !allow_reconnect || !err.is_transport() {
                        return false;
                    }
                }
            }
        }
        // Transport-class ping failure. reconnect() re-takes the mutex and
        // closes whatever handle it finds, so a racing close is harmless.
        tracing::debug!(session = %self.id, "ping failed on transport error, reconnecting");
        self.reconnect().is_ok()
    }

    /// Ping without side effects: no reconnect, no activity update.
    #[must_use]
    pub fn is_valid_quietly(&self) -> bool {
        let mut inner = self.inner.lock();
        matches!(inner.conn.as_mut().map(|conn| conn.ping()), Some(Ok(())))
    }

    /// Execute a SELECT-shaped statement, transparently reconnecting on
    /// transport-class failures.
    ///
    /// Statements that produce no result set (`SET`, DDL, ...) yield a
    /// [`QueryResult`] with `has_result_set() == false`.
    pub fn execute_query(&self, sql: &str) -> Result<QueryResult, ClientError> {
        self.execute_with_reconnect(sql, true)
    }

    /// Execute a row-count statement, transparently reconnecting on
    /// transport-class failures. Returns the number of affected rows.
    pub fn execute_update(&self, sql: &str) -> Result<u64, ClientError> {
        self.execute_with_reconnect(sql, false)
            .map(|result| result.affected_rows())
    }

    /// Issue `START TRANSACTION`. Returns whether the server accepted it.
    pub fn begin(&self) -> bool {
        self.transaction_control("START TRANSACTION")
    }

    /// Issue `COMMIT`. Returns whether the server accepted it.
    pub fn commit(&self) -> bool {
        self.transaction_control("COMMIT")
    }

    /// Issue `ROLLBACK`. Returns whether the server accepted it.
    pub fn rollback(&self) -> bool {
        self.transaction_control("ROLLBACK")
    }

    /// Escape `s` for embedding in a quoted literal.
    pub fn escape(&self, s: &str) -> Result<String, ClientError> {
        let inner = self.inner.lock();
        let conn = inner.conn.as_ref().ok_or(ClientError::NotConnected)?;
        Ok(conn.escape(s))
    }

    /// Drop the wire handle. Idempotent; the session stays closed until an
    /// explicit `open` or `reconnect`.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if inner.conn.take().is_some() {
            tracing::debug!(session = %self.id, "session closed");
        }
    }

    fn transaction_control(&self, sql: &str) -> bool {
        match self.execute_internal(sql, false) {
            Ok(_) => {
                tracing::debug!(session = %self.id, sql, "transaction control accepted");
                true
            }
            Err(err) => {
                tracing::error!(
                    session = %self.id,
                    sql,
                    code = err.code,
                    "transaction control failed: {err}"
                );
                false
            }
        }
    }

    /// One statement round trip under the session mutex: send, wait for
    /// status, materialize. The mutex is held throughout, which is what
    /// serializes concurrent callers on the same session.
    fn execute_internal(&self, sql: &str, is_query: bool) -> Result<QueryResult, WireError> {
        let mut inner = self.inner.lock();
        let conn = inner.conn.as_mut().ok_or_else(|| {
            WireError::new(CR_SERVER_GONE_ERROR, "session has no live handle")
        })?;
        self.touch();
        if self.log_statements {
            tracing::debug!(
                session = %self.id,
                kind = if is_query { "query" } else { "update" },
                sql,
                "executing statement"
            );
        }
        conn.execute(sql)?;
        if is_query {
            match conn.store_result()? {
                Some(buffer) => Ok(QueryResult::with_rows(buffer)),
                None if conn.field_count() > 0 => Err(WireError::new(
                    mysql_wire::error::CR_SERVER_LOST,
                    "statement produced fields but no result set could be stored",
                )),
                None => Ok(QueryResult::without_rows(0)),
            }
        } else {
            Ok(QueryResult::without_rows(conn.affected_rows()))
        }
    }

    fn execute_with_reconnect(
        &self,
        sql: &str,
        is_query: bool,
    ) -> Result<QueryResult, ClientError> {
        let started = Instant::now();
        let mut last_err = WireError::new(CR_SERVER_GONE_ERROR, "statement was never sent");

        for attempt in 0..=self.max_reconnect_attempts {
            if attempt > 0 && self.reconnect().is_err() {
                tracing::warn!(session = %self.id, attempt, "reconnect failed, retrying");
                last_err = WireError::new(CR_SERVER_GONE_ERROR, "reconnect failed");
                continue;
            }
            match self.execute_internal(sql, is_query) {
                Ok(result) => {
                    self.record_query(started, true);
                    return Ok(result);
                }
                Err(err) if err.is_transport() => {
                    tracing::warn!(
                        session = %self.id,
                        attempt,
                        code = err.code,
                        "transport failure during statement: {err}"
                    );
                    last_err = err;
                }
                Err(err) => {
                    // Server-side failure: surface it as-is, no retry.
                    tracing::error!(
                        session = %self.id,
                        code = err.code,
                        "statement failed: {err}"
                    );
                    self.record_query(started, false);
                    return Err(ClientError::SqlExecution(err));
                }
            }
        }

        self.record_query(started, false);
        tracing::error!(
            session = %self.id,
            attempts = self.max_reconnect_attempts + 1,
            code = last_err.code,
            "statement abandoned: {last_err}"
        );
        Err(ClientError::ExecutionExhausted {
            attempts: self.max_reconnect_attempts + 1,
            last: last_err,
            sql: sql.to_string(),
        })
    }

    fn record_query(&self, started: Instant, success: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_query_executed(started.elapsed().as_micros() as u64, success);
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("backend", &self.backend)
            .field("open", &self.is_open())
            .finish()
    }
}
