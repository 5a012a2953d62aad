//! Bounded session pool: acquire/release protocol, waiter signalling, and
//! dynamic resizing.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::{Condvar, Mutex, MutexGuard};

use mysql_client::{BackendSpec, Session};
use mysql_metrics::Metrics;
use mysql_wire::Driver;

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::health;
use crate::selector::{BackendSelector, Strategy};

/// Wall-clock milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// A session parked in the idle queue, with the time it was returned.
pub(crate) struct IdleSlot {
    pub(crate) session: Arc<Session>,
    #[allow(dead_code)] // surfaced in debugging dumps, not read by the core
    pub(crate) parked_at: i64,
}

impl IdleSlot {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            parked_at: now_millis(),
        }
    }
}

pub(crate) struct PoolState {
    pub(crate) config: PoolConfig,
    pub(crate) idle: VecDeque<IdleSlot>,
    pub(crate) active: HashMap<String, Arc<Session>>,
    pub(crate) total: u32,
}

pub(crate) struct PoolShared {
    pub(crate) state: Mutex<PoolState>,
    /// Signalled on every release so waiters can re-check the idle queue.
    pub(crate) available: Condvar,
    pub(crate) running: AtomicBool,
    metrics_enabled: AtomicBool,
    pub(crate) driver: Arc<dyn Driver>,
    pub(crate) selector: BackendSelector,
    pub(crate) metrics: Arc<Metrics>,
    /// Health worker shutdown signal: flag plus wakeup, so the worker can
    /// leave its periodic sleep immediately.
    pub(crate) health_stop: Mutex<bool>,
    pub(crate) health_wakeup: Condvar,
}

impl PoolShared {
    pub(crate) fn record(&self, f: impl FnOnce(&Metrics)) {
        if self.metrics_enabled.load(Ordering::Relaxed) {
            f(&self.metrics);
        }
    }

    /// Pick a backend and open a session against it. Callers hold the
    /// state lock across this only at init, where nothing else can run.
    pub(crate) fn create_session_with(
        &self,
        config: &PoolConfig,
    ) -> Result<Arc<Session>, PoolError> {
        let result = (|| {
            let backend = self.selector.pick()?;
            let session = Session::new(
                backend,
                Arc::clone(&self.driver),
                config.reconnect_interval,
                config.max_reconnect_attempts,
            )
            .log_statements(config.log_queries);
            let session = if config.enable_metrics {
                session.metrics(Arc::clone(&self.metrics))
            } else {
                session
            };
            let session = Arc::new(session);
            session.open()?;
            Ok::<_, PoolError>(session)
        })();
        match &result {
            Ok(session) => {
                self.record(Metrics::record_connection_created);
                tracing::debug!(session = %session.id(), "session created");
            }
            Err(err) => {
                self.record(Metrics::record_connection_failed);
                tracing::error!("session creation failed: {err}");
            }
        }
        result
    }

    /// Release path shared by the guard and the tests. Never fails; a
    /// session released after shutdown has already been closed and is
    /// simply dropped.
    pub(crate) fn release(&self, session: Arc<Session>) {
        if !self.running.load(Ordering::SeqCst) {
            tracing::debug!(session = %session.id(), "released after shutdown, dropping");
            return;
        }
        let usage_us = (now_millis() - session.last_active_at()).max(0) as u64 * 1000;

        let mut state = self.state.lock();
        state.active.remove(session.id());
        tracing::debug!(session = %session.id(), "session released");

        if state.total > state.config.max_connections {
            // The ceiling shrank while this session was out.
            session.close();
            state.total -= 1;
        } else if session.is_valid(false) {
            state.idle.push_back(IdleSlot::new(session));
        } else {
            tracing::info!(session = %session.id(), "released session is dead, closing");
            session.close();
            state.total -= 1;
            if state.total < state.config.min_connections {
                let config = state.config.clone();
                let created =
                    MutexGuard::unlocked(&mut state, || self.create_session_with(&config));
                if let Ok(fresh) = created {
                    if fresh.is_valid(false) {
                        state.total += 1;
                        state.idle.push_back(IdleSlot::new(fresh));
                    } else {
                        fresh.close();
                    }
                }
            }
        }

        self.record(|m| m.record_connection_released(usage_us));
        self.available.notify_all();
    }
}

/// Point-in-time view of the pool.
#[derive(Debug, Clone, Copy)]
pub struct PoolStatus {
    /// Whether the pool is between `init` and `shutdown`.
    pub running: bool,
    /// Sessions parked and available.
    pub idle: u32,
    /// Sessions currently held by callers.
    pub active: u32,
    /// Total sessions, idle plus active.
    pub total: u32,
    /// Configured floor.
    pub min: u32,
    /// Configured ceiling.
    pub max: u32,
}

impl PoolStatus {
    /// Share of the ceiling currently held by callers, percent.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.max == 0 {
            return 0.0;
        }
        f64::from(self.active) / f64::from(self.max) * 100.0
    }

    /// Whether the pool cannot grow any further.
    #[must_use]
    pub fn is_at_capacity(&self) -> bool {
        self.total >= self.max
    }
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "connection pool status:")?;
        writeln!(f, "  running: {}", if self.running { "yes" } else { "no" })?;
        writeln!(f, "  total: {}", self.total)?;
        writeln!(f, "  idle: {}", self.idle)?;
        writeln!(f, "  active: {}", self.active)?;
        writeln!(f, "  limits: [{}, {}]", self.min, self.max)?;
        write!(f, "  utilization: {:.1}%", self.utilization())
    }
}

/// Bounded pool of reconnecting sessions over one or more backends.
///
/// Lifecycle: constructed idle, [`init`](Pool::init) brings it to running,
/// [`shutdown`](Pool::shutdown) stops it; a stopped pool can be
/// re-initialized with fresh state.
pub struct Pool {
    shared: Arc<PoolShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Pool {
    /// A pool over `driver`, recording into the process-wide counters.
    /// Not running until [`init`](Pool::init).
    #[must_use]
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self::with_metrics(driver, Metrics::shared())
    }

    /// Same as [`new`](Pool::new) but recording into a caller-supplied
    /// counter set.
    #[must_use]
    pub fn with_metrics(driver: Arc<dyn Driver>, metrics: Arc<Metrics>) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                state: Mutex::new(PoolState {
                    config: PoolConfig::default(),
                    idle: VecDeque::new(),
                    active: HashMap::new(),
                    total: 0,
                }),
                available: Condvar::new(),
                running: AtomicBool::new(false),
                metrics_enabled: AtomicBool::new(true),
                driver,
                selector: BackendSelector::new(),
                metrics,
                health_stop: Mutex::new(false),
                health_wakeup: Condvar::new(),
            }),
            worker: Mutex::new(None),
        }
    }

    /// The selector fronting this pool. Backends can be added, removed and
    /// re-weighted at runtime.
    #[must_use]
    pub fn selector(&self) -> &BackendSelector {
        &self.shared.selector
    }

    /// Whether the pool is between `init` and `shutdown`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Seed the selector with the single backend embedded in `config`,
    /// then [`init`](Pool::init).
    pub fn init_with_backend(&self, config: &PoolConfig) -> Result<(), PoolError> {
        self.shared
            .selector
            .configure(vec![config.backend_spec()], Strategy::Weighted)?;
        self.init(config)
    }

    /// Seed the selector with `backends` under `strategy`, then
    /// [`init`](Pool::init).
    pub fn init_with_backends(
        &self,
        config: &PoolConfig,
        backends: Vec<BackendSpec>,
        strategy: Strategy,
    ) -> Result<(), PoolError> {
        self.shared.selector.configure(backends, strategy)?;
        self.init(config)
    }

    /// Bring the pool to running: open the initial sessions, park them
    /// idle, and start the health worker.
    ///
    /// If sessions were requested but not a single one could be opened,
    /// everything is rolled back and the last creation error is returned.
    /// Coming up below the floor only warns; the health worker keeps
    /// trying. Re-initializing a running pool is refused.
    pub fn init(&self, config: &PoolConfig) -> Result<(), PoolError> {
        config.validate()?;
        let mut state = self.shared.state.lock();
        if self.shared.running.load(Ordering::SeqCst) {
            tracing::warn!("init called on a running pool");
            return Err(PoolError::ConfigInvalid("pool is already running".into()));
        }

        self.shared
            .metrics_enabled
            .store(config.enable_metrics, Ordering::SeqCst);

        let target = config.init_connections.min(config.max_connections);
        let mut created: Vec<Arc<Session>> = Vec::with_capacity(target as usize);
        let mut last_err = None;
        for attempt in 1..=target {
            match self.shared.create_session_with(config) {
                Ok(session) => {
                    if session.is_valid(false) {
                        created.push(session);
                    } else {
                        session.close();
                    }
                }
                Err(err) => {
                    tracing::error!(attempt, "initial session failed: {err}");
                    last_err = Some(err);
                }
            }
        }

        if target > 0 && created.is_empty() {
            tracing::error!("no initial session could be opened, aborting init");
            return Err(last_err.unwrap_or(PoolError::BackendUnavailable));
        }
        if (created.len() as u32) < config.min_connections {
            tracing::warn!(
                created = created.len(),
                min = config.min_connections,
                "pool started below its floor"
            );
        }

        state.config = config.clone();
        state.total = created.len() as u32;
        state.idle = created.into_iter().map(IdleSlot::new).collect();
        state.active.clear();

        *self.shared.health_stop.lock() = false;
        self.shared.running.store(true, Ordering::SeqCst);
        *self.worker.lock() = Some(health::spawn(Arc::clone(&self.shared)));

        tracing::info!(
            total = state.total,
            min = config.min_connections,
            max = config.max_connections,
            "connection pool started"
        );
        Ok(())
    }

    /// Acquire a session, waiting up to the configured acquire timeout.
    pub fn acquire(&self) -> Result<PooledSession, PoolError> {
        self.acquire_with_timeout(Duration::ZERO)
    }

    /// Acquire a session, waiting up to `timeout` (zero means the
    /// configured default).
    ///
    /// Prefers an idle session, grows the pool when under the ceiling
    /// (with the pool lock released around the handshake), and otherwise
    /// waits for a release. Waiters woken by [`shutdown`](Pool::shutdown)
    /// observe [`PoolError::PoolStopped`].
    pub fn acquire_with_timeout(&self, timeout: Duration) -> Result<PooledSession, PoolError> {
        if !self.is_running() {
            self.shared.record(Metrics::record_connection_failed);
            return Err(PoolError::PoolStopped);
        }
        let started = Instant::now();
        let mut state = self.shared.state.lock();
        let timeout = if timeout.is_zero() {
            state.config.acquire_timeout
        } else {
            timeout
        };
        let deadline = started + timeout;

        loop {
            if !self.is_running() {
                self.shared.record(Metrics::record_connection_failed);
                return Err(PoolError::PoolStopped);
            }

            if let Some(slot) = state.idle.pop_front() {
                let session = slot.session;
                if session.is_valid(false) {
                    state
                        .active
                        .insert(session.id().to_string(), Arc::clone(&session));
                    session.touch();
                    self.record_acquired(started);
                    tracing::debug!(session = %session.id(), "acquired idle session");
                    return Ok(PooledSession::new(session, Arc::clone(&self.shared)));
                }
                tracing::info!(session = %session.id(), "discarding dead idle session");
                session.close();
                state.total -= 1;
                continue;
            }

            if state.total < state.config.max_connections {
                let config = state.config.clone();
                let created =
                    MutexGuard::unlocked(&mut state, || self.shared.create_session_with(&config));
                if !self.is_running() {
                    if let Ok(session) = created {
                        session.close();
                    }
                    self.shared.record(Metrics::record_connection_failed);
                    return Err(PoolError::PoolStopped);
                }
                match created {
                    Ok(session) if session.is_valid(false) => {
                        state.total += 1;
                        state
                            .active
                            .insert(session.id().to_string(), Arc::clone(&session));
                        session.touch();
                        self.record_acquired(started);
                        tracing::debug!(session = %session.id(), "created session for caller");
                        return Ok(PooledSession::new(session, Arc::clone(&self.shared)));
                    }
                    Ok(session) => session.close(),
                    // Creation failure was already logged and counted;
                    // wait for someone to release.
                    Err(_) => {}
                }
            }

            tracing::debug!("no session available, waiting for a release");
            if self
                .shared
                .available
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                let waited_ms = timeout.as_millis() as u64;
                tracing::warn!(waited_ms, "acquire timed out");
                return Err(PoolError::AcquireTimeout { waited_ms });
            }
        }
    }

    /// Stop the pool: refuse new acquires, wake every waiter, join the
    /// health worker, then close all sessions. Idempotent.
    pub fn shutdown(&self) {
        {
            let _state = self.shared.state.lock();
            if !self.shared.running.swap(false, Ordering::SeqCst) {
                return;
            }
            self.shared.available.notify_all();
        }
        {
            let mut stop = self.shared.health_stop.lock();
            *stop = true;
            self.shared.health_wakeup.notify_all();
        }
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                tracing::error!("health worker panicked");
            }
        }

        let mut state = self.shared.state.lock();
        for slot in state.idle.drain(..) {
            slot.session.close();
        }
        for (_, session) in state.active.drain() {
            session.close();
        }
        state.total = 0;
        tracing::info!("connection pool stopped");
    }

    /// Snapshot of the pool's occupancy and limits.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let state = self.shared.state.lock();
        PoolStatus {
            running: self.is_running(),
            idle: state.idle.len() as u32,
            active: state.active.len() as u32,
            total: state.total,
            min: state.config.min_connections,
            max: state.config.max_connections,
        }
    }

    /// A copy of the active configuration.
    #[must_use]
    pub fn config(&self) -> PoolConfig {
        self.shared.state.lock().config.clone()
    }

    /// Adopt `new_config`. An oversized pool is shrunk immediately (idle
    /// sessions only); growth back to the floor is left to the health
    /// worker. An invalid configuration is rejected before anything
    /// changes.
    pub fn adjust(&self, new_config: &PoolConfig) -> Result<(), PoolError> {
        new_config.validate()?;
        let mut state = self.shared.state.lock();
        state.config = new_config.clone();
        self.shared
            .metrics_enabled
            .store(new_config.enable_metrics, Ordering::SeqCst);
        if state.total > new_config.max_connections {
            shrink_locked(&mut state, new_config.max_connections);
        }
        tracing::info!(
            min = new_config.min_connections,
            max = new_config.max_connections,
            "pool configuration adjusted"
        );
        Ok(())
    }

    /// Close idle sessions until `total <= target` or the idle queue runs
    /// dry. Active sessions are never touched; an overshoot is settled as
    /// they are released.
    pub fn shrink_to(&self, target: u32) {
        if !self.is_running() {
            return;
        }
        let mut state = self.shared.state.lock();
        shrink_locked(&mut state, target);
    }

    /// Adjust the floor and ceiling. Rejected when `min > max`.
    pub fn set_connection_limits(&self, min: u32, max: u32) -> Result<(), PoolError> {
        if min > max {
            return Err(PoolError::ConfigInvalid(format!(
                "min_connections {min} exceeds max_connections {max}"
            )));
        }
        let mut config = self.config();
        config.min_connections = min;
        config.max_connections = max;
        self.adjust(&config)
    }

    /// Adjust the three timeout knobs. Zero values are rejected.
    pub fn set_timeout_settings(
        &self,
        acquire_timeout: Duration,
        idle_ttl: Duration,
        health_period: Duration,
    ) -> Result<(), PoolError> {
        if acquire_timeout.is_zero() || idle_ttl.is_zero() || health_period.is_zero() {
            return Err(PoolError::ConfigInvalid(
                "timeout settings must all be non-zero".into(),
            ));
        }
        let mut config = self.config();
        config.acquire_timeout = acquire_timeout;
        config.idle_ttl = idle_ttl;
        config.health_period = health_period;
        self.adjust(&config)
    }

    /// Run one maintenance pass synchronously, the same one the health
    /// worker runs.
    pub fn perform_health_check(&self) -> Result<(), PoolError> {
        if !self.is_running() {
            return Err(PoolError::PoolStopped);
        }
        tracing::info!("manual health check");
        self.shared.cleanup_idle();
        self.shared.ensure_minimum();
        Ok(())
    }

    fn record_acquired(&self, started: Instant) {
        self.shared
            .record(|m| m.record_connection_acquired(started.elapsed().as_micros() as u64));
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.status();
        f.debug_struct("Pool")
            .field("running", &status.running)
            .field("idle", &status.idle)
            .field("active", &status.active)
            .field("total", &status.total)
            .finish()
    }
}

fn shrink_locked(state: &mut PoolState, target: u32) {
    let mut removed = 0u32;
    while state.total > target {
        let Some(slot) = state.idle.pop_front() else {
            break;
        };
        slot.session.close();
        state.total -= 1;
        removed += 1;
    }
    tracing::debug!(removed, target, total = state.total, "pool shrunk");
}

/// A session checked out of the pool.
///
/// Dereferences to [`Session`]. Dropping the guard returns the session to
/// the pool on every exit path; the return itself never fails.
pub struct PooledSession {
    session: Option<Arc<Session>>,
    shared: Arc<PoolShared>,
}

impl PooledSession {
    fn new(session: Arc<Session>, shared: Arc<PoolShared>) -> Self {
        Self {
            session: Some(session),
            shared,
        }
    }
}

impl Deref for PooledSession {
    type Target = Session;

    fn deref(&self) -> &Session {
        self.session
            .as_deref()
            .expect("session is present until the guard drops")
    }
}

impl Drop for PooledSession {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.shared.release(session);
        }
    }
}

impl fmt::Debug for PooledSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledSession")
            .field("session", &self.deref())
            .finish()
    }
}
