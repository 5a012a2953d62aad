//! Background maintenance: idle eviction and floor replenishment.

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{Builder, JoinHandle};

use parking_lot::MutexGuard;

use crate::pool::{now_millis, IdleSlot, PoolShared};

/// Start the maintenance thread. It wakes every `health_period`, or
/// immediately when the shutdown flag is raised.
pub(crate) fn spawn(shared: Arc<PoolShared>) -> JoinHandle<()> {
    Builder::new()
        .name("mysql-pool-health".into())
        .spawn(move || run(&shared))
        .expect("spawning the health worker thread failed")
}

fn run(shared: &PoolShared) {
    tracing::debug!("health worker started");
    loop {
        let period = shared.state.lock().config.health_period;
        {
            let mut stop = shared.health_stop.lock();
            if *stop {
                break;
            }
            let timed_out = shared
                .health_wakeup
                .wait_for(&mut stop, period)
                .timed_out();
            if *stop {
                break;
            }
            if !timed_out {
                // Spurious wakeup without the stop flag: go back to sleep.
                continue;
            }
        }
        if !shared.running.load(Ordering::SeqCst) {
            break;
        }
        tracing::debug!("health check pass");
        shared.cleanup_idle();
        shared.ensure_minimum();
    }
    tracing::debug!("health worker stopped");
}

impl PoolShared {
    /// Drain the idle queue and keep only sessions that answer a quiet
    /// ping and are either inside the idle TTL or needed to hold the
    /// floor. Everything else is closed.
    pub(crate) fn cleanup_idle(&self) {
        let mut state = self.state.lock();
        let now = now_millis();
        let ttl_ms = state.config.idle_ttl.as_millis() as i64;
        let min = state.config.min_connections;
        let before = state.idle.len();

        let mut keep = VecDeque::with_capacity(before);
        while let Some(slot) = state.idle.pop_front() {
            let alive = slot.session.is_valid_quietly();
            let keep_it = alive && {
                let idle_ms = now - slot.session.last_active_at();
                idle_ms <= ttl_ms || state.total < min
            };
            if keep_it {
                keep.push_back(slot);
            } else {
                tracing::info!(
                    session = %slot.session.id(),
                    alive,
                    "evicting idle session"
                );
                slot.session.close();
                state.total -= 1;
            }
        }
        state.idle = keep;

        let evicted = before - state.idle.len();
        if evicted > 0 {
            tracing::debug!(kept = state.idle.len(), evicted, "idle cleanup finished");
        }
    }

    /// Open sessions until the pool is back at its floor, one bounded
    /// attempt per missing session. Handshakes happen with the pool lock
    /// released; failures are logged and do not stop the pass.
    pub(crate) fn ensure_minimum(&self) {
        let mut state = self.state.lock();
        if state.total >= state.config.min_connections {
            return;
        }
        let needed = state.config.min_connections - state.total;
        tracing::info!(
            total = state.total,
            min = state.config.min_connections,
            needed,
            "replenishing pool to its floor"
        );

        for _ in 0..needed {
            if state.total >= state.config.min_connections {
                break;
            }
            let config = state.config.clone();
            let created = MutexGuard::unlocked(&mut state, || self.create_session_with(&config));
            if !self.running.load(Ordering::SeqCst) {
                if let Ok(session) = created {
                    session.close();
                }
                return;
            }
            match created {
                Ok(session) if session.is_valid(false) => {
                    state.total += 1;
                    state.idle.push_back(IdleSlot::new(session));
                }
                Ok(session) => session.close(),
                // Already logged and counted by create_session_with.
                Err(_) => {}
            }
        }
    }
}
