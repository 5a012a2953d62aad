//! Backend selection policies.

use std::fmt;
use std::fmt::Write as _;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use mysql_client::BackendSpec;

use crate::error::PoolError;

/// How the selector maps a pick to a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Uniform random pick.
    Random,
    /// Cycle through the list in order.
    RoundRobin,
    /// Pick proportionally to backend weights.
    #[default]
    Weighted,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Random => "random",
            Strategy::RoundRobin => "round_robin",
            Strategy::Weighted => "weighted",
        };
        f.write_str(name)
    }
}

struct SelectorInner {
    backends: Vec<BackendSpec>,
    strategy: Strategy,
    round_robin_index: usize,
    rng: StdRng,
}

/// Picks the backend for each new session.
///
/// One selector fronts the whole pool. All state sits behind a single leaf
/// mutex; nothing else is locked while it is held.
pub struct BackendSelector {
    inner: Mutex<SelectorInner>,
}

impl Default for BackendSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendSelector {
    /// An empty selector with the default weighted strategy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SelectorInner {
                backends: Vec::new(),
                strategy: Strategy::default(),
                round_robin_index: 0,
                rng: StdRng::from_entropy(),
            }),
        }
    }

    /// Replace the backend list and strategy wholesale.
    ///
    /// Rejects an empty list and any invalid spec; on rejection the
    /// previous configuration is untouched.
    pub fn configure(
        &self,
        backends: Vec<BackendSpec>,
        strategy: Strategy,
    ) -> Result<(), PoolError> {
        if backends.is_empty() {
            return Err(PoolError::ConfigInvalid(
                "backend list must not be empty".into(),
            ));
        }
        for spec in &backends {
            spec.validate().map_err(PoolError::ConfigInvalid)?;
        }
        let mut inner = self.inner.lock();
        inner.backends = backends;
        inner.strategy = strategy;
        inner.round_robin_index = 0;
        tracing::info!(
            strategy = %strategy,
            backends = inner.backends.len(),
            "backend selector configured"
        );
        Ok(())
    }

    /// Pick one backend following the active strategy.
    pub fn pick(&self) -> Result<BackendSpec, PoolError> {
        let mut inner = self.inner.lock();
        if inner.backends.is_empty() {
            return Err(PoolError::BackendUnavailable);
        }
        let spec = match inner.strategy {
            Strategy::Random => {
                let count = inner.backends.len();
                let idx = inner.rng.gen_range(0..count);
                inner.backends[idx].clone()
            }
            Strategy::RoundRobin => {
                let idx = inner.round_robin_index;
                inner.round_robin_index = (idx + 1) % inner.backends.len();
                inner.backends[idx].clone()
            }
            Strategy::Weighted => select_weighted(&mut inner),
        };
        tracing::trace!(backend = %spec, strategy = %inner.strategy, "backend picked");
        Ok(spec)
    }

    /// Add one backend. A spec for an already known `(host, port)` is a
    /// no-op.
    pub fn add(&self, spec: BackendSpec) -> Result<(), PoolError> {
        spec.validate().map_err(PoolError::ConfigInvalid)?;
        let mut inner = self.inner.lock();
        if inner
            .backends
            .iter()
            .any(|existing| existing.is_endpoint(&spec.host, spec.port))
        {
            tracing::warn!(backend = %spec, "backend already registered, ignoring");
            return Ok(());
        }
        tracing::info!(backend = %spec, "backend added");
        inner.backends.push(spec);
        Ok(())
    }

    /// Remove the backend at `(host, port)`. Returns whether one was
    /// removed.
    pub fn remove(&self, host: &str, port: u16) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.backends.len();
        inner.backends.retain(|spec| !spec.is_endpoint(host, port));
        if inner.backends.len() == before {
            tracing::debug!(host, port, "no backend to remove");
            return false;
        }
        // Keep the round-robin cursor inside the shrunk list.
        inner.round_robin_index = if inner.backends.is_empty() {
            0
        } else {
            inner.round_robin_index % inner.backends.len()
        };
        tracing::info!(host, port, remaining = inner.backends.len(), "backend removed");
        true
    }

    /// Re-weight the backend at `(host, port)`. Returns whether one was
    /// found; zero weights are rejected.
    pub fn set_weight(&self, host: &str, port: u16, weight: u32) -> bool {
        if weight == 0 {
            tracing::warn!(host, port, "rejecting zero weight");
            return false;
        }
        let mut inner = self.inner.lock();
        match inner
            .backends
            .iter_mut()
            .find(|spec| spec.is_endpoint(host, port))
        {
            Some(spec) => {
                let old = spec.weight;
                spec.weight = weight;
                tracing::info!(host, port, old, new = weight, "backend weight updated");
                true
            }
            None => {
                tracing::warn!(host, port, "no backend to re-weight");
                false
            }
        }
    }

    /// Switch the selection strategy. Switching to round-robin restarts
    /// the cycle at the head of the list.
    pub fn set_strategy(&self, strategy: Strategy) {
        let mut inner = self.inner.lock();
        inner.strategy = strategy;
        if strategy == Strategy::RoundRobin {
            inner.round_robin_index = 0;
        }
        tracing::info!(strategy = %strategy, "selection strategy changed");
    }

    /// The active strategy.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.inner.lock().strategy
    }

    /// Number of registered backends.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().backends.len()
    }

    /// Whether no backend is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of the registered backends.
    #[must_use]
    pub fn backends(&self) -> Vec<BackendSpec> {
        self.inner.lock().backends.clone()
    }

    /// Human-readable snapshot of the selector state.
    #[must_use]
    pub fn status_report(&self) -> String {
        let inner = self.inner.lock();
        let mut out = String::new();
        let _ = writeln!(out, "backend selector status:");
        let _ = writeln!(out, "  strategy: {}", inner.strategy);
        let _ = writeln!(out, "  backends: {}", inner.backends.len());
        let _ = writeln!(out, "  round-robin index: {}", inner.round_robin_index);
        for (idx, spec) in inner.backends.iter().enumerate() {
            let _ = writeln!(out, "    [{idx}] {spec}");
        }
        if inner.strategy == Strategy::Weighted {
            let total: u64 = inner.backends.iter().map(|s| u64::from(s.weight)).sum();
            let _ = writeln!(out, "  total weight: {total}");
        }
        out
    }
}

/// Prefix-sum sampling: draw uniformly over the weight total and return
/// the first backend whose running sum exceeds the draw. Ties break by
/// list order.
fn select_weighted(inner: &mut SelectorInner) -> BackendSpec {
    let total: u64 = inner.backends.iter().map(|s| u64::from(s.weight)).sum();
    let draw = inner.rng.gen_range(0..total);
    let mut acc = 0u64;
    for spec in &inner.backends {
        acc += u64::from(spec.weight);
        if draw < acc {
            return spec.clone();
        }
    }
    // Unreachable for positive weights; kept as a defined fallback.
    tracing::warn!("weighted selection fell through, using first backend");
    inner.backends[0].clone()
}
