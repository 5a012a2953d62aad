//! Shared scaffolding for the pool integration tests.

#![allow(dead_code)] // not every test binary uses every helper

use std::sync::Arc;
use std::time::Duration;

use mysql_pool::{Metrics, Pool, PoolConfig};
use mysql_wire::mock::MockDriver;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A mock backend that already answers `SELECT 1`.
pub fn driver() -> MockDriver {
    let driver = MockDriver::new();
    driver.on_query("SELECT 1", &["1"], &[&["1"]]);
    driver
}

/// Config against the mock backend with short test-friendly timeouts.
pub fn config(min: u32, max: u32, init: u32) -> PoolConfig {
    PoolConfig::for_backend("db1", "app", "secret", "orders")
        .min_connections(min)
        .max_connections(max)
        .init_connections(init)
        .acquire_timeout(Duration::from_secs(3))
        .reconnect_interval(Duration::from_millis(1))
}

/// A pool with isolated metrics over the given driver.
pub fn pool_with(driver: &MockDriver) -> (Pool, Arc<Metrics>) {
    let metrics = Arc::new(Metrics::new());
    let pool = Pool::with_metrics(Arc::new(driver.clone()), Arc::clone(&metrics));
    (pool, metrics)
}
