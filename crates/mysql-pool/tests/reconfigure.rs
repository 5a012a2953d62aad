//! Dynamic reconfiguration: adjust, shrink, and the limit/timeout setters.

mod common;

use std::time::Duration;

use mysql_pool::{PoolError, Strategy};

#[test]
fn shrinking_the_ceiling_closes_idle_sessions_only() {
    common::init_tracing();
    let driver = common::driver();
    let (pool, _metrics) = common::pool_with(&driver);
    pool.init_with_backend(&common::config(1, 6, 5)).unwrap();
    assert_eq!(pool.status().total, 5);

    let held = pool.acquire().unwrap();
    assert_eq!(pool.status().idle, 4);

    let mut config = pool.config();
    config.max_connections = 2;
    config.init_connections = 2;
    pool.adjust(&config).unwrap();

    // Three idle sessions were closed; the held one was left alone.
    let status = pool.status();
    assert_eq!(status.total, 2);
    assert_eq!(status.idle, 1);
    assert_eq!(status.active, 1);
    assert_eq!(status.max, 2);
    assert!(held.is_valid_quietly());

    drop(held);
    pool.shutdown();
}

#[test]
fn overshoot_after_shrink_is_settled_on_release() {
    common::init_tracing();
    let driver = common::driver();
    let (pool, _metrics) = common::pool_with(&driver);
    pool.init_with_backend(&common::config(1, 4, 3)).unwrap();

    let a = pool.acquire().unwrap();
    let b = pool.acquire().unwrap();
    assert_eq!(pool.status().total, 3);

    let mut config = pool.config();
    config.max_connections = 1;
    config.init_connections = 1;
    pool.adjust(&config).unwrap();

    // Only the single idle session could be closed.
    assert_eq!(pool.status().total, 2);

    // Releases settle the overshoot: the first returned session is closed
    // outright, the second fits under the new ceiling and is parked.
    drop(a);
    assert_eq!(pool.status().total, 1);
    drop(b);
    let status = pool.status();
    assert_eq!(status.total, 1);
    assert_eq!(status.idle, 1);

    pool.shutdown();
}

#[test]
fn explicit_shrink_closes_idle_sessions_down_to_target() {
    common::init_tracing();
    let driver = common::driver();
    let (pool, _metrics) = common::pool_with(&driver);
    pool.init_with_backend(&common::config(1, 6, 4)).unwrap();
    assert_eq!(pool.status().total, 4);

    pool.shrink_to(2);
    let status = pool.status();
    assert_eq!(status.total, 2);
    assert_eq!(status.idle, 2);

    // Shrinking to a target the pool is already under changes nothing.
    pool.shrink_to(10);
    assert_eq!(pool.status().total, 2);

    pool.shutdown();
    // A stopped pool ignores shrink requests.
    pool.shrink_to(0);
}

#[test]
fn connection_limit_setter_validates() {
    common::init_tracing();
    let driver = common::driver();
    let (pool, _metrics) = common::pool_with(&driver);
    pool.init_with_backend(&common::config(2, 4, 2)).unwrap();

    assert!(matches!(
        pool.set_connection_limits(5, 2),
        Err(PoolError::ConfigInvalid(_))
    ));

    pool.set_connection_limits(1, 3).unwrap();
    let status = pool.status();
    assert_eq!(status.min, 1);
    assert_eq!(status.max, 3);

    pool.shutdown();
}

#[test]
fn timeout_setter_rejects_zero_values() {
    common::init_tracing();
    let driver = common::driver();
    let (pool, _metrics) = common::pool_with(&driver);
    pool.init_with_backend(&common::config(1, 2, 1)).unwrap();

    let second = Duration::from_secs(1);
    for (a, b, c) in [
        (Duration::ZERO, second, second),
        (second, Duration::ZERO, second),
        (second, second, Duration::ZERO),
    ] {
        assert!(matches!(
            pool.set_timeout_settings(a, b, c),
            Err(PoolError::ConfigInvalid(_))
        ));
    }

    pool.set_timeout_settings(
        Duration::from_secs(2),
        Duration::from_secs(120),
        Duration::from_secs(15),
    )
    .unwrap();
    let config = pool.config();
    assert_eq!(config.acquire_timeout, Duration::from_secs(2));
    assert_eq!(config.idle_ttl, Duration::from_secs(120));
    assert_eq!(config.health_period, Duration::from_secs(15));

    pool.shutdown();
}

#[test]
fn invalid_adjust_leaves_the_config_untouched() {
    common::init_tracing();
    let driver = common::driver();
    let (pool, _metrics) = common::pool_with(&driver);
    pool.init_with_backend(&common::config(2, 4, 2)).unwrap();
    let before = pool.config();

    let mut broken = before.clone();
    broken.min_connections = 0;
    assert!(matches!(
        pool.adjust(&broken),
        Err(PoolError::ConfigInvalid(_))
    ));
    assert_eq!(pool.config(), before);

    pool.shutdown();
}

#[test]
fn backends_can_change_at_runtime() {
    common::init_tracing();
    let driver = common::driver();
    let (pool, _metrics) = common::pool_with(&driver);
    pool.init_with_backend(&common::config(1, 4, 1)).unwrap();

    let selector = pool.selector();
    selector
        .add(mysql_pool::BackendSpec::new("db2", "app", "secret", "orders").weight(2))
        .unwrap();
    assert_eq!(selector.len(), 2);

    selector.set_strategy(Strategy::RoundRobin);
    assert_eq!(selector.strategy(), Strategy::RoundRobin);

    // New sessions alternate across both backends now.
    let a = pool.acquire().unwrap();
    let b = pool.acquire().unwrap();
    let c = pool.acquire().unwrap();
    let hosts: Vec<String> = [&a, &b, &c]
        .iter()
        .map(|s| s.backend().host.clone())
        .collect();
    assert!(hosts.contains(&"db2".to_string()));

    assert!(selector.remove("db2", 3306));
    assert_eq!(selector.len(), 1);
    assert!(selector.set_weight("db1", 3306, 5));

    let report = selector.status_report();
    assert!(report.contains("backends: 1"));
    assert!(report.contains("weight=5"));

    drop((a, b, c));
    pool.shutdown();
}
