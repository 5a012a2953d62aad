//! Background maintenance: idle eviction, floor replenishment, and the
//! synchronous maintenance entry point.

mod common;

use std::thread;
use std::time::Duration;

use mysql_pool::PoolError;

#[test]
fn idle_sessions_age_out_to_the_floor() {
    common::init_tracing();
    let driver = common::driver();
    let (pool, _metrics) = common::pool_with(&driver);
    pool.init_with_backend(
        &common::config(2, 8, 4)
            .idle_ttl(Duration::from_secs(3))
            .health_period(Duration::from_secs(1)),
    )
    .unwrap();

    // Cycle all four sessions through a caller and park them again.
    let held: Vec<_> = (0..4).map(|_| pool.acquire().unwrap()).collect();
    drop(held);
    assert_eq!(pool.status().total, 4);

    // After 6 seconds every original session is past the 3 second TTL; the
    // worker evicts down to the floor and keeps it there.
    thread::sleep(Duration::from_secs(6));

    let status = pool.status();
    assert_eq!(status.total, 2, "floor must hold");
    assert_eq!(status.idle, 2);
    assert_eq!(status.active, 0);

    pool.shutdown();
}

#[test]
fn worker_replaces_sessions_that_died_while_parked() {
    common::init_tracing();
    let driver = common::driver();
    let (pool, _metrics) = common::pool_with(&driver);
    pool.init_with_backend(
        &common::config(2, 4, 2).health_period(Duration::from_millis(200)),
    )
    .unwrap();

    // Both parked sessions lose their transport.
    driver.sever_all();

    // Within a few periods the worker has evicted the dead pair and opened
    // replacements to hold the floor.
    thread::sleep(Duration::from_millis(900));

    let status = pool.status();
    assert_eq!(status.total, 2);
    assert_eq!(status.idle, 2);

    let session = pool.acquire().unwrap();
    assert!(session.is_valid_quietly());
    drop(session);

    pool.shutdown();
}

#[test]
fn manual_health_check_runs_the_same_pass() {
    common::init_tracing();
    let driver = common::driver();
    let (pool, _metrics) = common::pool_with(&driver);
    pool.init_with_backend(
        &common::config(1, 4, 3)
            .idle_ttl(Duration::from_millis(10))
            // Keep the background worker out of the way.
            .health_period(Duration::from_secs(3600)),
    )
    .unwrap();
    assert_eq!(pool.status().total, 3);

    thread::sleep(Duration::from_millis(50));
    pool.perform_health_check().unwrap();

    // Every session was past the TTL; the pass evicts and then replenishes
    // back to the floor.
    let status = pool.status();
    assert_eq!(status.total, 1);
    assert_eq!(status.idle, 1);

    pool.shutdown();
    assert!(matches!(
        pool.perform_health_check(),
        Err(PoolError::PoolStopped)
    ));
}

#[test]
fn worker_survives_an_unreachable_backend() {
    common::init_tracing();
    let driver = common::driver();
    let (pool, _metrics) = common::pool_with(&driver);
    pool.init_with_backend(
        &common::config(2, 4, 2).health_period(Duration::from_millis(100)),
    )
    .unwrap();

    // Kill the parked sessions and keep the backend down: replenishment
    // fails every pass, but the loop keeps running.
    driver.sever_all();
    driver.refuse_connects(true);
    thread::sleep(Duration::from_millis(500));
    assert_eq!(pool.status().total, 0);

    // Backend returns; the next pass restores the floor.
    driver.refuse_connects(false);
    thread::sleep(Duration::from_millis(400));
    let status = pool.status();
    assert_eq!(status.total, 2);
    assert_eq!(status.idle, 2);

    pool.shutdown();
}

#[test]
fn shutdown_stops_the_worker_promptly() {
    common::init_tracing();
    let driver = common::driver();
    let (pool, _metrics) = common::pool_with(&driver);
    // A one hour period: joining only works if shutdown interrupts the
    // worker's sleep instead of waiting it out.
    pool.init_with_backend(&common::config(1, 2, 1).health_period(Duration::from_secs(3600)))
        .unwrap();

    let started = std::time::Instant::now();
    pool.shutdown();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(driver.open_count(), 0);
}
