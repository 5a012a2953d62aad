//! Transparent reconnect behavior as seen through the pool.

mod common;

use mysql_pool::ClientError;
use mysql_wire::error::CR_SERVER_GONE_ERROR;

#[test]
fn transport_error_recovers_transparently() {
    common::init_tracing();
    let driver = common::driver();
    let (pool, metrics) = common::pool_with(&driver);
    pool.init_with_backend(&common::config(1, 2, 1).max_reconnect_attempts(2))
        .unwrap();

    let session = pool.acquire().unwrap();

    // The next statement hits a dead transport; the session reconnects and
    // retries without the caller noticing.
    driver.fail_next_execute(CR_SERVER_GONE_ERROR, "MySQL server has gone away");
    let mut rows = session.execute_query("SELECT 1").unwrap();
    assert!(rows.advance());
    assert_eq!(rows.get_int(0).unwrap(), 1);

    let snapshot = metrics.snapshot();
    assert!(snapshot.reconnect_attempts >= 1);
    assert!(snapshot.reconnect_successes >= 1);
    assert_eq!(snapshot.queries_executed, 1);
    assert_eq!(snapshot.queries_failed, 0);

    drop(session);
    pool.shutdown();
}

#[test]
fn server_side_errors_do_not_reconnect() {
    common::init_tracing();
    let driver = common::driver();
    let (pool, metrics) = common::pool_with(&driver);
    pool.init_with_backend(&common::config(1, 2, 1)).unwrap();

    let session = pool.acquire().unwrap();
    driver.fail_next_execute(1064, "You have an error in your SQL syntax");

    let err = session.execute_query("SELEC 1").unwrap_err();
    assert!(matches!(err, ClientError::SqlExecution(_)));
    assert_eq!(err.sql_code(), Some(1064));

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.reconnect_attempts, 0);
    assert_eq!(snapshot.queries_failed, 1);

    drop(session);
    pool.shutdown();
}

#[test]
fn severed_handle_recovers_iff_the_budget_suffices() {
    common::init_tracing();
    let driver = common::driver();
    driver.on_update("UPDATE t SET x = 1", 1);
    let (pool, _metrics) = common::pool_with(&driver);
    pool.init_with_backend(&common::config(1, 2, 1).max_reconnect_attempts(2))
        .unwrap();

    let session = pool.acquire().unwrap();

    // Backend comes back: reconnect plus retry succeed within the budget.
    driver.sever_all();
    assert_eq!(session.execute_update("UPDATE t SET x = 1").unwrap(), 1);

    // Backend stays down: the budget runs out.
    driver.sever_all();
    driver.refuse_connects(true);
    let err = session.execute_update("UPDATE t SET x = 1").unwrap_err();
    match err {
        ClientError::ExecutionExhausted { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected ExecutionExhausted, got {other:?}"),
    }

    driver.refuse_connects(false);
    drop(session);
    pool.shutdown();
}

#[test]
fn dead_session_released_below_floor_is_replaced() {
    common::init_tracing();
    let driver = common::driver();
    let (pool, _metrics) = common::pool_with(&driver);
    pool.init_with_backend(&common::config(1, 2, 1)).unwrap();

    let session = pool.acquire().unwrap();
    let doomed_id = session.id().to_string();

    // Kill the held session's transport, then return it. The release path
    // closes it and synchronously opens a replacement to hold the floor.
    driver.sever_all();
    drop(session);

    let status = pool.status();
    assert_eq!(status.total, 1);
    assert_eq!(status.idle, 1);

    let replacement = pool.acquire().unwrap();
    assert_ne!(replacement.id(), doomed_id);
    assert!(replacement.is_valid_quietly());

    drop(replacement);
    pool.shutdown();
}
