//! Driver traits and handshake options.

use std::time::Duration;

use crate::error::WireError;

/// TCP connect timeout applied to every handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Socket read timeout applied to every session.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);
/// Socket write timeout applied to every session.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);
/// Connection character set. The 4-byte variant so the full Unicode range
/// round-trips.
pub const DEFAULT_CHARSET: &str = "utf8mb4";

/// Options applied to a session before and during the handshake.
///
/// A C-style client sets these one `set_option` call at a time; here they
/// travel as one struct handed to [`Driver::connect`].
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Server hostname or IP address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Authentication user.
    pub user: String,
    /// Authentication password.
    pub password: String,
    /// Default database selected after authentication.
    pub database: String,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Socket read timeout.
    pub read_timeout: Duration,
    /// Socket write timeout.
    pub write_timeout: Duration,
    /// Connection character set.
    pub charset: &'static str,
}

impl ConnectOptions {
    /// Options for one endpoint with the standard timeouts and charset.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            password: password.into(),
            database: database.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            charset: DEFAULT_CHARSET,
        }
    }
}

/// Factory for live protocol sessions.
///
/// Implementations are shared across the pool and its health worker, so
/// they must be thread-safe.
pub trait Driver: Send + Sync + 'static {
    /// Open and authenticate one session against `opts`.
    fn connect(&self, opts: &ConnectOptions) -> Result<Box<dyn Conn>, WireError>;
}

/// One live, authenticated protocol session.
///
/// Implementations close the underlying stream when the box is dropped.
pub trait Conn: Send {
    /// Lightweight liveness probe.
    fn ping(&mut self) -> Result<(), WireError>;

    /// Send one text statement and wait for the server status.
    fn execute(&mut self, sql: &str) -> Result<(), WireError>;

    /// Materialize the pending result set, if the last statement produced
    /// one. `Ok(None)` together with a zero [`field_count`] means the
    /// statement was row-count-only; `Ok(None)` with a non-zero field count
    /// is a store failure and is reported as an error by the caller.
    ///
    /// [`field_count`]: Conn::field_count
    fn store_result(&mut self) -> Result<Option<Box<dyn ResultBuffer>>, WireError>;

    /// Column count of the last executed statement.
    fn field_count(&self) -> u32;

    /// Rows affected by the last executed statement.
    fn affected_rows(&self) -> u64;

    /// Escape `s` for embedding in a quoted SQL literal.
    fn escape(&self, s: &str) -> String;
}

/// A fully materialized result set.
///
/// Rows are randomly addressable, which is what makes cursor rewind
/// possible. The buffer is freed exactly once, on drop.
pub trait ResultBuffer: Send {
    /// Column names, in select-list order.
    fn field_names(&self) -> &[String];

    /// Number of materialized rows.
    fn row_count(&self) -> u64;

    /// Cells of row `idx`, or `None` past the end. A `None` cell is SQL
    /// NULL.
    fn row(&self, idx: u64) -> Option<&[Option<String>]>;
}
