//! In-memory driver for tests.
//!
//! Stands in for a real wire library in the workspace test suites:
//! statements are answered from a scripted table, and the harness can
//! inject handshake failures, execution failures, and severed transports.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::driver::{Conn, ConnectOptions, Driver, ResultBuffer};
use crate::error::{WireError, CR_CONN_HOST_ERROR, CR_SERVER_GONE_ERROR, CR_SERVER_LOST};

#[derive(Debug, Clone)]
enum Script {
    Rows {
        fields: Vec<String>,
        rows: Vec<Vec<Option<String>>>,
    },
    Update {
        affected: u64,
    },
}

#[derive(Default)]
struct MockShared {
    scripts: Mutex<HashMap<String, Script>>,
    connect_errors: Mutex<VecDeque<WireError>>,
    execute_errors: Mutex<VecDeque<WireError>>,
    refuse_connects: AtomicBool,
    /// Bumped by `sever_all`; sessions opened before the bump are dead.
    epoch: AtomicU64,
    connects: AtomicU64,
    open: AtomicUsize,
}

/// Scriptable in-memory [`Driver`].
///
/// Cloning is cheap and clones share all state, so a test can keep one
/// handle for scripting while the pool owns another.
#[derive(Clone, Default)]
pub struct MockDriver {
    shared: Arc<MockShared>,
}

impl MockDriver {
    /// A driver that accepts every handshake and answers every statement
    /// as a zero-row update until scripted otherwise.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `sql` with a materialized result set. All cells non-NULL.
    pub fn on_query(&self, sql: &str, fields: &[&str], rows: &[&[&str]]) {
        let rows = rows
            .iter()
            .map(|r| r.iter().map(|c| Some((*c).to_string())).collect())
            .collect();
        self.on_query_nullable(sql, fields, rows);
    }

    /// Answer `sql` with a materialized result set that may contain NULLs.
    pub fn on_query_nullable(
        &self,
        sql: &str,
        fields: &[&str],
        rows: Vec<Vec<Option<String>>>,
    ) {
        self.shared.scripts.lock().insert(
            sql.to_string(),
            Script::Rows {
                fields: fields.iter().map(|f| (*f).to_string()).collect(),
                rows,
            },
        );
    }

    /// Answer `sql` with an affected-row count.
    pub fn on_update(&self, sql: &str, affected: u64) {
        self.shared
            .scripts
            .lock()
            .insert(sql.to_string(), Script::Update { affected });
    }

    /// Fail the next handshake with `code`/`message`.
    pub fn fail_next_connect(&self, code: u32, message: &str) {
        self.shared
            .connect_errors
            .lock()
            .push_back(WireError::new(code, message));
    }

    /// Refuse every handshake until called again with `false`.
    pub fn refuse_connects(&self, refuse: bool) {
        self.shared.refuse_connects.store(refuse, Ordering::SeqCst);
    }

    /// Fail the next statement executed on any session with `code`.
    pub fn fail_next_execute(&self, code: u32, message: &str) {
        self.shared
            .execute_errors
            .lock()
            .push_back(WireError::new(code, message));
    }

    /// Kill the transport under every currently open session. Sessions
    /// opened afterwards are healthy.
    pub fn sever_all(&self) {
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Handshakes accepted over the driver's lifetime.
    #[must_use]
    pub fn connect_count(&self) -> u64 {
        self.shared.connects.load(Ordering::SeqCst)
    }

    /// Sessions currently open (not yet dropped).
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.shared.open.load(Ordering::SeqCst)
    }
}

impl Driver for MockDriver {
    fn connect(&self, opts: &ConnectOptions) -> Result<Box<dyn Conn>, WireError> {
        if let Some(err) = self.shared.connect_errors.lock().pop_front() {
            return Err(err);
        }
        if self.shared.refuse_connects.load(Ordering::SeqCst) {
            return Err(WireError::new(
                CR_CONN_HOST_ERROR,
                format!(
                    "Can't connect to MySQL server on '{}:{}'",
                    opts.host, opts.port
                ),
            ));
        }
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        self.shared.open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConn {
            epoch: self.shared.epoch.load(Ordering::SeqCst),
            shared: Arc::clone(&self.shared),
            pending: None,
            field_count: 0,
            affected_rows: 0,
        }))
    }
}

struct MockConn {
    shared: Arc<MockShared>,
    epoch: u64,
    pending: Option<(Vec<String>, Vec<Vec<Option<String>>>)>,
    field_count: u32,
    affected_rows: u64,
}

impl MockConn {
    fn severed(&self) -> bool {
        self.epoch < self.shared.epoch.load(Ordering::SeqCst)
    }
}

impl Conn for MockConn {
    fn ping(&mut self) -> Result<(), WireError> {
        if self.severed() {
            return Err(WireError::new(
                CR_SERVER_GONE_ERROR,
                "MySQL server has gone away",
            ));
        }
        Ok(())
    }

    fn execute(&mut self, sql: &str) -> Result<(), WireError> {
        if self.severed() {
            return Err(WireError::new(
                CR_SERVER_LOST,
                "Lost connection to MySQL server during query",
            ));
        }
        if let Some(err) = self.shared.execute_errors.lock().pop_front() {
            return Err(err);
        }
        match self.shared.scripts.lock().get(sql) {
            Some(Script::Rows { fields, rows }) => {
                self.field_count = fields.len() as u32;
                self.affected_rows = 0;
                self.pending = Some((fields.clone(), rows.clone()));
            }
            Some(Script::Update { affected }) => {
                self.field_count = 0;
                self.affected_rows = *affected;
                self.pending = None;
            }
            None => {
                self.field_count = 0;
                self.affected_rows = 0;
                self.pending = None;
            }
        }
        Ok(())
    }

    fn store_result(&mut self) -> Result<Option<Box<dyn ResultBuffer>>, WireError> {
        Ok(self
            .pending
            .take()
            .map(|(fields, rows)| Box::new(MockResultBuffer { fields, rows }) as Box<dyn ResultBuffer>))
    }

    fn field_count(&self) -> u32 {
        self.field_count
    }

    fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    fn escape(&self, s: &str) -> String {
        escape_literal(s)
    }
}

impl Drop for MockConn {
    fn drop(&mut self) {
        self.shared.open.fetch_sub(1, Ordering::SeqCst);
    }
}

struct MockResultBuffer {
    fields: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl ResultBuffer for MockResultBuffer {
    fn field_names(&self) -> &[String] {
        &self.fields
    }

    fn row_count(&self) -> u64 {
        self.rows.len() as u64
    }

    fn row(&self, idx: u64) -> Option<&[Option<String>]> {
        self.rows.get(idx as usize).map(Vec::as_slice)
    }
}

/// MySQL-style escaping for quoted literals: NUL, newline, carriage
/// return, backslash, both quote characters and Ctrl-Z are
/// backslash-escaped.
#[must_use]
pub fn escape_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\x1a' => out.push_str("\\Z"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> ConnectOptions {
        ConnectOptions::new("db1", 3306, "app", "secret", "orders")
    }

    #[test]
    fn scripted_query_round_trip() {
        let driver = MockDriver::new();
        driver.on_query("SELECT 1", &["1"], &[&["1"]]);

        let mut conn = driver.connect(&opts()).unwrap();
        conn.execute("SELECT 1").unwrap();
        assert_eq!(conn.field_count(), 1);

        let buf = conn.store_result().unwrap().expect("result set");
        assert_eq!(buf.field_names(), ["1".to_string()]);
        assert_eq!(buf.row_count(), 1);
        assert_eq!(buf.row(0).unwrap()[0].as_deref(), Some("1"));
        assert!(buf.row(1).is_none());
    }

    #[test]
    fn unscripted_statement_is_zero_row_update() {
        let driver = MockDriver::new();
        let mut conn = driver.connect(&opts()).unwrap();
        conn.execute("SET NAMES utf8mb4").unwrap();
        assert_eq!(conn.field_count(), 0);
        assert_eq!(conn.affected_rows(), 0);
        assert!(conn.store_result().unwrap().is_none());
    }

    #[test]
    fn sever_kills_existing_sessions_only() {
        let driver = MockDriver::new();
        let mut old = driver.connect(&opts()).unwrap();
        driver.sever_all();
        assert_eq!(old.ping().unwrap_err().code, CR_SERVER_GONE_ERROR);

        let mut fresh = driver.connect(&opts()).unwrap();
        assert!(fresh.ping().is_ok());
    }

    #[test]
    fn open_count_tracks_drops() {
        let driver = MockDriver::new();
        let a = driver.connect(&opts()).unwrap();
        let b = driver.connect(&opts()).unwrap();
        assert_eq!(driver.open_count(), 2);
        drop(a);
        assert_eq!(driver.open_count(), 1);
        drop(b);
        assert_eq!(driver.open_count(), 0);
        assert_eq!(driver.connect_count(), 2);
    }

    #[test]
    fn escape_covers_mysql_special_characters() {
        assert_eq!(escape_literal("plain"), "plain");
        assert_eq!(escape_literal("it's"), "it\\'s");
        assert_eq!(
            escape_literal("a\\b\n\r\"\0\x1a"),
            "a\\\\b\\n\\r\\\"\\0\\Z"
        );
    }
}
