//! # mysql-pool
//!
//! Client-side connection pool for MySQL-protocol databases.
//!
//! The pool keeps a bounded set of live, authenticated sessions, hands one
//! to a caller on [`Pool::acquire`], and takes it back when the returned
//! [`PooledSession`] guard is dropped. One or several interchangeable
//! backends sit behind a pluggable [`BackendSelector`] (random,
//! round-robin, or weighted selection); sessions survive transient
//! transport faults by reconnecting with exponential backoff; a background
//! health worker evicts overdue idle sessions and keeps the pool at its
//! configured floor.
//!
//! ## Example
//!
//! ```rust,ignore
//! use mysql_pool::{Pool, PoolConfig};
//!
//! let pool = Pool::new(driver);
//! pool.init_with_backend(
//!     &PoolConfig::for_backend("db1", "app", "secret", "orders")
//!         .min_connections(5)
//!         .max_connections(20),
//! )?;
//!
//! let session = pool.acquire()?;
//! let mut rows = session.execute_query("SELECT id, name FROM users")?;
//! while rows.advance() {
//!     println!("{} {}", rows.get_long(0)?, rows.get_string(1)?);
//! }
//! // Dropping the guard returns the session to the pool.
//! drop(session);
//!
//! pool.shutdown();
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
mod health;
pub mod pool;
pub mod selector;

pub use config::PoolConfig;
pub use error::PoolError;
pub use pool::{Pool, PoolStatus, PooledSession};
pub use selector::{BackendSelector, Strategy};

// Session-layer types callers interact with through the pool.
pub use mysql_client::{BackendSpec, ClientError, QueryResult, Session};
pub use mysql_metrics::{Metrics, MetricsSnapshot};
