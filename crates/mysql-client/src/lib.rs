//! # mysql-client
//!
//! Session layer for the connection pool.
//!
//! A [`Session`] is one authenticated wire session against a single
//! backend. It survives transient transport faults by reconnecting with
//! exponential backoff and retrying the interrupted statement, and it
//! serializes every operation on a per-session mutex so a session can move
//! between the pool and callers without extra coordination.
//!
//! SELECT-shaped statements come back as a [`QueryResult`], a cursor over
//! a fully materialized result set with typed field access.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod backend;
pub mod error;
pub mod result;
pub mod session;

pub use backend::BackendSpec;
pub use error::ClientError;
pub use result::QueryResult;
pub use session::Session;
