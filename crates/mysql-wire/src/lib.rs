//! # mysql-wire
//!
//! Wire-level contract between the connection pool and the MySQL client
//! library that actually speaks the protocol.
//!
//! The pool never implements the client/server protocol itself. It drives
//! any library that can open an authenticated session, ping it, execute
//! text statements, and hand back materialized result buffers. This crate
//! pins that seam down:
//!
//! - the [`Driver`], [`Conn`] and [`ResultBuffer`] traits,
//! - [`ConnectOptions`], the knobs applied to every handshake,
//! - the fixed set of client error codes that mark a session's transport
//!   as unusable ([`TRANSPORT_ERROR_CODES`]),
//! - an in-memory [`mock`] driver used by the workspace test suites.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod driver;
pub mod error;
pub mod mock;

pub use driver::{
    Conn, ConnectOptions, Driver, ResultBuffer, DEFAULT_CHARSET, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_READ_TIMEOUT, DEFAULT_WRITE_TIMEOUT,
};
pub use error::{is_transport_error, WireError, TRANSPORT_ERROR_CODES};
