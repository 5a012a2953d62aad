//! Client-side error taxonomy.

use thiserror::Error;

use mysql_wire::WireError;

/// Errors produced by sessions and result handles.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The handshake against a backend failed.
    #[error("connect to {host}:{port} failed: {source}")]
    ConnectFailed {
        /// Backend host.
        host: String,
        /// Backend port.
        port: u16,
        /// Underlying wire error.
        source: WireError,
    },

    /// Every reconnect attempt failed; the session is left without a
    /// handle.
    #[error("reconnect abandoned after {attempts} attempts")]
    ReconnectExhausted {
        /// Number of handshakes attempted.
        attempts: u32,
    },

    /// The server reported an error for a statement. May be
    /// transport-class (and recovered internally) or not.
    #[error("statement failed: {0}")]
    SqlExecution(WireError),

    /// The statement kept failing with transport-class errors until the
    /// retry budget ran out.
    #[error("statement abandoned after {attempts} attempts: {last}")]
    ExecutionExhausted {
        /// Attempts made, including the first.
        attempts: u32,
        /// The last transport error observed.
        last: WireError,
        /// The statement that was given up on.
        sql: String,
    },

    /// The session has no live server handle.
    #[error("session has no live server handle")]
    NotConnected,

    /// A cell was accessed before the first successful `advance()`.
    #[error("no current row; call advance() first")]
    NoCurrentRow,

    /// A cell index outside `[0, field_count)` was accessed.
    #[error("field index {index} out of range, field count is {count}")]
    OutOfRange {
        /// Requested index.
        index: usize,
        /// Field count of the result.
        count: usize,
    },

    /// A field name that does not occur in the result was looked up.
    #[error("unknown field name: {0}")]
    UnknownField(String),
}

impl ClientError {
    /// The MySQL error code attached to this error, if any.
    #[must_use]
    pub fn sql_code(&self) -> Option<u32> {
        match self {
            Self::ConnectFailed { source, .. } => Some(source.code),
            Self::SqlExecution(err) => Some(err.code),
            Self::ExecutionExhausted { last, .. } => Some(last.code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mysql_wire::error::CR_SERVER_GONE_ERROR;

    #[test]
    fn sql_code_extraction() {
        let err = ClientError::SqlExecution(WireError::new(1064, "syntax error"));
        assert_eq!(err.sql_code(), Some(1064));

        let err = ClientError::ExecutionExhausted {
            attempts: 4,
            last: WireError::new(CR_SERVER_GONE_ERROR, "gone"),
            sql: "SELECT 1".into(),
        };
        assert_eq!(err.sql_code(), Some(2006));

        assert_eq!(ClientError::NoCurrentRow.sql_code(), None);
    }
}
