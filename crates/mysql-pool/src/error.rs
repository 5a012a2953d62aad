//! Pool-level error taxonomy.

use thiserror::Error;

use mysql_client::ClientError;

/// Errors surfaced by the pool and the backend selector.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Configuration rejected at init or reconfigure. Correct and retry.
    #[error("invalid pool configuration: {0}")]
    ConfigInvalid(String),

    /// Operation attempted on a pool that is not running.
    #[error("connection pool is not running")]
    PoolStopped,

    /// The deadline expired while waiting for a free session.
    #[error("timed out after {waited_ms} ms waiting for a free session")]
    AcquireTimeout {
        /// The timeout that was applied, in milliseconds.
        waited_ms: u64,
    },

    /// The selector has no backend to offer.
    #[error("no backend available for selection")]
    BackendUnavailable,

    /// Session-level failure, surfaced verbatim.
    #[error(transparent)]
    Client(#[from] ClientError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_pass_through() {
        let err: PoolError = ClientError::NotConnected.into();
        assert_eq!(err.to_string(), "session has no live server handle");
    }

    #[test]
    fn timeout_message_names_the_deadline() {
        let err = PoolError::AcquireTimeout { waited_ms: 200 };
        assert_eq!(
            err.to_string(),
            "timed out after 200 ms waiting for a free session"
        );
    }
}
