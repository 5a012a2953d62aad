//! Wire error type and the transport-class code set.

use thiserror::Error;

/// `CR_CONNECTION_ERROR`: can't connect through the local socket.
pub const CR_CONNECTION_ERROR: u32 = 2002;
/// `CR_CONN_HOST_ERROR`: can't connect to the server host.
pub const CR_CONN_HOST_ERROR: u32 = 2003;
/// `CR_SERVER_GONE_ERROR`: the server has gone away.
pub const CR_SERVER_GONE_ERROR: u32 = 2006;
/// `CR_SERVER_LOST`: connection lost during a query.
pub const CR_SERVER_LOST: u32 = 2013;
/// `CR_MALFORMED_PACKET`: malformed packet on the stream.
pub const CR_MALFORMED_PACKET: u32 = 2027;
/// `CR_SERVER_LOST_EXTENDED`: connection lost, extended variant.
pub const CR_SERVER_LOST_EXTENDED: u32 = 2055;

/// The codes that mark a session's transport as unusable and therefore
/// warrant an automatic reconnect. This set is fixed; every other code
/// propagates to the caller untouched.
pub const TRANSPORT_ERROR_CODES: [u32; 6] = [
    CR_CONNECTION_ERROR,
    CR_CONN_HOST_ERROR,
    CR_SERVER_GONE_ERROR,
    CR_SERVER_LOST,
    CR_MALFORMED_PACKET,
    CR_SERVER_LOST_EXTENDED,
];

/// Whether `code` belongs to the transport-class set.
#[must_use]
pub fn is_transport_error(code: u32) -> bool {
    TRANSPORT_ERROR_CODES.contains(&code)
}

/// Error reported by the wire driver.
///
/// Carries the MySQL error code alongside the library- or server-provided
/// message. Client-side codes live in the 2000 range; server-side codes
/// (syntax errors, constraint violations, ...) come through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (code {code})")]
pub struct WireError {
    /// MySQL error code.
    pub code: u32,
    /// Human-readable message.
    pub message: String,
}

impl WireError {
    /// Build an error from a code and message.
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Whether this error marks the transport as unusable.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        is_transport_error(self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_set_is_exact() {
        for code in TRANSPORT_ERROR_CODES {
            assert!(is_transport_error(code), "code {code} should be transport");
        }
        // Server-side errors never trigger the reconnect path.
        assert!(!is_transport_error(1064)); // syntax error
        assert!(!is_transport_error(1062)); // duplicate key
        assert!(!is_transport_error(0));
        assert!(!is_transport_error(2000));
    }

    #[test]
    fn wire_error_display_includes_code() {
        let err = WireError::new(CR_SERVER_GONE_ERROR, "MySQL server has gone away");
        assert_eq!(
            err.to_string(),
            "MySQL server has gone away (code 2006)"
        );
        assert!(err.is_transport());
    }
}
