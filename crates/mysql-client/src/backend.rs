//! Backend endpoint description.

use std::fmt;

use mysql_wire::ConnectOptions;

/// Immutable description of one database endpoint.
///
/// Identity is `(host, port)`; the weight only matters to weighted backend
/// selection.
#[derive(Clone, PartialEq, Eq)]
pub struct BackendSpec {
    /// Server hostname or IP address.
    pub host: String,
    /// Authentication user.
    pub user: String,
    /// Authentication password.
    pub password: String,
    /// Default database.
    pub database: String,
    /// Server port.
    pub port: u16,
    /// Relative selection weight, at least 1.
    pub weight: u32,
}

impl BackendSpec {
    /// A backend on the standard port with weight 1.
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            password: password.into(),
            database: database.into(),
            port: 3306,
            weight: 1,
        }
    }

    /// Set the server port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the selection weight.
    #[must_use]
    pub fn weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// Whether this spec describes the endpoint `(host, port)`.
    #[must_use]
    pub fn is_endpoint(&self, host: &str, port: u16) -> bool {
        self.host == host && self.port == port
    }

    /// Check for the fields a handshake cannot do without.
    pub fn validate(&self) -> Result<(), String> {
        if self.host.is_empty() {
            return Err("backend host must not be empty".into());
        }
        if self.user.is_empty() {
            return Err("backend user must not be empty".into());
        }
        if self.database.is_empty() {
            return Err("backend database must not be empty".into());
        }
        if self.port == 0 {
            return Err("backend port must be non-zero".into());
        }
        if self.weight == 0 {
            return Err("backend weight must be at least 1".into());
        }
        Ok(())
    }

    /// Handshake options for this endpoint, with the standard timeouts and
    /// charset.
    #[must_use]
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions::new(
            self.host.clone(),
            self.port,
            self.user.clone(),
            self.password.clone(),
            self.database.clone(),
        )
    }
}

impl fmt::Display for BackendSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}:{}/{} (weight={})",
            self.user, self.host, self.port, self.database, self.weight
        )
    }
}

impl fmt::Debug for BackendSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendSpec")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("port", &self.port)
            .field("weight", &self.weight)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_builders() {
        let spec = BackendSpec::new("db1", "app", "secret", "orders");
        assert_eq!(spec.port, 3306);
        assert_eq!(spec.weight, 1);

        let spec = spec.port(3307).weight(4);
        assert_eq!(spec.port, 3307);
        assert_eq!(spec.weight, 4);
        assert!(spec.is_endpoint("db1", 3307));
        assert!(!spec.is_endpoint("db1", 3306));
    }

    #[test]
    fn validation_rejects_incomplete_specs() {
        assert!(BackendSpec::new("db1", "app", "pw", "orders").validate().is_ok());
        assert!(BackendSpec::new("", "app", "pw", "orders").validate().is_err());
        assert!(BackendSpec::new("db1", "", "pw", "orders").validate().is_err());
        assert!(BackendSpec::new("db1", "app", "pw", "").validate().is_err());
        assert!(BackendSpec::new("db1", "app", "pw", "orders")
            .port(0)
            .validate()
            .is_err());
        assert!(BackendSpec::new("db1", "app", "pw", "orders")
            .weight(0)
            .validate()
            .is_err());
    }

    #[test]
    fn debug_redacts_password() {
        let spec = BackendSpec::new("db1", "app", "hunter2", "orders");
        let rendered = format!("{spec:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
