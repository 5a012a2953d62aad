//! Pool configuration.

use std::fmt;
use std::time::Duration;

use mysql_client::BackendSpec;

use crate::error::PoolError;

/// Configuration for a [`Pool`](crate::Pool).
///
/// The embedded backend fields are a single-backend convenience consumed by
/// [`Pool::init_with_backend`](crate::Pool::init_with_backend); pools
/// fronting several backends configure the selector directly and ignore
/// them.
#[derive(Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Default backend host (single-backend mode).
    pub host: String,
    /// Default backend user.
    pub user: String,
    /// Default backend password.
    pub password: String,
    /// Default backend database.
    pub database: String,
    /// Default backend port.
    pub port: u16,

    /// Floor: the maintenance loop keeps at least this many sessions.
    pub min_connections: u32,
    /// Ceiling: the acquire path never grows the pool past this.
    pub max_connections: u32,
    /// Sessions opened eagerly at init, capped by `max_connections`.
    pub init_connections: u32,

    /// How long an acquire waits for a free session before giving up.
    pub acquire_timeout: Duration,
    /// Idle sessions older than this are evicted, floor permitting.
    pub idle_ttl: Duration,
    /// Interval between maintenance passes.
    pub health_period: Duration,

    /// Base delay of the reconnect backoff.
    pub reconnect_interval: Duration,
    /// Handshake attempts per reconnect cycle, and the statement retry
    /// budget.
    pub max_reconnect_attempts: u32,

    /// Log every statement at debug level.
    pub log_queries: bool,
    /// Record into the performance counters.
    pub enable_metrics: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            user: String::new(),
            password: String::new(),
            database: String::new(),
            port: 3306,
            min_connections: 5,
            max_connections: 20,
            init_connections: 5,
            acquire_timeout: Duration::from_secs(5),
            idle_ttl: Duration::from_secs(600),
            health_period: Duration::from_secs(30),
            reconnect_interval: Duration::from_secs(1),
            max_reconnect_attempts: 3,
            log_queries: false,
            enable_metrics: true,
        }
    }
}

impl PoolConfig {
    /// Configuration with the standard defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults plus the credentials of a single backend.
    pub fn for_backend(
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
            ..Self::default()
        }
    }

    /// Set the backend port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the pool floor.
    #[must_use]
    pub fn min_connections(mut self, count: u32) -> Self {
        self.min_connections = count;
        self
    }

    /// Set the pool ceiling.
    #[must_use]
    pub fn max_connections(mut self, count: u32) -> Self {
        self.max_connections = count;
        self
    }

    /// Set how many sessions init opens eagerly.
    #[must_use]
    pub fn init_connections(mut self, count: u32) -> Self {
        self.init_connections = count;
        self
    }

    /// Set the acquire timeout.
    #[must_use]
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set the idle TTL.
    #[must_use]
    pub fn idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = ttl;
        self
    }

    /// Set the maintenance interval.
    #[must_use]
    pub fn health_period(mut self, period: Duration) -> Self {
        self.health_period = period;
        self
    }

    /// Set the reconnect backoff base.
    #[must_use]
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Set the reconnect attempt budget.
    #[must_use]
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Enable statement logging.
    #[must_use]
    pub fn log_queries(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }

    /// Enable the performance counters.
    #[must_use]
    pub fn enable_metrics(mut self, enabled: bool) -> Self {
        self.enable_metrics = enabled;
        self
    }

    /// The embedded single-backend description, weight 1.
    #[must_use]
    pub fn backend_spec(&self) -> BackendSpec {
        BackendSpec::new(
            self.host.clone(),
            self.user.clone(),
            self.password.clone(),
            self.database.clone(),
        )
        .port(self.port)
    }

    /// Reject configurations the pool cannot run with.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.min_connections == 0 {
            return Err(PoolError::ConfigInvalid(
                "min_connections must be at least 1".into(),
            ));
        }
        if self.max_connections < self.min_connections {
            return Err(PoolError::ConfigInvalid(format!(
                "max_connections {} is below min_connections {}",
                self.max_connections, self.min_connections
            )));
        }
        if self.init_connections > self.max_connections {
            return Err(PoolError::ConfigInvalid(format!(
                "init_connections {} exceeds max_connections {}",
                self.init_connections, self.max_connections
            )));
        }
        if self.acquire_timeout.is_zero()
            || self.idle_ttl.is_zero()
            || self.health_period.is_zero()
        {
            return Err(PoolError::ConfigInvalid(
                "acquire_timeout, idle_ttl and health_period must all be non-zero".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("port", &self.port)
            .field("min_connections", &self.min_connections)
            .field("max_connections", &self.max_connections)
            .field("init_connections", &self.init_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("idle_ttl", &self.idle_ttl)
            .field("health_period", &self.health_period)
            .field("reconnect_interval", &self.reconnect_interval)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("log_queries", &self.log_queries)
            .field("enable_metrics", &self.enable_metrics)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PoolConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.port, 3306);
        assert_eq!(config.min_connections, 5);
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.init_connections, 5);
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
        assert_eq!(config.idle_ttl, Duration::from_secs(600));
        assert_eq!(config.health_period, Duration::from_secs(30));
        assert!(config.enable_metrics);
        assert!(!config.log_queries);
    }

    #[test]
    fn validation_rejects_bad_bounds() {
        assert!(PoolConfig::new().min_connections(0).validate().is_err());
        assert!(PoolConfig::new()
            .min_connections(10)
            .max_connections(5)
            .validate()
            .is_err());
        assert!(PoolConfig::new()
            .init_connections(30)
            .max_connections(20)
            .validate()
            .is_err());
        assert!(PoolConfig::new()
            .acquire_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(PoolConfig::new().idle_ttl(Duration::ZERO).validate().is_err());
        assert!(PoolConfig::new()
            .health_period(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn backend_spec_carries_the_embedded_endpoint() {
        let spec = PoolConfig::for_backend("db1", "app", "pw", "orders")
            .port(3307)
            .backend_spec();
        assert!(spec.is_endpoint("db1", 3307));
        assert_eq!(spec.weight, 1);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn debug_redacts_password() {
        let config = PoolConfig::for_backend("db1", "app", "hunter2", "orders");
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
