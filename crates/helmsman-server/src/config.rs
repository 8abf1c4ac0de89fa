//! Server configuration types.
//!
//! This module provides configuration for the lifecycle-managed server,
//! using the builder pattern for ergonomic construction. Unset fields
//! fall back to documented defaults.
//!
//! # Example
//!
//! ```rust
//! use helmsman_server::ServerConfig;
//! use std::time::Duration;
//!
//! let config = ServerConfig::builder()
//!     .port(8080)
//!     .shutdown_timeout(Duration::from_secs(30))
//!     .build();
//!
//! assert_eq!(config.port(), 8080);
//! ```

use std::time::Duration;

/// Default port the server listens on.
pub const DEFAULT_PORT: u16 = 9090;

/// Default timeout for graceful shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default read timeout.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(15);

/// Default write timeout.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(15);

/// Default ping endpoint path.
pub const DEFAULT_PING_PATH: &str = "/ping";

/// Default healthcheck endpoint path.
pub const DEFAULT_HEALTHCHECK_PATH: &str = "/healthcheck";

/// Default shutdown endpoint path.
pub const DEFAULT_SHUTDOWN_PATH: &str = "/shutdown";

/// Server configuration.
///
/// Immutable once applied: the [`Server`](crate::Server) reads it at
/// construction time and never writes it back. Use
/// [`ServerConfig::builder()`] to construct instances.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen port. Zero falls back to [`DEFAULT_PORT`].
    port: u16,

    /// Maximum time to wait for in-flight requests during shutdown.
    shutdown_timeout: Duration,

    /// HTTP header read timeout applied per connection.
    read_timeout: Duration,

    /// Per-request handler/response budget.
    write_timeout: Duration,

    /// Path of the ping (liveness) endpoint.
    ping_path: String,

    /// Path of the healthcheck endpoint.
    healthcheck_path: String,

    /// Path of the shutdown-trigger endpoint.
    shutdown_path: String,
}

impl ServerConfig {
    /// Creates a new configuration builder.
    ///
    /// # Example
    ///
    /// ```rust
    /// use helmsman_server::ServerConfig;
    ///
    /// let config = ServerConfig::builder().port(3000).build();
    /// ```
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Returns the configured listen port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the port the listener will actually bind, substituting
    /// [`DEFAULT_PORT`] when the configured value is zero.
    #[must_use]
    pub fn effective_port(&self) -> u16 {
        if self.port == 0 {
            DEFAULT_PORT
        } else {
            self.port
        }
    }

    /// Returns the graceful shutdown timeout.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Returns the read timeout.
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Returns the write timeout.
    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// Returns the ping endpoint path.
    #[must_use]
    pub fn ping_path(&self) -> &str {
        &self.ping_path
    }

    /// Returns the healthcheck endpoint path.
    #[must_use]
    pub fn healthcheck_path(&self) -> &str {
        &self.healthcheck_path
    }

    /// Returns the shutdown endpoint path.
    #[must_use]
    pub fn shutdown_path(&self) -> &str {
        &self.shutdown_path
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Clone)]
pub struct ServerConfigBuilder {
    port: u16,
    shutdown_timeout: Duration,
    read_timeout: Duration,
    write_timeout: Duration,
    ping_path: String,
    healthcheck_path: String,
    shutdown_path: String,
}

impl ServerConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            port: DEFAULT_PORT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            ping_path: DEFAULT_PING_PATH.to_string(),
            healthcheck_path: DEFAULT_HEALTHCHECK_PATH.to_string(),
            shutdown_path: DEFAULT_SHUTDOWN_PATH.to_string(),
        }
    }

    /// Sets the listen port.
    ///
    /// Zero is treated as "unset" and falls back to [`DEFAULT_PORT`]
    /// when the listener binds.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the graceful shutdown timeout.
    ///
    /// This is the maximum time the server waits for in-flight requests
    /// to complete during shutdown before forcing connections closed.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Sets the read timeout.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets the write timeout.
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Sets the ping endpoint path.
    ///
    /// An empty string falls back to [`DEFAULT_PING_PATH`].
    #[must_use]
    pub fn ping_path(mut self, path: impl Into<String>) -> Self {
        self.ping_path = path.into();
        self
    }

    /// Sets the healthcheck endpoint path.
    ///
    /// An empty string falls back to [`DEFAULT_HEALTHCHECK_PATH`].
    #[must_use]
    pub fn healthcheck_path(mut self, path: impl Into<String>) -> Self {
        self.healthcheck_path = path.into();
        self
    }

    /// Sets the shutdown endpoint path.
    ///
    /// An empty string falls back to [`DEFAULT_SHUTDOWN_PATH`].
    #[must_use]
    pub fn shutdown_path(mut self, path: impl Into<String>) -> Self {
        self.shutdown_path = path.into();
        self
    }

    /// Builds the [`ServerConfig`], substituting defaults for empty paths.
    #[must_use]
    pub fn build(self) -> ServerConfig {
        ServerConfig {
            port: self.port,
            shutdown_timeout: self.shutdown_timeout,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
            ping_path: default_if_empty(self.ping_path, DEFAULT_PING_PATH),
            healthcheck_path: default_if_empty(self.healthcheck_path, DEFAULT_HEALTHCHECK_PATH),
            shutdown_path: default_if_empty(self.shutdown_path, DEFAULT_SHUTDOWN_PATH),
        }
    }
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_if_empty(value: String, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}
