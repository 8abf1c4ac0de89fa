//! Server error types.
//!
//! All failures in this crate are terminal outcomes of a start/stop
//! cycle; nothing is retried automatically. The error type is `Clone`
//! and `PartialEq` so a single drain outcome can be broadcast to every
//! caller waiting on it and compared exactly in tests.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by the server lifecycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// The listener could not acquire its socket.
    #[error("failed to bind {addr}: {message}")]
    Bind {
        /// Address the listener attempted to bind.
        addr: String,
        /// Underlying bind failure.
        message: String,
    },

    /// `start` was called while a previous `start` is still in flight.
    #[error("server is already running")]
    AlreadyRunning,

    /// The underlying server handle was already shut down.
    ///
    /// The transport handle is single-cycle: once drained it cannot
    /// accept connections again.
    #[error("server is closed")]
    Closed,

    /// The graceful drain did not finish within the configured window.
    #[error("graceful shutdown timed out after {0:?}")]
    ShutdownTimeout(Duration),

    /// A registered shutdown handler reported a failure.
    #[error("shutdown failed: {0}")]
    Shutdown(String),

    /// I/O failure in the transport.
    #[error("i/o error: {0}")]
    Io(String),
}

impl ServerError {
    /// Creates a bind error for the given address.
    pub(crate) fn bind(addr: impl ToString, err: &std::io::Error) -> Self {
        Self::Bind {
            addr: addr.to_string(),
            message: err.to_string(),
        }
    }
}
