//! # Helmsman
//!
//! **Graceful lifecycle management for HTTP services**
//!
//! Helmsman turns a plain HTTP server into a managed service:
//!
//! - 🧭 **One call to run** – [`Server::start`] blocks until the service
//!   is stopped, from any task, by [`Server::stop`]
//! - 🛑 **Signal-aware** – SIGTERM/SIGINT trigger the same graceful,
//!   timeout-bounded drain as an explicit stop
//! - 🩺 **Operable out of the box** – `/ping`, `/healthcheck` and
//!   `/shutdown` endpoints are bound on construction
//! - 🔌 **Pluggable** – shutdown hooks, custom health handlers, and
//!   overridable serve/drain strategies
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use helmsman::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::builder()
//!         .port(9090)
//!         .shutdown_timeout(std::time::Duration::from_secs(10))
//!         .build();
//!
//!     let server = Arc::new(Server::new(config, Router::new()));
//!     server.register_on_shutdown(|| println!("goodbye"));
//!     server.start().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/helmsman/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub use helmsman_server as server;

pub use helmsman_server::{Router, Server, ServerConfig, ServerError};

/// Commonly used types, importable in one line.
pub mod prelude {
    pub use helmsman_server::{
        HttpRequest, HttpResponse, Router, ServeStrategy, Server, ServerConfig, ServerError,
        ShutdownSignal, ShutdownStrategy,
    };
}
