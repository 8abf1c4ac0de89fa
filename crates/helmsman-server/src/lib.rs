//! # Helmsman Server
//!
//! HTTP service lifecycle management for the Helmsman toolkit.
//!
//! This crate wraps a Hyper HTTP/1.1 server in a lifecycle controller
//! that makes graceful, timeout-bounded shutdown the default:
//!
//! - A blocking [`Server::start`] / concurrent [`Server::stop`] pair
//! - OS termination signals (SIGTERM/SIGINT) trigger the same drain
//! - Built-in `/ping`, `/healthcheck` and `/shutdown` endpoints
//! - Shutdown hooks, custom health handlers, and strategy overrides
//!   for how the server is run and drained
//!
//! ## Example
//!
//! ```rust,ignore
//! use helmsman_server::{Router, Server, ServerConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::builder().port(8080).build();
//!     let server = Arc::new(Server::new(config, Router::new()));
//!
//!     server.register_on_shutdown(|| println!("draining"));
//!
//!     // Blocks until stopped by Server::stop, a termination signal,
//!     // or GET /shutdown.
//!     server.start().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/helmsman-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod router;
pub mod shutdown;
pub mod strategy;
pub mod transport;

mod endpoints;
mod hooks;
mod server;

#[cfg(test)]
mod testutil;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use error::ServerError;
pub use hooks::ShutdownHooks;
pub use router::{HttpRequest, HttpResponse, ResponseBody, RouteHandler, Router};
pub use server::Server;
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownSignal};
pub use strategy::{
    DefaultServe, DefaultShutdown, ServeStrategy, ShutdownStrategy, StrategyFuture,
};
pub use transport::HttpServer;
