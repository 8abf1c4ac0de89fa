//! Overridable serve and shutdown strategies.
//!
//! The lifecycle controller delegates "run the listener" and "drain the
//! server" to strategy objects so embedders can replace either without
//! touching the coordination protocol. Plain async closures satisfy the
//! traits through blanket impls:
//!
//! ```rust
//! use helmsman_server::{HttpServer, ServeStrategy};
//! use std::sync::Arc;
//!
//! let strategy = |server: Arc<HttpServer>| async move {
//!     // wrap, instrument, or replace the default accept loop
//!     server.listen_and_serve().await
//! };
//! let _boxed: Box<dyn ServeStrategy> = Box::new(strategy);
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ServerError;
use crate::transport::HttpServer;

/// Future returned by strategy invocations.
pub type StrategyFuture = Pin<Box<dyn Future<Output = Result<(), ServerError>> + Send>>;

/// Strategy for running the underlying server.
///
/// The returned future should resolve when the server stops serving;
/// resolving with an error injects an internal-failure trigger into the
/// lifecycle controller.
pub trait ServeStrategy: Send + Sync {
    /// Runs the server until it stops accepting connections.
    fn serve(&self, server: Arc<HttpServer>) -> StrategyFuture;
}

/// Strategy for draining the underlying server.
///
/// Receives the live server handle and the configured drain deadline.
/// The controller bounds the invocation with that same deadline, so a
/// strategy that overruns it is abandoned and the remaining connections
/// are forced closed.
pub trait ShutdownStrategy: Send + Sync {
    /// Drains the server, reporting the shutdown outcome.
    fn shutdown(&self, server: Arc<HttpServer>, timeout: Duration) -> StrategyFuture;
}

impl<F, Fut> ServeStrategy for F
where
    F: Fn(Arc<HttpServer>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ServerError>> + Send + 'static,
{
    fn serve(&self, server: Arc<HttpServer>) -> StrategyFuture {
        Box::pin(self(server))
    }
}

impl<F, Fut> ShutdownStrategy for F
where
    F: Fn(Arc<HttpServer>, Duration) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ServerError>> + Send + 'static,
{
    fn shutdown(&self, server: Arc<HttpServer>, timeout: Duration) -> StrategyFuture {
        Box::pin(self(server, timeout))
    }
}

/// Default serve strategy: the handle's own blocking accept loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultServe;

impl ServeStrategy for DefaultServe {
    fn serve(&self, server: Arc<HttpServer>) -> StrategyFuture {
        Box::pin(async move { server.listen_and_serve().await })
    }
}

/// Default shutdown strategy: the handle's own graceful drain.
///
/// The deadline parameter is unused here; the controller already bounds
/// the drain externally.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultShutdown;

impl ShutdownStrategy for DefaultShutdown {
    fn shutdown(&self, server: Arc<HttpServer>, _timeout: Duration) -> StrategyFuture {
        Box::pin(async move { server.shutdown().await })
    }
}
