//! The underlying HTTP listener/server handle.
//!
//! [`HttpServer`] owns the TCP listener, the per-connection hyper state
//! machines, and the two shutdown phases:
//!
//! 1. **drain**: the listener stops accepting, in-flight connections
//!    switch to HTTP/1 graceful shutdown and are allowed to finish, and
//!    the registered on-shutdown hooks fire.
//! 2. **abort**: remaining connections are dropped. Entered only when
//!    the lifecycle controller's drain deadline elapses.
//!
//! The handle is single-cycle, like the transport it models: once
//! drained it cannot serve again and reports [`ServerError::Closed`].

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use parking_lot::{Mutex, RwLock};
use tokio::net::{TcpListener, TcpStream};

use crate::error::ServerError;
use crate::hooks::ShutdownHooks;
use crate::router::{HttpResponse, Router};
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// The live server handle managed by the lifecycle controller.
///
/// Exposed through [`Server::http_server`](crate::Server::http_server)
/// for advanced configuration: registering on-shutdown hooks, inspecting
/// the bound address, or driving the handle directly from a custom
/// serve/shutdown strategy.
#[derive(Debug)]
pub struct HttpServer {
    /// Address the listener binds.
    addr: SocketAddr,

    /// HTTP/1 header read timeout per connection.
    read_timeout: Duration,

    /// Per-request handler/response budget.
    write_timeout: Duration,

    /// Shared request router.
    router: Arc<RwLock<Router>>,

    /// Drain phase trigger.
    drain: ShutdownSignal,

    /// Abort phase trigger.
    abort: ShutdownSignal,

    /// In-flight connection accounting.
    tracker: ConnectionTracker,

    /// On-shutdown callbacks.
    hooks: ShutdownHooks,

    /// Address actually bound, available once listening.
    bound: Mutex<Option<SocketAddr>>,
}

impl HttpServer {
    /// Creates a new handle for the given address and timeouts.
    #[must_use]
    pub fn new(
        addr: SocketAddr,
        read_timeout: Duration,
        write_timeout: Duration,
        router: Arc<RwLock<Router>>,
    ) -> Self {
        Self {
            addr,
            read_timeout,
            write_timeout,
            router,
            drain: ShutdownSignal::new(),
            abort: ShutdownSignal::new(),
            tracker: ConnectionTracker::new(),
            hooks: ShutdownHooks::new(),
            bound: Mutex::new(None),
        }
    }

    /// Returns the address the listener binds.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the address actually bound, once the listener is up.
    ///
    /// Differs from [`addr`](Self::addr) when binding port 0.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.bound.lock()
    }

    /// Returns `true` once the drain phase has started.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.drain.is_triggered()
    }

    /// Returns the number of connections currently in flight.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.tracker.active()
    }

    /// Registers a callback fired during the shutdown sequence.
    ///
    /// Callbacks run in registration order, exactly once per shutdown.
    pub fn register_on_shutdown<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.register(hook);
    }

    /// Binds the listener and serves connections until drained.
    ///
    /// Ends with `Ok(())` when the drain phase starts; a shutdown is not
    /// an error from the listener's perspective.
    ///
    /// # Errors
    ///
    /// - [`ServerError::Bind`] if the socket cannot be acquired.
    /// - [`ServerError::Closed`] if the handle was already drained.
    pub async fn listen_and_serve(&self) -> Result<(), ServerError> {
        if self.drain.is_triggered() {
            return Err(ServerError::Closed);
        }

        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|err| ServerError::bind(self.addr, &err))?;
        let local = listener
            .local_addr()
            .map_err(|err| ServerError::Io(err.to_string()))?;
        *self.bound.lock() = Some(local);

        tracing::info!(addr = %local, "server listening");

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, remote_addr)) => self.spawn_connection(stream, remote_addr),
                        Err(err) => {
                            tracing::error!(error = %err, "failed to accept connection");
                        }
                    }
                }
                () = self.drain.triggered() => {
                    tracing::info!("drain signalled, listener closing");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Drains the server: stops accepting, fires the on-shutdown hooks,
    /// and waits for in-flight connections to finish.
    ///
    /// The wait is unbounded; the lifecycle controller owns the drain
    /// deadline and calls [`force_close`](Self::force_close) when it
    /// elapses.
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        tracing::info!(
            active = self.tracker.active(),
            "shutting down, waiting for in-flight connections"
        );
        self.drain.trigger();
        self.hooks.run();
        self.tracker.idle().await;
        tracing::info!("all connections closed");
        Ok(())
    }

    /// Forcibly terminates the server: trips both shutdown phases so the
    /// listener closes and remaining connections are dropped.
    pub fn force_close(&self) {
        tracing::warn!(
            active = self.tracker.active(),
            "forcing remaining connections closed"
        );
        self.drain.trigger();
        self.abort.trigger();
    }

    fn spawn_connection(&self, stream: TcpStream, remote_addr: SocketAddr) {
        let token = self.tracker.track();
        let connection = Connection {
            router: Arc::clone(&self.router),
            drain: self.drain.clone(),
            abort: self.abort.clone(),
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
        };

        tokio::spawn(async move {
            if let Err(err) = connection.serve(stream).await {
                tracing::debug!(remote = %remote_addr, error = %err, "connection error");
            }
            drop(token);
        });
    }
}

/// Per-connection state: everything a serving task needs, detached from
/// the `HttpServer` borrow.
struct Connection {
    router: Arc<RwLock<Router>>,
    drain: ShutdownSignal,
    abort: ShutdownSignal,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl Connection {
    async fn serve(&self, stream: TcpStream) -> Result<(), hyper::Error> {
        let io = TokioIo::new(stream);
        let router = Arc::clone(&self.router);
        let write_timeout = self.write_timeout;

        let service = service_fn(move |req: Request<Incoming>| {
            let router = Arc::clone(&router);
            async move { Ok::<_, Infallible>(dispatch(&router, req, write_timeout).await) }
        });

        let conn = http1::Builder::new()
            .timer(TokioTimer::new())
            .header_read_timeout(self.read_timeout)
            .serve_connection(io, service);
        tokio::pin!(conn);

        let mut draining = false;
        loop {
            tokio::select! {
                result = conn.as_mut() => return result,
                () = self.drain.triggered(), if !draining => {
                    draining = true;
                    conn.as_mut().graceful_shutdown();
                }
                () = self.abort.triggered() => {
                    tracing::debug!("connection dropped by shutdown deadline");
                    return Ok(());
                }
            }
        }
    }
}

/// Routes one request through the shared router.
async fn dispatch(
    router: &RwLock<Router>,
    req: Request<Incoming>,
    write_timeout: Duration,
) -> HttpResponse {
    let (parts, body) = req.into_parts();
    // The built-in endpoints are read-only GETs; the body is discarded.
    drop(body);

    let method = parts.method.clone();
    let path = parts.uri.path().to_string();
    tracing::debug!(%method, %path, "dispatching request");

    let handler = router.read().match_route(&method, &path);
    let Some(handler) = handler else {
        return not_found(&path);
    };

    let request = Request::from_parts(parts, ());
    match tokio::time::timeout(write_timeout, handler(request)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(%method, %path, "handler exceeded write timeout");
            error_response(
                StatusCode::GATEWAY_TIMEOUT,
                "HANDLER_TIMEOUT",
                "handler exceeded the write timeout",
            )
        }
    }
}

fn not_found(path: &str) -> HttpResponse {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

fn error_response(status: StatusCode, code: &str, message: &str) -> HttpResponse {
    let body = serde_json::json!({
        "error": {
            "code": code,
            "message": message,
        }
    });

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{assert_endpoint, assert_unreachable, http_get};
    use http::Method;
    use tokio_test::assert_ok;

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    fn test_server(router: Router) -> Arc<HttpServer> {
        Arc::new(HttpServer::new(
            loopback(),
            Duration::from_secs(5),
            Duration::from_secs(5),
            Arc::new(RwLock::new(router)),
        ))
    }

    async fn wait_for_addr(server: &HttpServer) -> SocketAddr {
        for _ in 0..100 {
            if let Some(addr) = server.local_addr() {
                return addr;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("server never bound");
    }

    fn ok_response() -> HttpResponse {
        Response::builder()
            .status(StatusCode::OK)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_serve_and_drain() {
        let mut router = Router::new();
        router.add_route(Method::GET, "/ping", "/ping", |_req| async { ok_response() });

        let server = test_server(router);
        let serve = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.listen_and_serve().await })
        };

        let addr = wait_for_addr(&server).await;
        assert_endpoint(addr, "/ping", 200).await;

        assert_ok!(server.shutdown().await);
        assert_ok!(serve.await.expect("serve task should not panic"));

        assert_unreachable(addr, "/ping").await;
    }

    #[tokio::test]
    async fn test_unmatched_route_returns_not_found() {
        let server = test_server(Router::new());
        let serve = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.listen_and_serve().await })
        };

        let addr = wait_for_addr(&server).await;
        assert_endpoint(addr, "/nonexistent", 404).await;

        server.shutdown().await.unwrap();
        serve.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        // Occupy a port, then point the server at it.
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = occupied.local_addr().unwrap();

        let server = HttpServer::new(
            addr,
            Duration::from_secs(5),
            Duration::from_secs(5),
            Arc::new(RwLock::new(Router::new())),
        );

        let err = server.listen_and_serve().await.unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }));
        assert!(server.local_addr().is_none());
    }

    #[tokio::test]
    async fn test_drained_handle_cannot_serve_again() {
        let server = test_server(Router::new());
        server.shutdown().await.unwrap();

        let err = server.listen_and_serve().await.unwrap_err();
        assert_eq!(err, ServerError::Closed);
    }

    #[tokio::test]
    async fn test_shutdown_fires_hooks() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let server = test_server(Router::new());
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let count = Arc::clone(&count);
            server.register_on_shutdown(move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        server.shutdown().await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_force_close_drops_stalled_connections() {
        let mut router = Router::new();
        router.add_route(Method::GET, "/hang", "/hang", |_req| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            ok_response()
        });

        let server = Arc::new(HttpServer::new(
            loopback(),
            Duration::from_secs(5),
            // Generous write budget so only force_close can end the request.
            Duration::from_secs(120),
            Arc::new(RwLock::new(router)),
        ));
        let serve = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.listen_and_serve().await })
        };

        let addr = wait_for_addr(&server).await;
        let stalled = tokio::spawn(async move { http_get(addr, "/hang").await });
        // Let the request get in flight.
        tokio::time::sleep(Duration::from_millis(50)).await;

        server.force_close();

        // Drain completes because the abort drops the stalled connection.
        tokio::time::timeout(Duration::from_secs(2), server.shutdown())
            .await
            .expect("drain should complete after force_close")
            .unwrap();

        serve.await.unwrap().unwrap();
        stalled.abort();
    }

    #[tokio::test]
    async fn test_write_timeout_produces_gateway_timeout() {
        let mut router = Router::new();
        router.add_route(Method::GET, "/slow", "/slow", |_req| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            ok_response()
        });

        let server = Arc::new(HttpServer::new(
            loopback(),
            Duration::from_secs(5),
            Duration::from_millis(50),
            Arc::new(RwLock::new(router)),
        ));
        let serve = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.listen_and_serve().await })
        };

        let addr = wait_for_addr(&server).await;
        assert_endpoint(addr, "/slow", 504).await;

        server.shutdown().await.unwrap();
        serve.await.unwrap().unwrap();
    }
}
