//! Request routing.
//!
//! Maps incoming method + path pairs to named routes carrying dynamic
//! handlers. Routes are registered with the path doubling as the route
//! name, so the path identifies the route for later lookup.
//!
//! The router only matches exact paths; it has no parameter extraction.
//! It is deliberately small: the endpoint adapters of this crate are its
//! only built-in consumers, and embedders may register additional routes
//! before the server starts.
//!
//! # Example
//!
//! ```rust
//! use helmsman_server::Router;
//! use http::{Method, Request, Response, StatusCode};
//! use http_body_util::Full;
//!
//! let mut router = Router::new();
//! router.add_route(Method::GET, "/ping", "/ping", |_req| async {
//!     Response::builder()
//!         .status(StatusCode::OK)
//!         .body(Full::new(bytes::Bytes::new()))
//!         .unwrap()
//! });
//!
//! assert!(router.has_route("/ping"));
//! assert!(router.match_route(&Method::GET, "/ping").is_some());
//! assert!(router.match_route(&Method::POST, "/ping").is_none());
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http::{Method, Request, Response};
use http_body_util::Full;

/// Type alias for the HTTP response body.
pub type ResponseBody = Full<Bytes>;

/// Type alias for the HTTP response produced by route handlers.
pub type HttpResponse = Response<ResponseBody>;

/// The request passed to route handlers.
///
/// Handlers bound here are fixed-method, read-only endpoints; the body
/// is discarded by the transport before dispatch.
pub type HttpRequest = Request<()>;

/// A dynamic route handler.
pub type RouteHandler =
    Arc<dyn Fn(HttpRequest) -> Pin<Box<dyn Future<Output = HttpResponse> + Send>> + Send + Sync>;

/// A registered route.
struct Route {
    method: Method,
    path: String,
    name: String,
    handler: RouteHandler,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Request router with named routes.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Creates a new empty router.
    #[must_use]
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Registers a route.
    ///
    /// Re-registering the same method + path replaces the previous
    /// handler, so the most recent registration wins.
    pub fn add_route<F, Fut>(
        &mut self,
        method: Method,
        path: impl Into<String>,
        name: impl Into<String>,
        handler: F,
    ) where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HttpResponse> + Send + 'static,
    {
        let handler: RouteHandler = Arc::new(move |req| Box::pin(handler(req)));
        self.add_route_handler(method, path, name, handler);
    }

    /// Registers a route with an already-boxed handler.
    pub fn add_route_handler(
        &mut self,
        method: Method,
        path: impl Into<String>,
        name: impl Into<String>,
        handler: RouteHandler,
    ) {
        let path = path.into();
        self.routes
            .retain(|route| !(route.method == method && route.path == path));
        self.routes.push(Route {
            method,
            name: name.into(),
            path,
            handler,
        });
    }

    /// Returns the handler matching the given method and exact path.
    #[must_use]
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteHandler> {
        self.routes
            .iter()
            .find(|route| route.method == *method && route.path == path)
            .map(|route| Arc::clone(&route.handler))
    }

    /// Returns `true` if a route with the given name is registered.
    #[must_use]
    pub fn has_route(&self, name: &str) -> bool {
        self.routes.iter().any(|route| route.name == name)
    }

    /// Returns the number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
