//! Built-in endpoint adapters.
//!
//! Three fixed-method, read-only handlers bound onto the router when the
//! [`Server`](crate::Server) is constructed:
//!
//! - **ping**: unconditional liveness indicator, 200 with empty body.
//! - **healthcheck**: behaves like ping at its default path. Paths
//!   registered through a custom healthcheck registration delegate to
//!   the active handler instead; the default path is only affected when
//!   it is itself re-registered.
//! - **shutdown**: answers 200 immediately and invokes `stop` on a
//!   spawned task. The stop must not be awaited inline: the drain waits
//!   for this very request to finish, so blocking the response on it
//!   would deadlock the server against itself.

use std::sync::Arc;

use bytes::Bytes;
use http::{Method, Response, StatusCode};
use http_body_util::Full;
use parking_lot::RwLock;

use crate::config::ServerConfig;
use crate::router::{HttpResponse, RouteHandler, Router};
use crate::server::StopHandle;

/// Slot holding the active custom healthcheck handler, if any.
pub(crate) type HealthHandlerSlot = Arc<RwLock<Option<RouteHandler>>>;

/// Binds the three endpoint adapters as named GET routes.
///
/// Each path doubles as the route's identifying name.
pub(crate) fn bind(router: &mut Router, config: &ServerConfig, stop: &StopHandle) {
    router.add_route(
        Method::GET,
        config.ping_path(),
        config.ping_path(),
        |_req| async { ok_empty() },
    );
    router.add_route(
        Method::GET,
        config.healthcheck_path(),
        config.healthcheck_path(),
        |_req| async { ok_empty() },
    );

    let stop = stop.clone();
    router.add_route(
        Method::GET,
        config.shutdown_path(),
        config.shutdown_path(),
        move |_req| {
            let stop = stop.clone();
            async move {
                tracing::info!("shutdown requested via endpoint");
                tokio::spawn(async move {
                    if let Err(err) = stop.stop().await {
                        tracing::error!(error = %err, "endpoint-triggered shutdown failed");
                    }
                });
                ok_empty()
            }
        },
    );
}

/// Binds (or re-binds) the healthcheck adapter at the given path.
pub(crate) fn bind_healthcheck(router: &mut Router, path: &str, health_handler: &HealthHandlerSlot) {
    let slot = Arc::clone(health_handler);
    router.add_route(Method::GET, path, path, move |req| {
        let handler = slot.read().clone();
        async move {
            match handler {
                Some(handler) => handler(req).await,
                None => ok_empty(),
            }
        }
    });
}

fn ok_empty() -> HttpResponse {
    Response::builder()
        .status(StatusCode::OK)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::HttpRequest;
    use http::Request;

    fn request(path: &str) -> HttpRequest {
        Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(())
            .unwrap()
    }

    fn bound_router() -> (Router, StopHandle) {
        let mut router = Router::new();
        let config = ServerConfig::default();
        let stop = StopHandle::new();
        bind(&mut router, &config, &stop);
        (router, stop)
    }

    fn unavailable_handler() -> RouteHandler {
        Arc::new(|_req| {
            Box::pin(async {
                Response::builder()
                    .status(StatusCode::SERVICE_UNAVAILABLE)
                    .body(Full::new(Bytes::new()))
                    .unwrap()
            })
        })
    }

    #[test]
    fn test_bind_registers_all_three_routes() {
        let (router, _stop) = bound_router();

        assert!(router.has_route("/ping"));
        assert!(router.has_route("/healthcheck"));
        assert!(router.has_route("/shutdown"));
        assert_eq!(router.len(), 3);
    }

    #[tokio::test]
    async fn test_ping_returns_ok_with_empty_body() {
        let (router, _stop) = bound_router();

        let handler = router.match_route(&Method::GET, "/ping").unwrap();
        let response = handler(request("/ping")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_healthcheck_defaults_to_ok() {
        let (router, _stop) = bound_router();

        let handler = router.match_route(&Method::GET, "/healthcheck").unwrap();
        let response = handler(request("/healthcheck")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_custom_path_delegates_to_active_handler() {
        let (mut router, _stop) = bound_router();
        let health: HealthHandlerSlot = Arc::new(RwLock::new(None));
        *health.write() = Some(unavailable_handler());

        bind_healthcheck(&mut router, "/readyz", &health);

        let handler = router.match_route(&Method::GET, "/readyz").unwrap();
        let response = handler(request("/readyz")).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        // The default path keeps its plain liveness behavior.
        let default = router.match_route(&Method::GET, "/healthcheck").unwrap();
        let response = default(request("/healthcheck")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rebinding_default_path_overrides_it() {
        let (mut router, _stop) = bound_router();
        let health: HealthHandlerSlot = Arc::new(RwLock::new(None));
        *health.write() = Some(unavailable_handler());

        bind_healthcheck(&mut router, "/healthcheck", &health);

        let handler = router.match_route(&Method::GET, "/healthcheck").unwrap();
        let response = handler(request("/healthcheck")).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_shutdown_responds_before_stop_completes() {
        let (router, stop) = bound_router();
        let (mut trigger_rx, _outcome_tx) = stop.install().expect("fresh handle installs");

        let handler = router.match_route(&Method::GET, "/shutdown").unwrap();
        let response = handler(request("/shutdown")).await;

        // The response is produced immediately even though nothing has
        // consumed the trigger or published an outcome yet.
        assert_eq!(response.status(), StatusCode::OK);

        let trigger = tokio::time::timeout(std::time::Duration::from_secs(1), trigger_rx.recv())
            .await
            .expect("stop should be requested")
            .expect("trigger channel open");
        assert!(trigger.is_requested());
    }
}
