//! The service lifecycle controller.
//!
//! [`Server`] owns the running/stopped state of a single HTTP service
//! instance and coordinates its graceful, timeout-bounded shutdown. A
//! blocking [`start`](Server::start) call is unblocked by exactly one of
//! three triggers: an explicit [`stop`](Server::stop) call, an external
//! termination signal, or the serve operation failing internally.
//!
//! Coordination uses two channels created fresh for each cycle:
//!
//! - a bounded **trigger** channel carrying the first shutdown cause;
//!   producers use non-blocking sends, so a duplicate or late trigger is
//!   dropped rather than blocking its sender.
//! - a **result** watch channel broadcasting the single drain outcome to
//!   every `stop` caller, so losing a trigger race (for example to a
//!   termination signal) never strands a caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use helmsman_server::{Router, Server, ServerConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Arc::new(Server::new(ServerConfig::default(), Router::new()));
//!
//!     let handle = tokio::spawn({
//!         let server = Arc::clone(&server);
//!         async move { server.start().await }
//!     });
//!
//!     // ... later, from any task:
//!     server.stop().await?;
//!     handle.await??;
//!     Ok(())
//! }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};

use crate::config::ServerConfig;
use crate::endpoints::{self, HealthHandlerSlot};
use crate::error::ServerError;
use crate::router::{HttpRequest, HttpResponse, RouteHandler, Router};
use crate::shutdown::{wait_for_os_signal, ShutdownSignal};
use crate::strategy::{DefaultServe, DefaultShutdown, ServeStrategy, ShutdownStrategy};
use crate::transport::HttpServer;

/// Capacity of the trigger channel. One slot would suffice for the
/// state machine; the extra slot keeps a racing second producer from
/// being dropped before the first is consumed.
const TRIGGER_CAPACITY: usize = 2;

/// The cause that initiated a shutdown sequence.
#[derive(Debug)]
pub(crate) enum Trigger {
    /// A caller invoked `stop` (directly or via the shutdown endpoint).
    Requested,

    /// The external termination source fired.
    Interrupted,

    /// The serve operation terminated with an error of its own.
    ServeFailed(ServerError),
}

impl Trigger {
    #[cfg(test)]
    pub(crate) fn is_requested(&self) -> bool {
        matches!(self, Self::Requested)
    }
}

/// The per-cycle channel pair, present only while a cycle is active.
#[derive(Clone)]
struct StopChannels {
    trigger: mpsc::Sender<Trigger>,
    outcome: watch::Receiver<Option<Result<(), ServerError>>>,
}

/// Clonable handle to the controller's stop machinery.
///
/// Holds only the per-cycle channel slot, so request handlers can carry
/// it without keeping the whole controller (and thus the router that
/// contains those very handlers) alive in a reference cycle.
#[derive(Clone)]
pub(crate) struct StopHandle {
    channels: Arc<Mutex<Option<StopChannels>>>,
}

impl StopHandle {
    pub(crate) fn new() -> Self {
        Self {
            channels: Arc::new(Mutex::new(None)),
        }
    }

    /// Creates the channels for a new cycle.
    ///
    /// Returns `None` while a cycle is already active.
    pub(crate) fn install(
        &self,
    ) -> Option<(
        mpsc::Receiver<Trigger>,
        watch::Sender<Option<Result<(), ServerError>>>,
    )> {
        let mut slot = self.channels.lock();
        if slot.is_some() {
            return None;
        }

        let (trigger_tx, trigger_rx) = mpsc::channel(TRIGGER_CAPACITY);
        let (outcome_tx, outcome_rx) = watch::channel(None);
        *slot = Some(StopChannels {
            trigger: trigger_tx,
            outcome: outcome_rx,
        });
        Some((trigger_rx, outcome_tx))
    }

    /// Tears down the cycle state.
    pub(crate) fn clear(&self) {
        *self.channels.lock() = None;
    }

    /// Deposits a trigger without blocking.
    ///
    /// Dropped silently when no cycle is active or when the channel is
    /// already full; only the first trigger consumed advances the state
    /// machine anyway.
    pub(crate) fn send_trigger(&self, trigger: Trigger) {
        let sender = self.channels.lock().as_ref().map(|ch| ch.trigger.clone());
        if let Some(sender) = sender {
            if let Err(err) = sender.try_send(trigger) {
                tracing::debug!(dropped = ?err, "duplicate shutdown trigger dropped");
            }
        }
    }

    /// Requests a stop and waits for the drain outcome.
    ///
    /// A no-op returning `Ok` when no cycle is active.
    pub(crate) async fn stop(&self) -> Result<(), ServerError> {
        let Some(channels) = self.channels.lock().clone() else {
            return Ok(());
        };

        self.send_trigger(Trigger::Requested);

        let mut outcome = channels.outcome;
        loop {
            if let Some(result) = outcome.borrow_and_update().clone() {
                return result;
            }
            if outcome.changed().await.is_err() {
                // The cycle ended without publishing; the server is down.
                return Ok(());
            }
        }
    }
}

/// Lifecycle controller for a single HTTP service instance.
///
/// Construction binds the ping, healthcheck and shutdown endpoint
/// adapters onto the supplied router as named GET routes (the path
/// doubles as the route name). [`start`](Server::start) then blocks
/// until the service is stopped by any trigger.
///
/// All methods take `&self`; wrap the controller in an [`Arc`] to call
/// [`stop`](Server::stop) from another task while `start` is blocked.
pub struct Server {
    config: ServerConfig,
    router: Arc<RwLock<Router>>,
    http: Arc<HttpServer>,
    serve_strategy: RwLock<Arc<dyn ServeStrategy>>,
    shutdown_strategy: RwLock<Arc<dyn ShutdownStrategy>>,
    health_handler: HealthHandlerSlot,
    stop: StopHandle,
    termination: ShutdownSignal,
    os_signals: bool,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("addr", &self.http.addr())
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Creates a controller that also reacts to OS termination signals
    /// (SIGTERM/SIGINT) while started.
    #[must_use]
    pub fn new(config: ServerConfig, router: Router) -> Self {
        Self::build(config, router, ShutdownSignal::new(), true)
    }

    /// Creates a controller with an injected external-termination
    /// source instead of OS signal handlers.
    ///
    /// Lets embedders share one termination fan-out across several
    /// controllers, and lets tests simulate process termination without
    /// delivering real signals.
    #[must_use]
    pub fn with_termination_signal(
        config: ServerConfig,
        router: Router,
        termination: ShutdownSignal,
    ) -> Self {
        Self::build(config, router, termination, false)
    }

    fn build(
        config: ServerConfig,
        mut router: Router,
        termination: ShutdownSignal,
        os_signals: bool,
    ) -> Self {
        let health_handler: HealthHandlerSlot = Arc::new(RwLock::new(None));
        let stop = StopHandle::new();
        endpoints::bind(&mut router, &config, &stop);

        let router = Arc::new(RwLock::new(router));
        let addr = SocketAddr::from(([0, 0, 0, 0], config.effective_port()));
        let http = Arc::new(HttpServer::new(
            addr,
            config.read_timeout(),
            config.write_timeout(),
            Arc::clone(&router),
        ));

        Self {
            config,
            router,
            http,
            serve_strategy: RwLock::new(Arc::new(DefaultServe)),
            shutdown_strategy: RwLock::new(Arc::new(DefaultShutdown)),
            health_handler,
            stop,
            termination,
            os_signals,
        }
    }

    /// Returns the controller's configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the shared router.
    ///
    /// Additional routes may be registered through it before `start`.
    #[must_use]
    pub fn router(&self) -> &Arc<RwLock<Router>> {
        &self.router
    }

    /// Returns the live underlying server handle.
    #[must_use]
    pub fn http_server(&self) -> &Arc<HttpServer> {
        &self.http
    }

    /// Registers a callback fired by the transport during its shutdown
    /// sequence. All registered callbacks fire in registration order,
    /// exactly once per shutdown.
    pub fn register_on_shutdown<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.http.register_on_shutdown(hook);
    }

    /// Overrides how the underlying server is run.
    ///
    /// The most recent registration wins.
    pub fn register_server_start_handler<S>(&self, strategy: S)
    where
        S: ServeStrategy + 'static,
    {
        *self.serve_strategy.write() = Arc::new(strategy);
    }

    /// Overrides how the underlying server is drained.
    ///
    /// The strategy receives the live server handle and the configured
    /// drain deadline; its result becomes the drain outcome. The most
    /// recent registration wins.
    pub fn register_server_shutdown_handler<S>(&self, strategy: S)
    where
        S: ShutdownStrategy + 'static,
    {
        *self.shutdown_strategy.write() = Arc::new(strategy);
    }

    /// Installs a custom healthcheck handler and binds `path` as a GET
    /// route delegating to it.
    ///
    /// Only one health handler is active at a time; the most recent
    /// registration wins and serves every path previously bound this
    /// way. The default healthcheck path keeps its plain 200 behavior
    /// unless it is the path being registered. Must be called before
    /// `start`.
    pub fn register_healthcheck_endpoint<F, Fut>(&self, path: &str, handler: F)
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = HttpResponse> + Send + 'static,
    {
        let handler: RouteHandler = Arc::new(move |req| Box::pin(handler(req)));
        *self.health_handler.write() = Some(handler);
        endpoints::bind_healthcheck(&mut self.router.write(), path, &self.health_handler);
    }

    /// Starts the service and blocks until it is stopped.
    ///
    /// Runs the serve operation (the registered start handler, or the
    /// default accept loop) concurrently, subscribes to the external
    /// termination source, and waits for the first shutdown trigger.
    /// Any trigger begins the bounded drain: the registered shutdown
    /// handler (or the default graceful drain) runs under the configured
    /// shutdown timeout; when the deadline elapses the remaining
    /// connections are forced closed and the outcome is a timeout error.
    ///
    /// # Errors
    ///
    /// - [`ServerError::AlreadyRunning`] if a `start` is already in
    ///   flight.
    /// - The serve operation's own error (for example a bind failure)
    ///   when it terminated for a reason other than graceful shutdown.
    ///
    /// A drain error is *not* returned here when the shutdown was
    /// requested through [`stop`](Server::stop): the stop caller asked
    /// for it and receives it instead. After a termination signal the
    /// drain error is broadcast to any stop callers and logged, and
    /// `start` still returns `Ok`.
    pub async fn start(&self) -> Result<(), ServerError> {
        let Some((mut trigger_rx, outcome_tx)) = self.stop.install() else {
            return Err(ServerError::AlreadyRunning);
        };

        // Subscribe to the external termination source for this cycle.
        let bridge = {
            let stop = self.stop.clone();
            let termination = self.termination.clone();
            let os_signals = self.os_signals;
            tokio::spawn(async move {
                if os_signals {
                    tokio::select! {
                        () = termination.triggered() => {}
                        result = wait_for_os_signal() => {
                            if let Err(err) = result {
                                tracing::error!(error = %err, "failed to register signal handlers");
                                termination.triggered().await;
                            }
                        }
                    }
                } else {
                    termination.triggered().await;
                }
                stop.send_trigger(Trigger::Interrupted);
            })
        };

        // Launch the serve operation concurrently. A termination that
        // is not a graceful close is injected as a trigger so this very
        // call can unblock even though nobody asked to stop.
        let serve_task = {
            let strategy = Arc::clone(&*self.serve_strategy.read());
            let http = Arc::clone(&self.http);
            let stop = self.stop.clone();
            tokio::spawn(async move {
                if let Err(err) = strategy.serve(http).await {
                    tracing::error!(error = %err, "serve operation failed");
                    stop.send_trigger(Trigger::ServeFailed(err));
                }
            })
        };

        let trigger = trigger_rx.recv().await.unwrap_or(Trigger::Interrupted);
        tracing::info!(?trigger, "shutdown trigger received");

        // Bounded drain.
        let deadline = self.config.shutdown_timeout();
        let strategy = Arc::clone(&*self.shutdown_strategy.read());
        let drained = tokio::time::timeout(
            deadline,
            strategy.shutdown(Arc::clone(&self.http), deadline),
        )
        .await;
        let outcome = match drained {
            Ok(result) => result,
            Err(_) => {
                self.http.force_close();
                Err(ServerError::ShutdownTimeout(deadline))
            }
        };

        // Unsubscribe from the termination source and reap the serve
        // task; the listener has already closed by now.
        bridge.abort();
        serve_task.abort();

        self.stop.clear();

        match trigger {
            Trigger::Requested => {
                // The stop caller asked for the shutdown; the drain
                // outcome belongs to them, not to start's caller.
                let _ = outcome_tx.send(Some(outcome));
                Ok(())
            }
            Trigger::Interrupted => {
                if let Err(err) = &outcome {
                    // No stop caller is guaranteed to observe this, so
                    // it must not be lost silently.
                    tracing::warn!(error = %err, "drain failed after termination signal");
                }
                let _ = outcome_tx.send(Some(outcome));
                Ok(())
            }
            Trigger::ServeFailed(err) => {
                let _ = outcome_tx.send(Some(outcome));
                Err(err)
            }
        }
    }

    /// Stops the service gracefully and synchronously.
    ///
    /// Waits for the drain to finish (respecting the shutdown timeout
    /// for in-flight requests) and returns its outcome. Returns `Ok`
    /// immediately when `start` was never invoked or the service has
    /// already stopped. Safe to call concurrently with the internal
    /// shutdown path, and from a handler running inside the very server
    /// being stopped as long as the call is spawned rather than awaited
    /// inline (as the built-in shutdown endpoint does).
    pub async fn stop(&self) -> Result<(), ServerError> {
        self.stop.stop().await
    }
}
