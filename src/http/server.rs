//! HTTP server setup and lifecycle.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, request ID, response timeout)
//! - Run the accept loop on a background task
//! - Stop accepting, drain, and force-close on request
//! - Report completion once the listener task returns
//!
//! # Design Decisions
//! - Connections are served with hyper-util directly so each one can be
//!   asked to finish gracefully and, past the deadline, be aborted
//! - Bind errors are reported through the completion marker, never panics

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware, Router,
};
use hyper::body::Incoming;
use hyper_util::{
    rt::{TokioExecutor, TokioIo, TokioTimer},
    server::conn::auto,
    service::TowerToHyperService,
};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinSet;
use tower::{ServiceBuilder, ServiceExt};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::http::handlers;
use crate::http::request::{self, count_requests};
use crate::lifecycle::sequencer::GracefulStop;
use crate::lifecycle::shutdown::{ShutdownCoordinator, ShutdownError};
use crate::net::{ConnectionTracker, Listener, ListenerError};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<ShutdownCoordinator>,
}

/// How the listener task ended.
#[derive(Debug)]
pub enum ServeOutcome {
    /// Stopped after a shutdown request.
    Closed,
    /// Could not start, or failed while running.
    Failed(ListenerError),
    /// The task went away without reporting (panic or runtime shutdown).
    Aborted,
}

/// HTTP server for the blog API.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServerConfig, coordinator: Arc<ShutdownCoordinator>) -> Self {
        let state = AppState { coordinator };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        Self::with_middleware(handlers::routes().with_state(state), config)
    }

    /// Wrap routes in the request ID, tracing, metrics and response timeout layers.
    fn with_middleware(router: Router, config: &ServerConfig) -> Router {
        router.layer(
            ServiceBuilder::new()
                .layer(request::set_request_id_layer())
                .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                    tracing::info_span!(
                        "http_request",
                        method = %req.method(),
                        path = %req.uri().path(),
                        request_id = %request::request_id(req),
                    )
                }))
                .layer(request::propagate_request_id_layer())
                .layer(middleware::from_fn(count_requests))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    config.timeouts.write(),
                )),
        )
    }

    /// The fully layered router, for driving it without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Start serving on a background task and return immediately.
    ///
    /// The task binds the configured address itself; a bind failure is
    /// logged and shows up as [`ServeOutcome::Failed`] on the completion
    /// marker.
    pub fn start(self) -> ServerHandle {
        let (bound_tx, bound_rx) = watch::channel(None);
        let (stop_tx, stop_rx) = watch::channel(false);
        let (force_tx, force_rx) = watch::channel(false);
        let (finished_tx, finished_rx) = watch::channel(false);
        let (done_tx, done_rx) = oneshot::channel();
        let tracker = ConnectionTracker::new();

        let task_tracker = tracker.clone();
        tokio::spawn(async move {
            let outcome = self.serve(bound_tx, stop_rx, force_rx, task_tracker).await;
            match &outcome {
                ServeOutcome::Failed(e) => tracing::error!(error = %e, "Listen and serve failed"),
                _ => tracing::info!("HTTP server stopped"),
            }
            finished_tx.send_replace(true);
            let _ = done_tx.send(outcome);
        });

        ServerHandle {
            bound: bound_rx,
            control: ServerControl {
                stop_tx,
                force_tx,
                finished: finished_rx,
                tracker,
            },
            completion: Completion { done: done_rx },
        }
    }

    async fn serve(
        self,
        bound_tx: watch::Sender<Option<SocketAddr>>,
        mut stop_rx: watch::Receiver<bool>,
        mut force_rx: watch::Receiver<bool>,
        tracker: ConnectionTracker,
    ) -> ServeOutcome {
        let listener = match Listener::bind(&self.config.listener).await {
            Ok(listener) => listener,
            Err(e) => return ServeOutcome::Failed(e),
        };
        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => return ServeOutcome::Failed(ListenerError::Bind(e)),
        };
        bound_tx.send_replace(Some(addr));
        tracing::info!(address = %addr, "Server started");

        let mut builder = auto::Builder::new(TokioExecutor::new());
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(self.config.timeouts.read());
        let service = TowerToHyperService::new(
            self.router.map_request(|req: Request<Incoming>| req.map(Body::new)),
        );
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                () = raised(&mut stop_rx) => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let guard = tracker.track();
                        let builder = builder.clone();
                        let service = service.clone();
                        let mut stop = stop_rx.clone();

                        connections.spawn(async move {
                            let _permit = permit;
                            let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
                            tokio::pin!(conn);

                            let mut draining = false;
                            loop {
                                tokio::select! {
                                    result = conn.as_mut() => {
                                        if let Err(e) = result {
                                            tracing::debug!(connection_id = %guard.id(), peer = %peer, error = %e, "Connection error");
                                        }
                                        break;
                                    }
                                    () = raised(&mut stop), if !draining => {
                                        draining = true;
                                        conn.as_mut().graceful_shutdown();
                                    }
                                }
                            }
                            drop(guard);
                        });
                    }
                    Err(ListenerError::Closed) => break,
                    Err(e) => {
                        // Usually fd exhaustion; back off instead of spinning.
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
            }

            while connections.try_join_next().is_some() {}
        }

        drop(listener);
        tracing::info!(open_connections = tracker.active_count(), "Stopped accepting connections");

        tokio::select! {
            () = tracker.wait_idle() => {}
            () = raised(&mut force_rx) => {
                tracing::warn!(remaining = tracker.active_count(), "Force-closing connections");
                connections.abort_all();
            }
        }
        while connections.join_next().await.is_some() {}

        ServeOutcome::Closed
    }
}

/// Resolve once the flag is set or its sender is gone.
async fn raised(flag: &mut watch::Receiver<bool>) {
    let _ = flag.wait_for(|set| *set).await;
}

/// Handle to a started server.
pub struct ServerHandle {
    bound: watch::Receiver<Option<SocketAddr>>,
    control: ServerControl,
    completion: Completion,
}

impl ServerHandle {
    /// Wait for the listener to bind. `None` if it failed to start.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        let mut bound = self.bound.clone();
        let addr = bound.wait_for(Option::is_some).await.ok().and_then(|addr| *addr);
        addr
    }

    pub fn into_parts(self) -> (ServerControl, Completion) {
        (self.control, self.completion)
    }
}

/// Stops a running server. Dropping it also stops the server, without a
/// drain bound.
pub struct ServerControl {
    stop_tx: watch::Sender<bool>,
    force_tx: watch::Sender<bool>,
    finished: watch::Receiver<bool>,
    tracker: ConnectionTracker,
}

impl ServerControl {
    /// Stop accepting immediately, let open connections finish in-flight
    /// requests, and force-close whatever is left after `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), ShutdownError> {
        self.stop_tx.send_replace(true);

        let mut finished = self.finished.clone();
        match tokio::time::timeout(timeout, raised(&mut finished)).await {
            Ok(()) => Ok(()),
            Err(_) => {
                let remaining = self.tracker.active_count();
                self.force_tx.send_replace(true);
                Err(ShutdownError::Timeout { after: timeout, remaining })
            }
        }
    }
}

impl GracefulStop for ServerControl {
    fn stop(&self, timeout: Duration) -> impl Future<Output = Result<(), ShutdownError>> + Send {
        self.shutdown(timeout)
    }
}

/// Fires once the listener task has returned, whatever the outcome.
pub struct Completion {
    done: oneshot::Receiver<ServeOutcome>,
}

impl Completion {
    pub async fn wait(self) -> ServeOutcome {
        self.done.await.unwrap_or(ServeOutcome::Aborted)
    }
}
