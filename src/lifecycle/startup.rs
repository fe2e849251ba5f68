//! Startup orchestration.
//!
//! Starts the listener task first, then blocks on the shutdown sequencer,
//! then on the listener's completion marker.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::http::{HttpServer, ServeOutcome, ServerHandle};
use crate::lifecycle::sequencer::{ShutdownReport, ShutdownSequencer};
use crate::lifecycle::shutdown::ShutdownCoordinator;
use crate::lifecycle::signals::OsSignal;

/// A started server together with its shutdown coordinator.
pub struct Lifecycle {
    coordinator: Arc<ShutdownCoordinator>,
    handle: ServerHandle,
    config: ServerConfig,
}

impl Lifecycle {
    /// Start the listener in the background.
    pub fn start(config: ServerConfig) -> Self {
        let coordinator = Arc::new(ShutdownCoordinator::new());
        let handle = HttpServer::new(config.clone(), coordinator.clone()).start();
        Self {
            coordinator,
            handle,
            config,
        }
    }

    /// Bound address, once the listener is up. `None` if it failed to bind.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.handle.local_addr().await
    }

    pub fn coordinator(&self) -> &Arc<ShutdownCoordinator> {
        &self.coordinator
    }

    /// Block until a trigger fires, run the bounded shutdown, then wait for
    /// the listener task to exit.
    pub async fn run_until_stopped<F>(self, os_signal: F) -> ShutdownReport
    where
        F: Future<Output = OsSignal>,
    {
        let (control, completion) = self.handle.into_parts();

        let report = ShutdownSequencer::new(self.coordinator, self.config.timeouts.shutdown())
            .run(os_signal, &control)
            .await;

        match completion.wait().await {
            ServeOutcome::Closed => tracing::info!("Listener exited"),
            ServeOutcome::Failed(e) => tracing::warn!(error = %e, "Listener exited with error"),
            ServeOutcome::Aborted => tracing::warn!("Listener task aborted"),
        }

        report
    }
}

/// Start the server and run it until shut down.
pub async fn run<F>(config: ServerConfig, os_signal: F) -> ShutdownReport
where
    F: Future<Output = OsSignal>,
{
    Lifecycle::start(config).run_until_stopped(os_signal).await
}
