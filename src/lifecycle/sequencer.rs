//! Shutdown sequencing.
//!
//! Blocks until exactly one trigger fires, then runs the bounded drain of the
//! server. Consuming `run(self, ..)` keeps the sequence one-shot.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::lifecycle::shutdown::{LifecycleState, ShutdownCoordinator, ShutdownError, ShutdownTrigger};
use crate::lifecycle::signals::OsSignal;

/// Something that can be stopped within a deadline.
///
/// Implemented by the HTTP server's control handle.
pub trait GracefulStop {
    /// Stop accepting work, drain what is in flight, and force-close whatever
    /// is left once `timeout` elapses.
    fn stop(&self, timeout: Duration) -> impl Future<Output = Result<(), ShutdownError>> + Send;
}

/// How the drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    Graceful,
    TimedOut,
}

/// Summary of a completed shutdown sequence.
#[derive(Debug, Clone)]
pub struct ShutdownReport {
    pub trigger: ShutdownTrigger,
    pub outcome: ShutdownOutcome,
    pub elapsed: Duration,
}

/// Waits for a trigger, then stops the server within a fixed bound.
pub struct ShutdownSequencer {
    coordinator: Arc<ShutdownCoordinator>,
    timeout: Duration,
}

impl ShutdownSequencer {
    pub fn new(coordinator: Arc<ShutdownCoordinator>, timeout: Duration) -> Self {
        Self { coordinator, timeout }
    }

    /// Block until an OS signal or the winning explicit request arrives.
    ///
    /// The losing branch is dropped. A signal still goes through the gate so
    /// a late `/shutdown` call cannot start a second sequence.
    pub async fn wait_for_trigger<F>(&self, os_signal: F) -> ShutdownTrigger
    where
        F: Future<Output = OsSignal>,
    {
        tokio::select! {
            signal = os_signal => {
                self.coordinator.claim_for_signal(signal);
                tracing::info!(signal = %signal, "Shutdown request received");
                ShutdownTrigger::Signal(signal)
            }
            Some(trigger) = self.coordinator.next_request() => {
                tracing::info!(trigger = %trigger, "Shutdown request received");
                trigger
            }
        }
    }

    /// Wait for the trigger and run the bounded shutdown of `server`.
    ///
    /// A timeout is logged, never returned: the caller proceeds to exit
    /// either way.
    pub async fn run<F, S>(self, os_signal: F, server: &S) -> ShutdownReport
    where
        F: Future<Output = OsSignal>,
        S: GracefulStop,
    {
        let trigger = self.wait_for_trigger(os_signal).await;
        self.coordinator
            .advance(LifecycleState::ShutdownRequested, LifecycleState::ShuttingDown);

        tracing::info!(timeout_secs = self.timeout.as_secs_f64(), "Stopping http server");
        let started = Instant::now();

        let outcome = match server.stop(self.timeout).await {
            Ok(()) => ShutdownOutcome::Graceful,
            Err(e) => {
                tracing::warn!(error = %e, "Shutdown request error");
                ShutdownOutcome::TimedOut
            }
        };

        self.coordinator
            .advance(LifecycleState::ShuttingDown, LifecycleState::Stopped);

        let elapsed = started.elapsed();
        tracing::info!(trigger = %trigger, outcome = ?outcome, elapsed_ms = elapsed.as_millis() as u64, "Shutdown sequence finished");

        ShutdownReport { trigger, outcome, elapsed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::shutdown::RequestOutcome;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts stop calls and optionally reports a timeout.
    #[derive(Default)]
    struct FakeServer {
        stops: AtomicUsize,
        time_out: bool,
    }

    impl GracefulStop for FakeServer {
        fn stop(&self, timeout: Duration) -> impl Future<Output = Result<(), ShutdownError>> + Send {
            self.stops.fetch_add(1, Ordering::SeqCst);
            let time_out = self.time_out;
            async move {
                if time_out {
                    Err(ShutdownError::Timeout { after: timeout, remaining: 1 })
                } else {
                    Ok(())
                }
            }
        }
    }

    fn never() -> impl Future<Output = OsSignal> {
        std::future::pending()
    }

    #[tokio::test]
    async fn explicit_request_drives_one_sequence() {
        let coordinator = Arc::new(ShutdownCoordinator::new());
        let server = FakeServer::default();

        assert_eq!(coordinator.request_shutdown("http"), RequestOutcome::Accepted);
        assert_eq!(coordinator.request_shutdown("http"), RequestOutcome::AlreadyInProgress);

        let report = ShutdownSequencer::new(coordinator.clone(), Duration::from_secs(10))
            .run(never(), &server)
            .await;

        assert_eq!(report.trigger, ShutdownTrigger::Request("http"));
        assert_eq!(report.outcome, ShutdownOutcome::Graceful);
        assert_eq!(server.stops.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn signal_path_marks_the_flag() {
        let coordinator = Arc::new(ShutdownCoordinator::new());
        let server = FakeServer::default();

        let report = ShutdownSequencer::new(coordinator.clone(), Duration::from_secs(10))
            .run(async { OsSignal::Terminate }, &server)
            .await;

        assert_eq!(report.trigger, ShutdownTrigger::Signal(OsSignal::Terminate));
        assert_eq!(coordinator.request_shutdown("http"), RequestOutcome::AlreadyInProgress);
        assert_eq!(server.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeout_is_reported_not_propagated() {
        let coordinator = Arc::new(ShutdownCoordinator::new());
        let server = FakeServer { time_out: true, ..Default::default() };

        let report = ShutdownSequencer::new(coordinator.clone(), Duration::from_millis(5))
            .run(async { OsSignal::Interrupt }, &server)
            .await;

        assert_eq!(report.outcome, ShutdownOutcome::TimedOut);
        assert_eq!(coordinator.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn waits_until_triggered() {
        let coordinator = Arc::new(ShutdownCoordinator::new());
        let sequencer = ShutdownSequencer::new(coordinator.clone(), Duration::from_secs(1));

        let pending = tokio::time::timeout(Duration::from_millis(20), sequencer.wait_for_trigger(never())).await;
        assert!(pending.is_err());
        assert_eq!(coordinator.state(), LifecycleState::Running);

        let c = coordinator.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            c.request_shutdown("http");
        });
        assert_eq!(sequencer.wait_for_trigger(never()).await, ShutdownTrigger::Request("http"));
    }
}
