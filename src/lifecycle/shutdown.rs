//! Shutdown coordination for the server.
//!
//! A [`ShutdownCoordinator`] is the single gate every shutdown trigger goes
//! through. The lifecycle state word doubles as the shutdown flag: the first
//! caller to move it out of [`LifecycleState::Running`] wins, everyone else
//! becomes a no-op.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};

use crate::lifecycle::signals::OsSignal;
use crate::observability::metrics;

/// Process-level lifecycle states. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LifecycleState {
    Running = 0,
    ShutdownRequested = 1,
    ShuttingDown = 2,
    Stopped = 3,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::ShutdownRequested,
            2 => Self::ShuttingDown,
            _ => Self::Stopped,
        }
    }
}

/// What caused the shutdown sequence to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// An OS termination signal.
    Signal(OsSignal),
    /// An explicit request, tagged with where it came from (e.g. "http").
    Request(&'static str),
}

impl fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownTrigger::Signal(signal) => write!(f, "signal {}", signal),
            ShutdownTrigger::Request(source) => write!(f, "request from {}", source),
        }
    }
}

/// Result of an explicit shutdown request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// This call won the race; the sequencer has been notified.
    Accepted,
    /// A shutdown was already requested; nothing happened.
    AlreadyInProgress,
}

/// Errors surfaced by the bounded shutdown procedure.
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("graceful shutdown timed out after {after:?}, force-closing {remaining} connection(s)")]
    Timeout { after: Duration, remaining: u64 },
}

/// Single-shot gate for shutdown triggers.
///
/// Owned by the server lifecycle (usually behind an `Arc`) and shared with
/// request handlers. Holds the state word and the notification channel that
/// wakes the sequencer when an explicit request wins.
pub struct ShutdownCoordinator {
    state: AtomicU8,
    /// Published copy of `state` for observers.
    state_tx: watch::Sender<LifecycleState>,
    notify_tx: mpsc::Sender<ShutdownTrigger>,
    notify_rx: Mutex<mpsc::Receiver<ShutdownTrigger>>,
}

impl ShutdownCoordinator {
    /// Create a new coordinator in the `Running` state.
    pub fn new() -> Self {
        // Only the winning caller ever sends, so one slot is always enough.
        let (notify_tx, notify_rx) = mpsc::channel(1);
        let (state_tx, _) = watch::channel(LifecycleState::Running);
        Self {
            state: AtomicU8::new(LifecycleState::Running as u8),
            state_tx,
            notify_tx,
            notify_rx: Mutex::new(notify_rx),
        }
    }

    /// Ask for a shutdown. Safe to call from any number of tasks at once.
    ///
    /// Never waits for the shutdown itself: the winner only queues a
    /// notification for the sequencer and returns.
    pub fn request_shutdown(&self, source: &'static str) -> RequestOutcome {
        if !self.advance(LifecycleState::Running, LifecycleState::ShutdownRequested) {
            tracing::info!(source, state = ?self.state(), "Shutdown call in progress, ignoring request");
            metrics::record_shutdown_request("ignored");
            return RequestOutcome::AlreadyInProgress;
        }

        tracing::info!(source, "Shutdown requested");
        metrics::record_shutdown_request("accepted");

        if let Err(e) = self.notify_tx.try_send(ShutdownTrigger::Request(source)) {
            tracing::warn!(source, error = %e, "Failed to notify shutdown sequencer");
        }
        RequestOutcome::Accepted
    }

    /// Mark the shutdown as requested on behalf of an OS signal.
    ///
    /// Returns `true` if the signal won the race. Either way, later explicit
    /// requests are no-ops afterwards.
    pub fn claim_for_signal(&self, signal: OsSignal) -> bool {
        let won = self.advance(LifecycleState::Running, LifecycleState::ShutdownRequested);
        if won {
            metrics::record_shutdown_request("accepted");
        } else {
            tracing::debug!(signal = %signal, "Signal arrived after a shutdown was already requested");
        }
        won
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether any trigger has already fired.
    pub fn is_shutdown_requested(&self) -> bool {
        self.state() != LifecycleState::Running
    }

    /// Subscribe to lifecycle state changes.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state_tx.subscribe()
    }

    /// Compare-and-set `from → to`. Returns `true` if this call made the move.
    pub(crate) fn advance(&self, from: LifecycleState, to: LifecycleState) -> bool {
        let moved = self
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if moved {
            // Publishers may interleave; never let the observed state go backwards.
            self.state_tx.send_if_modified(|current| {
                if *current < to {
                    *current = to;
                    true
                } else {
                    false
                }
            });
        }
        moved
    }

    /// Wait for the winning explicit request, if one ever arrives.
    pub(crate) async fn next_request(&self) -> Option<ShutdownTrigger> {
        self.notify_rx.lock().await.recv().await
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn second_request_is_a_no_op() {
        let coordinator = ShutdownCoordinator::new();

        assert_eq!(coordinator.request_shutdown("test"), RequestOutcome::Accepted);
        assert_eq!(coordinator.request_shutdown("test"), RequestOutcome::AlreadyInProgress);
        assert_eq!(coordinator.state(), LifecycleState::ShutdownRequested);

        assert_eq!(coordinator.next_request().await, Some(ShutdownTrigger::Request("test")));
        let mut rx = coordinator.notify_rx.lock().await;
        assert!(rx.try_recv().is_err(), "only the winner may notify");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_have_one_winner() {
        let coordinator = Arc::new(ShutdownCoordinator::new());

        let mut handles = Vec::new();
        for _ in 0..64 {
            let coordinator = coordinator.clone();
            handles.push(tokio::spawn(async move { coordinator.request_shutdown("http") }));
        }

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap() == RequestOutcome::Accepted {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);

        assert!(coordinator.next_request().await.is_some());
        assert!(coordinator.notify_rx.lock().await.try_recv().is_err());
    }

    #[test]
    fn signal_claim_blocks_later_requests() {
        let coordinator = ShutdownCoordinator::new();

        assert!(coordinator.claim_for_signal(OsSignal::Terminate));
        assert_eq!(coordinator.request_shutdown("http"), RequestOutcome::AlreadyInProgress);
        assert!(!coordinator.claim_for_signal(OsSignal::Interrupt));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn signal_and_request_race_has_one_winner() {
        for _ in 0..100 {
            let coordinator = Arc::new(ShutdownCoordinator::new());
            let c1 = coordinator.clone();
            let c2 = coordinator.clone();

            let signal = tokio::spawn(async move { c1.claim_for_signal(OsSignal::Interrupt) });
            let request = tokio::spawn(async move { c2.request_shutdown("http") == RequestOutcome::Accepted });

            let winners = [signal.await.unwrap(), request.await.unwrap()]
                .into_iter()
                .filter(|won| *won)
                .count();
            assert_eq!(winners, 1);
        }
    }

    #[test]
    fn state_only_moves_forward() {
        let coordinator = ShutdownCoordinator::new();
        let rx = coordinator.subscribe();

        assert!(!coordinator.advance(LifecycleState::ShutdownRequested, LifecycleState::ShuttingDown));
        assert!(coordinator.advance(LifecycleState::Running, LifecycleState::ShutdownRequested));
        assert!(coordinator.advance(LifecycleState::ShutdownRequested, LifecycleState::ShuttingDown));
        assert!(coordinator.advance(LifecycleState::ShuttingDown, LifecycleState::Stopped));
        assert!(!coordinator.advance(LifecycleState::Running, LifecycleState::ShutdownRequested));

        assert_eq!(*rx.borrow(), LifecycleState::Stopped);
        assert!(coordinator.is_shutdown_requested());
    }

    #[test]
    fn trigger_display() {
        assert_eq!(ShutdownTrigger::Signal(OsSignal::Interrupt).to_string(), "signal SIGINT");
        assert_eq!(ShutdownTrigger::Request("http").to_string(), "request from http");
    }
}
