//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Start listener task → block on sequencer → block on completion
//!
//! Triggers (shutdown.rs):
//!     /shutdown ──┐
//!                 ├─ compare-and-set gate → first one wins
//!     SIGINT/TERM ┘
//!
//! Shutdown (sequencer.rs):
//!     Trigger → stop accepting → drain connections → force-close at deadline
//! ```
//!
//! # Design Decisions
//! - One coordinator per server, no global state
//! - Shutdown has a timeout: forced close after the deadline
//! - Shutdown errors are logged, never fatal

pub mod sequencer;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use sequencer::{GracefulStop, ShutdownOutcome, ShutdownReport, ShutdownSequencer};
pub use shutdown::{LifecycleState, RequestOutcome, ShutdownCoordinator, ShutdownError, ShutdownTrigger};
pub use signals::{wait_for_signal, OsSignal};
