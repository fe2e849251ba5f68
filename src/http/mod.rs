//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept loop, hyper connection, drain on shutdown)
//!     → request.rs (request ID, accounting)
//!     → handlers.rs (/, /get-users, /shutdown)
//! ```

pub mod handlers;
pub mod request;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, Completion, HttpServer, ServeOutcome, ServerControl, ServerHandle};
