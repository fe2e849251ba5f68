//! Blog API server with coordinated graceful shutdown.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ net::listener ──▶ http::server ──▶ http::handlers
//!                                                      │
//!                                             /shutdown│
//!                                                      ▼
//!   SIGINT/SIGTERM ─────────────────▶ lifecycle::shutdown (gate)
//!                                                      │
//!                                                      ▼
//!                                   lifecycle::sequencer (bounded drain)
//! ```

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod model;
pub mod net;
pub mod observability;

pub use config::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::ShutdownCoordinator;
