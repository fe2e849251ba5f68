//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;

use blog_server::config::ServerConfig;
use blog_server::lifecycle::startup::Lifecycle;

/// Defaults, except an ephemeral loopback port and a short drain bound.
pub fn test_config(shutdown_secs: u64) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.timeouts.shutdown_secs = shutdown_secs;
    config
}

/// Start a server and wait until it is listening.
pub async fn start_server(shutdown_secs: u64) -> (SocketAddr, Lifecycle) {
    let lifecycle = Lifecycle::start(test_config(shutdown_secs));
    let addr = lifecycle.local_addr().await.expect("server should bind");
    (addr, lifecycle)
}

/// Client without pooling or proxy so each request opens a fresh connection.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
