//! Accepting side of the server socket.
//!
//! Each accepted stream comes with a [`ConnectionPermit`]; at most
//! `max_connections` of them exist at once, so the accept loop stalls
//! instead of opening sockets past the limit.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ListenerConfig;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("cannot listen: {0}")]
    Bind(std::io::Error),
    #[error("accept failed: {0}")]
    Accept(std::io::Error),
    /// The permit pool was closed under us.
    #[error("listener closed")]
    Closed,
}

/// Server socket plus the permit pool that caps open connections.
pub struct Listener {
    socket: TcpListener,
    slots: Arc<Semaphore>,
}

impl Listener {
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr: SocketAddr = config
            .bind_address
            .parse()
            .map_err(|e| ListenerError::Bind(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?;

        let socket = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
        let bound = socket.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(
            address = %bound,
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            socket,
            slots: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    /// Next connection. A free slot is taken before the socket is polled,
    /// and dropping the future at either await loses nothing.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        let slot = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;
        let (stream, peer) = self.socket.accept().await.map_err(ListenerError::Accept)?;

        tracing::debug!(peer = %peer, free_slots = self.slots.available_permits(), "Accepted");
        Ok((stream, peer, ConnectionPermit { _slot: slot }))
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.socket.local_addr()
    }
}

/// Keeps one connection slot taken until dropped.
#[derive(Debug)]
pub struct ConnectionPermit {
    _slot: OwnedSemaphorePermit,
}
