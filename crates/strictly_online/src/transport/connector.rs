//! Seams between the transport and the physical connection.

use async_trait::async_trait;

use crate::error::TransportError;

/// Dials the session server.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Performs the opening handshake and returns a live socket.
    async fn connect(&self, url: &str, token: &str) -> Result<Box<dyn Socket>, TransportError>;
}

/// A live, text-framed, bidirectional connection.
#[async_trait]
pub trait Socket: Send {
    /// Sends one text frame.
    async fn send(&mut self, frame: String) -> Result<(), TransportError>;

    /// Receives the next text frame; `None` once the peer has closed.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    /// Closes the connection from this side.
    async fn close(&mut self) -> Result<(), TransportError>;
}
