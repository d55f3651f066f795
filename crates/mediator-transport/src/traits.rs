//! Transport trait definitions

use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Result, TransportError};

/// Events that can occur on a connection
#[derive(Debug)]
pub enum TransportEvent {
    /// Connection established
    Connected,
    /// Text frame received
    Text(String),
    /// Connection closed (clean or not)
    Disconnected {
        code: Option<u16>,
        reason: Option<String>,
    },
    /// Error occurred; usually followed by `Disconnected`
    Error(TransportError),
}

/// Send half of a connection.
///
/// Handles are shared between the connection task and the registries, so
/// every operation takes `&self`. Sending is a handoff to the transport's
/// outbound queue: it never waits for delivery, and a full or closed queue
/// is reported immediately as an error.
pub trait PeerHandle: Send + Sync {
    /// Queue a text frame
    fn send_text(&self, text: String) -> Result<()>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Close the connection (best effort)
    fn close(&self);

    /// Close the connection when no frame arrives within `timeout`
    fn set_idle_timeout(&self, timeout: Duration);

    /// Remote address, if known
    fn remote_addr(&self) -> Option<SocketAddr>;
}

/// Trait for receiving events
#[async_trait]
pub trait TransportReceiver: Send {
    /// Receive the next event; `None` once the connection is gone
    async fn recv(&mut self) -> Option<TransportEvent>;
}

/// Trait for transport servers (listeners)
#[async_trait]
pub trait TransportServer: Send + Sync {
    /// The handle type for accepted connections
    type Handle: PeerHandle;
    /// The receiver type for accepted connections
    type Receiver: TransportReceiver;

    /// Accept a new connection
    async fn accept(&mut self) -> Result<(Self::Handle, Self::Receiver, SocketAddr)>;

    /// Get the local address
    fn local_addr(&self) -> Result<SocketAddr>;

    /// Close the server
    async fn close(&self) -> Result<()>;
}
