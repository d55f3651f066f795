//! Stream Mediator Transport Layer
//!
//! The signaling core never touches sockets directly. It talks to
//! connections through:
//! - [`PeerHandle`]: non-blocking send, close, idle timeout
//! - [`TransportReceiver`]: the inbound event stream of one connection
//! - [`TransportServer`]: a listener producing handle/receiver pairs
//!
//! The WebSocket implementation (default feature) is built on
//! tokio-tungstenite.

pub mod error;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use error::{Result, TransportError};
pub use traits::{PeerHandle, TransportEvent, TransportReceiver, TransportServer};

#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConfig, WebSocketHandle, WebSocketReceiver, WebSocketServer};
