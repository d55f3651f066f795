//! Transport error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("connection closed")]
    ConnectionClosed,

    /// The peer went away without a closing handshake
    #[error("unexpected end of stream: {0}")]
    Eof(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// No inbound frame within the idle timeout
    #[error("idle timeout")]
    Timeout,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("not connected")]
    NotConnected,

    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Errors that merely signal the end of a connection
    pub fn is_disconnect(&self) -> bool {
        match self {
            TransportError::Timeout
            | TransportError::Eof(_)
            | TransportError::ConnectionClosed
            | TransportError::NotConnected => true,
            TransportError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

#[cfg(feature = "websocket")]
impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::error::ProtocolError;
        use tokio_tungstenite::tungstenite::Error as WsError;

        match e {
            WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::ConnectionClosed,
            WsError::Io(io) => TransportError::Io(io),
            WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
                TransportError::Eof("connection reset without closing handshake".into())
            }
            WsError::Protocol(p) => TransportError::Protocol(p.to_string()),
            other => TransportError::Other(other.to_string()),
        }
    }
}
