//! Router error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RouterError>;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("no free session id after {attempts} attempts ({sessions} active sessions)")]
    Overloaded { attempts: usize, sessions: usize },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("dictionary error: {0}")]
    Dictionary(String),

    #[error("transport error: {0}")]
    Transport(#[from] mediator_transport::TransportError),

    #[error("protocol error: {0}")]
    Protocol(#[from] mediator_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("router error: {0}")]
    Other(String),
}

impl RouterError {
    /// Whether the error stems from the shape of a client message
    pub fn is_validation(&self) -> bool {
        matches!(self, RouterError::Protocol(e) if e.is_validation())
    }
}
