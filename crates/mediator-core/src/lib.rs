//! Stream Mediator Core
//!
//! Wire-level building blocks of the signaling broker:
//! - Inbound message decoding ([`InboundMessage`], [`MessageType`])
//! - Response encoding ([`Response`])
//! - Identifier and language tag validation ([`names`])
//! - Locale-aware case folding ([`Locale`])
//! - ISO-8601 duration parsing ([`duration`])
//! - Log redaction helpers ([`redact`])

pub mod duration;
pub mod error;
pub mod locale;
pub mod names;
pub mod protocol;
pub mod redact;
pub mod response;

pub use error::{Error, Result};
pub use locale::Locale;
pub use protocol::{msg, InboundMessage, MessageType, LOG_EXCERPT_LEN, MAX_MESSAGE_LEN};
pub use response::{Field, Response};

/// Response type used for failures that cannot be attributed to a request type
pub const ERROR_TYPE: &str = "error";

/// Response type of the greeting sent when a connection is opened
pub const CONNECT_TYPE: &str = "connect";
