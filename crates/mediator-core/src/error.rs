//! Error types for the signaling protocol

use thiserror::Error;

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Protocol error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Message exceeds the accepted length (in characters)
    #[error("message too long: {len} characters (max {max})")]
    MessageTooLong { len: usize, max: usize },

    /// Text is not valid JSON
    #[error("malformed json: {0}")]
    MalformedJson(String),

    /// Valid JSON, but not an object
    #[error("message is not a json object")]
    NotAnObject,

    /// A mandatory field is absent
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A field holds a JSON value of the wrong kind
    #[error("unexpected value type of field {0}")]
    InvalidFieldType(&'static str),

    /// An integer field could not be interpreted
    #[error("invalid integer in field {field}: {value}")]
    InvalidInteger { field: &'static str, value: String },

    /// The nested RTC object of a routed message is absent
    #[error("missing payload object: {0}")]
    MissingPayload(&'static str),

    /// Response serialization failed
    #[error("encode error: {0}")]
    Encode(String),

    /// Invalid ISO-8601 duration
    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    /// Invalid locale tag
    #[error("invalid locale: {0}")]
    InvalidLocale(String),
}

impl Error {
    /// Whether the error was caused by the shape of a client message.
    ///
    /// Validation errors are answered with the generic "arguments" failure,
    /// everything else with the generic "internal" failure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::MessageTooLong { .. }
                | Error::MalformedJson(_)
                | Error::NotAnObject
                | Error::MissingField(_)
                | Error::InvalidFieldType(_)
                | Error::InvalidInteger { .. }
                | Error::MissingPayload(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        match e.classify() {
            serde_json::error::Category::Data => Error::NotAnObject,
            _ => Error::MalformedJson(e.to_string()),
        }
    }
}
