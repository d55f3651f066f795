//! Signaling message types and inbound decoding
//!
//! Every inbound frame is a single JSON object with a mandatory `type`
//! field. Decoding keeps the raw text of every top-level value so that the
//! nested RTC objects (`offer`, `answer`, `candidate`) can be forwarded
//! exactly as they were received.

use serde_json::value::RawValue;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

/// Maximum accepted message length in characters
pub const MAX_MESSAGE_LEN: usize = 16384;

/// Number of characters of a rejected message kept for diagnostics
pub const LOG_EXCERPT_LEN: usize = 1024;

/// Response messages.
///
/// These texts double as keys of the client dictionaries.
pub mod msg {
    pub const CONNECT_HINT: &str =
        "Log in with a name or pseudonym together with a shared session name.";
    pub const OVERLOADED: &str = "The server is currently overloaded. Please try again later.";
    pub const BAD_ARGUMENTS: &str = "The server could not process the arguments of the request.";
    pub const INTERNAL: &str = "The server could not process the request.";
    pub const UNEXPECTED_TYPE: &str = "Unexpected type";
    pub const UNEXPECTED_USER: &str = "Unexpected user";
    pub const UNEXPECTED_PEER_USER: &str = "Unexpected peer user";
    pub const UNEXPECTED_SESSION: &str = "Unexpected session id";
    pub const UNEXPECTED_LANGUAGE: &str = "Unexpected language";
    pub const UNSUPPORTED_LANGUAGE: &str = "Unsupported language";
    pub const LOGIN_OK: &str = "Login ok. You can now connect to other users of this session.";
    pub const RELOGIN_OK: &str = "Relogin ok. The connection has been restored.";
    pub const LOGOUT_OK: &str = "Logout ok";
    pub const NO_SESSION: &str = "No existing session";
    pub const NAME_MISSING: &str = "Name missing";
    pub const MISSING_USER: &str = "Missing user";
    pub const PEER_UNKNOWN: &str = "The selected participant is not known in the session.";
    pub const PEER_UNREACHABLE: &str = "The participant could not be reached.";
}

/// Request types understood by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Login,
    Relogin,
    Logout,
    RequestCall,
    RejectCall,
    Leave,
    Offer,
    Answer,
    Candidate,
    Dictionary,
}

impl MessageType {
    pub const ALL: [MessageType; 10] = [
        MessageType::Login,
        MessageType::Relogin,
        MessageType::Logout,
        MessageType::RequestCall,
        MessageType::RejectCall,
        MessageType::Leave,
        MessageType::Offer,
        MessageType::Answer,
        MessageType::Candidate,
        MessageType::Dictionary,
    ];

    /// Look up a type by its wire name (case-sensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Wire name, also used as the payload field name of routed messages
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Login => "login",
            MessageType::Relogin => "relogin",
            MessageType::Logout => "logout",
            MessageType::RequestCall => "requestCall",
            MessageType::RejectCall => "rejectCall",
            MessageType::Leave => "leave",
            MessageType::Offer => "offer",
            MessageType::Answer => "answer",
            MessageType::Candidate => "candidate",
            MessageType::Dictionary => "dictionary",
        }
    }

    /// Forwarded to a peer rather than answered by the server
    pub fn is_routed(&self) -> bool {
        matches!(
            self,
            MessageType::RequestCall
                | MessageType::RejectCall
                | MessageType::Leave
                | MessageType::Offer
                | MessageType::Answer
                | MessageType::Candidate
        )
    }

    /// Routed with a nested RTC object keyed by the type name
    pub fn carries_payload(&self) -> bool {
        matches!(
            self,
            MessageType::Offer | MessageType::Answer | MessageType::Candidate
        )
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded inbound frame.
///
/// The common fields are extracted eagerly; type-specific fields are read
/// on demand from the retained raw values.
#[derive(Debug)]
pub struct InboundMessage<'a> {
    /// Value of `type`, as sent
    pub kind: String,
    /// Sender name (trimmed)
    pub name: Option<String>,
    /// Addressed peer name (trimmed); a non-string value counts as absent
    pub peer: Option<String>,
    /// Session id (trimmed, not yet case-folded)
    pub session: Option<String>,
    pub box_type: Option<i64>,
    pub local_nr: Option<i64>,
    pub peer_nr: Option<i64>,
    fields: HashMap<String, &'a RawValue>,
}

impl<'a> InboundMessage<'a> {
    /// Decode a frame, rejecting it before parsing when it is longer than
    /// `max_len` characters.
    pub fn decode(text: &'a str, max_len: usize) -> Result<Self> {
        // Byte length bounds the character count, so only count when needed.
        if text.len() > max_len {
            let len = text.chars().count();
            if len > max_len {
                return Err(Error::MessageTooLong { len, max: max_len });
            }
        }

        let fields: HashMap<String, &'a RawValue> = serde_json::from_str(text)?;

        let kind = match fields.get("type") {
            None => return Err(Error::MissingField("type")),
            Some(raw) => match parse_value(raw)? {
                Value::String(kind) => kind,
                _ => return Err(Error::InvalidFieldType("type")),
            },
        };

        let name = strict_string(&fields, "name")?;
        if name.is_none() && kind != MessageType::Dictionary.as_str() {
            return Err(Error::MissingField("name"));
        }
        let peer = lenient_string(&fields, "peer")?;
        let session = strict_string(&fields, "session")?;
        let box_type = integer(&fields, "boxType")?;
        let local_nr = integer(&fields, "localNr")?;
        let peer_nr = integer(&fields, "peerNr")?;

        Ok(Self {
            kind,
            name,
            peer,
            session,
            box_type,
            local_nr,
            peer_nr,
            fields,
        })
    }

    /// The request type, if it is one the router understands
    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::from_name(&self.kind)
    }

    /// Requested language tag of a `dictionary` request (trimmed)
    pub fn lang(&self) -> Result<Option<String>> {
        lenient_string(&self.fields, "lang")
    }

    /// Nested RTC object of an `offer`, `answer` or `candidate`
    pub fn payload(&self, kind: MessageType) -> Result<&'a RawValue> {
        let key = kind.as_str();
        let raw = self
            .fields
            .get(key)
            .copied()
            .ok_or(Error::MissingPayload(key))?;
        match parse_value(raw)? {
            Value::Object(_) => Ok(raw),
            _ => Err(Error::InvalidFieldType(key)),
        }
    }

    /// Whether the message contains a top-level field
    pub fn has_field(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }
}

fn parse_value(raw: &RawValue) -> Result<Value> {
    serde_json::from_str(raw.get()).map_err(|e| Error::MalformedJson(e.to_string()))
}

/// A string field; any other JSON kind is rejected
fn strict_string(
    fields: &HashMap<String, &RawValue>,
    key: &'static str,
) -> Result<Option<String>> {
    match fields.get(key) {
        None => Ok(None),
        Some(raw) => match parse_value(raw)? {
            Value::String(s) => Ok(Some(s.trim().to_string())),
            _ => Err(Error::InvalidFieldType(key)),
        },
    }
}

/// A string field; any other JSON kind counts as absent
fn lenient_string(fields: &HashMap<String, &RawValue>, key: &str) -> Result<Option<String>> {
    match fields.get(key) {
        None => Ok(None),
        Some(raw) => match parse_value(raw)? {
            Value::String(s) => Ok(Some(s.trim().to_string())),
            _ => Ok(None),
        },
    }
}

/// An integer field, given either as a JSON number (fraction truncated) or
/// as a decimal string
fn integer(fields: &HashMap<String, &RawValue>, key: &'static str) -> Result<Option<i64>> {
    let raw = match fields.get(key) {
        None => return Ok(None),
        Some(raw) => raw,
    };
    match parse_value(raw)? {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Some(i))
            } else {
                n.as_f64()
                    .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                    .map(|f| Some(f.trunc() as i64))
                    .ok_or_else(|| Error::InvalidInteger {
                        field: key,
                        value: n.to_string(),
                    })
            }
        }
        Value::String(s) => s
            .parse::<i64>()
            .map(Some)
            .map_err(|_| Error::InvalidInteger { field: key, value: s }),
        _ => Err(Error::InvalidFieldType(key)),
    }
}
