//! Outbound response encoding
//!
//! Every response carries `type` and `success` first, followed by the
//! type-specific fields in insertion order.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::value::RawValue;

use crate::error::{Error, Result};

/// Value of a response field
#[derive(Debug, Clone)]
pub enum Field {
    Text(String),
    Int(i64),
    /// JSON forwarded verbatim
    Raw(Box<RawValue>),
    Null,
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Field::Text(s) => serializer.serialize_str(s),
            Field::Int(i) => serializer.serialize_i64(*i),
            Field::Raw(raw) => raw.serialize(serializer),
            Field::Null => serializer.serialize_unit(),
        }
    }
}

/// A response frame under construction
#[derive(Debug, Clone)]
pub struct Response {
    kind: String,
    success: bool,
    fields: Vec<(String, Field)>,
}

impl Response {
    pub fn success(kind: impl Into<String>) -> Self {
        Self::new(kind, true)
    }

    pub fn failure(kind: impl Into<String>) -> Self {
        Self::new(kind, false)
    }

    fn new(kind: impl Into<String>, success: bool) -> Self {
        Self {
            kind: kind.into(),
            success,
            fields: Vec::new(),
        }
    }

    /// Add (or replace) a text field
    pub fn with_text(self, key: &str, value: impl Into<String>) -> Self {
        self.with_field(key, Field::Text(value.into()))
    }

    /// Shorthand for the `msg` field
    pub fn with_msg(self, msg: &str) -> Self {
        self.with_text("msg", msg)
    }

    /// Add an integer field; `None` leaves the field out
    pub fn with_int(self, key: &str, value: Option<i64>) -> Self {
        match value {
            Some(i) => self.with_field(key, Field::Int(i)),
            None => self,
        }
    }

    /// Add a verbatim JSON field; `None` is written as `null`
    pub fn with_raw(self, key: &str, value: Option<&RawValue>) -> Self {
        let field = match value {
            Some(raw) => Field::Raw(raw.to_owned()),
            None => Field::Null,
        };
        self.with_field(key, field)
    }

    pub fn with_field(mut self, key: &str, value: Field) -> Self {
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((key.to_string(), value)),
        }
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn field(&self, key: &str) -> Option<&Field> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Encode as a single-line JSON object
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Encode(e.to_string()))
    }
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2 + self.fields.len()))?;
        map.serialize_entry("type", &self.kind)?;
        map.serialize_entry("success", &self.success)?;
        for (key, value) in &self.fields {
            if key == "type" || key == "success" {
                continue;
            }
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_order() {
        let json = Response::success("login")
            .with_msg("ok")
            .with_int("boxType", Some(1))
            .with_text("name", "A")
            .with_int("localNr", None)
            .to_json()
            .unwrap();
        assert_eq!(
            json,
            r#"{"type":"login","success":true,"msg":"ok","boxType":1,"name":"A"}"#
        );
    }

    #[test]
    fn test_raw_field_is_verbatim() {
        let raw = RawValue::from_string(r#"{"sdp" : "v=0\r\n",  "type":"offer"}"#.to_string())
            .unwrap();
        let json = Response::success("offer")
            .with_raw("offer", Some(&raw))
            .to_json()
            .unwrap();
        assert_eq!(
            json,
            r#"{"type":"offer","success":true,"offer":{"sdp" : "v=0\r\n",  "type":"offer"}}"#
        );
    }

    #[test]
    fn test_null_payload() {
        let json = Response::success("requestCall")
            .with_raw("requestCall", None)
            .to_json()
            .unwrap();
        assert_eq!(json, r#"{"type":"requestCall","success":true,"requestCall":null}"#);
    }

    #[test]
    fn test_replacing_a_field() {
        let response = Response::failure("logout").with_msg("a").with_msg("b");
        assert!(!response.is_success());
        assert!(matches!(response.field("msg"), Some(Field::Text(s)) if s == "b"));
    }
}
