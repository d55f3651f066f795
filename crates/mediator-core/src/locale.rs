//! Locale-aware case folding
//!
//! Participant names and session ids are compared case-insensitively. The
//! folding follows the configured locale so that, for example, a Turkish
//! deployment maps `I` to `ı` rather than `i`.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A BCP 47 language tag used for case folding
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locale {
    tag: String,
    language: String,
}

impl Locale {
    pub fn new(tag: &str) -> Result<Self> {
        let tag = tag.trim().replace('_', "-");
        let mut subtags = tag.split('-');
        let language = subtags.next().unwrap_or_default();
        let language_ok =
            (2..=8).contains(&language.len()) && language.chars().all(|c| c.is_ascii_alphabetic());
        let rest_ok = subtags
            .all(|s| (1..=8).contains(&s.len()) && s.chars().all(|c| c.is_ascii_alphanumeric()));
        if !language_ok || !rest_ok {
            return Err(Error::InvalidLocale(tag));
        }
        Ok(Self {
            language: language.to_ascii_lowercase(),
            tag,
        })
    }

    /// Full tag as configured
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Primary language subtag, lower-case
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Lower-case `text` under this locale
    pub fn fold(&self, text: &str) -> String {
        match self.language.as_str() {
            "tr" | "az" => {
                let mut out = String::with_capacity(text.len());
                for c in text.chars() {
                    match c {
                        'I' => out.push('ı'),
                        '\u{130}' => out.push('i'),
                        _ => out.extend(c.to_lowercase()),
                    }
                }
                out
            }
            _ => text.to_lowercase(),
        }
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self {
            tag: "de".to_string(),
            language: "de".to_string(),
        }
    }
}

impl FromStr for Locale {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag)
    }
}
