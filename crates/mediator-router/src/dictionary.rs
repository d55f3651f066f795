//! Client dictionaries
//!
//! A dictionary maps the server's message texts (and client UI labels) to
//! their translation. Clients fetch one with a `dictionary` request; the
//! router only validates the tag and forwards what the provider resolves.

use dashmap::DashMap;
use mediator_core::names::is_valid_lang;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::{Result, RouterError};

/// Language used when a requested one is not available
pub const DEFAULT_LANG: &str = "en";

const BUILTIN: &[(&str, &str)] = &[
    ("en", include_str!("../lang/en.json")),
    ("de", include_str!("../lang/de.json")),
];

/// A parsed dictionary
#[derive(Debug, Clone)]
pub struct Dictionary {
    lang: String,
    json: String,
    entries: HashMap<String, String>,
}

impl Dictionary {
    /// Parse a dictionary given as a JSON object.
    ///
    /// Non-string values are kept as their JSON text.
    pub fn parse(lang: &str, json: String) -> Result<Self> {
        let map: Map<String, Value> = serde_json::from_str(&json)
            .map_err(|e| RouterError::Dictionary(format!("{}: {}", lang, e)))?;
        let entries = map
            .into_iter()
            .map(|(key, value)| {
                let text = match value {
                    Value::String(text) => text,
                    other => other.to_string(),
                };
                (key, text)
            })
            .collect();
        Ok(Self {
            lang: lang.to_string(),
            json,
            entries,
        })
    }

    /// Language tag, e.g. `de` or `zh-Hans`
    pub fn lang(&self) -> &str {
        &self.lang
    }

    /// The dictionary as received, sent to clients unchanged
    pub fn json(&self) -> &str {
        &self.json
    }

    /// Translation of `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolves language tags to dictionaries
pub trait DictionaryProvider: Send + Sync {
    /// The dictionary of `lang`, or of the fallback language; `None` if
    /// neither is available
    fn resolve(&self, lang: &str) -> Option<Arc<Dictionary>>;
}

/// Dictionaries from an optional directory and the built-in set.
///
/// Resolved dictionaries are cached for the lifetime of the store.
#[derive(Debug, Default)]
pub struct DictionaryStore {
    dir: Option<PathBuf>,
    cache: DashMap<String, Arc<Dictionary>>,
}

impl DictionaryStore {
    /// `dir` is searched for `<lang>.json` before the built-in dictionaries
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            cache: DashMap::new(),
        }
    }

    /// Store with the built-in dictionaries only
    pub fn builtin() -> Self {
        Self::default()
    }

    fn lookup(&self, lang: &str, fallback: bool) -> Option<Arc<Dictionary>> {
        if let Some(cached) = self.cache.get(lang) {
            return Some(Arc::clone(cached.value()));
        }

        match self.load(lang) {
            Ok(Some(dictionary)) => {
                let dictionary = self
                    .cache
                    .entry(lang.to_string())
                    .or_insert_with(|| Arc::new(dictionary));
                Some(Arc::clone(dictionary.value()))
            }
            Ok(None) if fallback && lang != DEFAULT_LANG => {
                info!("No dictionary for {}, falling back to {}", lang, DEFAULT_LANG);
                self.lookup(DEFAULT_LANG, false)
            }
            Ok(None) => None,
            Err(e) => {
                error!("Failed to read dictionary {}: {}", lang, e);
                None
            }
        }
    }

    fn load(&self, lang: &str) -> Result<Option<Dictionary>> {
        // Tags end up in a file name
        if !is_valid_lang(lang) {
            return Ok(None);
        }

        if let Some(dir) = &self.dir {
            let path = dir.join(format!("{}.json", lang));
            match std::fs::read_to_string(&path) {
                Ok(json) => {
                    info!("Read dictionary {} of language {}", path.display(), lang);
                    return Dictionary::parse(lang, json).map(Some);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        match BUILTIN.iter().find(|(tag, _)| *tag == lang) {
            Some((_, json)) => {
                info!("Read built-in dictionary of language {}", lang);
                Dictionary::parse(lang, json.to_string()).map(Some)
            }
            None => Ok(None),
        }
    }
}

impl DictionaryProvider for DictionaryStore {
    fn resolve(&self, lang: &str) -> Option<Arc<Dictionary>> {
        self.lookup(lang, true)
    }
}
