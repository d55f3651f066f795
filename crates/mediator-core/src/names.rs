//! Lexical validation of participant names, session ids and language tags

use regex_lite::Regex;
use std::sync::OnceLock;

/// Printable text without control characters or quotes, 1-40 characters.
/// Applies to participant names and session ids alike.
const NAME_PATTERN: &str = "^[^\\x00-\\x1f\\x{85}'\"\u{201e}\u{201c}]{1,40}$";

/// Letters, digits and hyphens, 1-10 characters (`en`, `de`, `zh-Hans`)
const LANG_PATTERN: &str = "^[a-zA-Z0-9-]{1,10}$";

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(NAME_PATTERN).expect("name pattern compiles"))
}

fn lang_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(LANG_PATTERN).expect("language pattern compiles"))
}

/// Check a participant name or session id
pub fn is_valid_name(name: &str) -> bool {
    name_regex().is_match(name)
}

/// Check a language tag
pub fn is_valid_lang(lang: &str) -> bool {
    lang_regex().is_match(lang)
}
