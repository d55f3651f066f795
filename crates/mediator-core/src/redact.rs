//! Redaction of personal data in log output

use std::borrow::Cow;
use std::net::SocketAddr;

/// Number of name characters kept in log lines
const SHORT_NAME_LEN: usize = 3;

/// Shorten a participant name for logging: `Alice` becomes `Ali*`
pub fn short_name(name: Option<&str>) -> Cow<'_, str> {
    match name {
        None => Cow::Borrowed(""),
        Some("") => Cow::Borrowed("#BLANK#"),
        Some(name) => match name.char_indices().nth(SHORT_NAME_LEN) {
            None => Cow::Borrowed(name),
            Some((cut, _)) => Cow::Owned(format!("{}*", &name[..cut])),
        },
    }
}

/// Mask a remote address, keeping its first group and the port:
/// `192.168.1.2:1234` becomes `192.[...]:1234`
pub fn mask_addr(addr: &SocketAddr) -> String {
    match addr {
        SocketAddr::V4(v4) => format!("{}.[...]:{}", v4.ip().octets()[0], v4.port()),
        SocketAddr::V6(v6) => format!("{:x}:[...]:{}", v6.ip().segments()[0], v6.port()),
    }
}

/// Mask an optional address, for handles that do not know their peer
pub fn mask_opt_addr(addr: Option<SocketAddr>) -> String {
    addr.as_ref()
        .map(mask_addr)
        .unwrap_or_else(|| "[...]".to_string())
}

/// Cut a message down to `max` characters for diagnostics
pub fn excerpt(text: &str, max: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max) {
        None => Cow::Borrowed(text),
        Some((cut, _)) => Cow::Owned(format!("{}[...]", &text[..cut])),
    }
}
