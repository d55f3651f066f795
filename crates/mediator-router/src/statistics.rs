//! Usage counters

use mediator_core::MessageType;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Counted events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatKey {
    Connect,
    Close,
    Error,
    Message,
    Login,
    Relogin,
    RequestCall,
    RejectCall,
    Offer,
    Answer,
    Candidate,
    Dictionary,
    Leave,
    Logout,
}

impl StatKey {
    /// All keys, in reporting order
    pub const ALL: [StatKey; 14] = [
        StatKey::Connect,
        StatKey::Close,
        StatKey::Error,
        StatKey::Message,
        StatKey::Login,
        StatKey::Relogin,
        StatKey::RequestCall,
        StatKey::RejectCall,
        StatKey::Offer,
        StatKey::Answer,
        StatKey::Candidate,
        StatKey::Dictionary,
        StatKey::Leave,
        StatKey::Logout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatKey::Connect => "connect",
            StatKey::Close => "close",
            StatKey::Error => "error",
            StatKey::Message => "message",
            StatKey::Login => "login",
            StatKey::Relogin => "relogin",
            StatKey::RequestCall => "requestCall",
            StatKey::RejectCall => "rejectCall",
            StatKey::Offer => "offer",
            StatKey::Answer => "answer",
            StatKey::Candidate => "candidate",
            StatKey::Dictionary => "dictionary",
            StatKey::Leave => "leave",
            StatKey::Logout => "logout",
        }
    }

    /// Counter of a request type
    pub fn for_message(kind: MessageType) -> Self {
        match kind {
            MessageType::Login => StatKey::Login,
            MessageType::Relogin => StatKey::Relogin,
            MessageType::Logout => StatKey::Logout,
            MessageType::RequestCall => StatKey::RequestCall,
            MessageType::RejectCall => StatKey::RejectCall,
            MessageType::Leave => StatKey::Leave,
            MessageType::Offer => StatKey::Offer,
            MessageType::Answer => StatKey::Answer,
            MessageType::Candidate => StatKey::Candidate,
            MessageType::Dictionary => StatKey::Dictionary,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for StatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-lifetime counters, never reset
#[derive(Debug)]
pub struct Statistics {
    counters: [AtomicU64; StatKey::ALL.len()],
}

impl Default for Statistics {
    fn default() -> Self {
        Self {
            counters: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, key: StatKey) {
        self.counters[key.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, key: StatKey) -> u64 {
        self.counters[key.index()].load(Ordering::Relaxed)
    }

    /// Current value of every counter, in reporting order
    pub fn snapshot(&self) -> Vec<(StatKey, u64)> {
        StatKey::ALL.iter().map(|&key| (key, self.get(key))).collect()
    }

    /// Write every counter to the log
    pub fn log(&self) {
        for (key, count) in self.snapshot() {
            info!("Count {}: {}", key, count);
        }
    }
}
