//! Session and connection registries
//!
//! Both registries are concurrent maps keyed by string and stamped with the
//! time of their last (re)registration. Eviction is purely age based: a
//! cleanup pass first takes a snapshot of the stale keys, then removes only
//! those entries that are still stale at removal time, so an entry refreshed
//! in between survives.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use mediator_core::Locale;
use mediator_transport::PeerHandle;
use std::sync::Arc;
use std::time::Instant;

/// Active sessions and their creation time
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Instant>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `id` unless it is already taken. Returns true if inserted.
    pub fn insert_if_absent(&self, id: &str, now: Instant) -> bool {
        match self.sessions.entry(id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }

    /// Insert or refresh `id`
    pub fn upsert(&self, id: &str, now: Instant) {
        self.sessions.insert(id.to_string(), now);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn created_at(&self, id: &str) -> Option<Instant> {
        self.sessions.get(id).map(|entry| *entry.value())
    }

    /// Ids created before `cutoff`
    pub fn snapshot_older_than(&self, cutoff: Instant) -> Vec<String> {
        self.sessions
            .iter()
            .filter(|entry| *entry.value() < cutoff)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Remove the given ids that are still older than `cutoff`.
    /// Returns the number of removed sessions.
    pub fn remove_all(&self, ids: &[String], cutoff: Instant) -> usize {
        ids.iter()
            .filter(|id| {
                self.sessions
                    .remove_if(id.as_str(), |_, created| *created < cutoff)
                    .is_some()
            })
            .count()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// A registered participant connection
#[derive(Clone)]
pub struct Connection {
    pub handle: Arc<dyn PeerHandle>,
    pub created_at: Instant,
}

/// Live connections keyed by `fold(name)#session`
pub struct ConnectionRegistry {
    locale: Locale,
    connections: DashMap<String, Connection>,
}

impl ConnectionRegistry {
    pub fn new(locale: Locale) -> Self {
        Self {
            locale,
            connections: DashMap::new(),
        }
    }

    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    /// Registry key of a participant. `session` must already be folded.
    pub fn key(&self, name: &str, session: &str) -> String {
        format!("{}#{}", self.locale.fold(name), session)
    }

    /// Register a connection, returning the one it replaces
    pub fn put(
        &self,
        name: &str,
        session: &str,
        handle: Arc<dyn PeerHandle>,
        now: Instant,
    ) -> Option<Connection> {
        let connection = Connection {
            handle,
            created_at: now,
        };
        self.connections.insert(self.key(name, session), connection)
    }

    pub fn get(&self, name: &str, session: &str) -> Option<Arc<dyn PeerHandle>> {
        self.connections
            .get(&self.key(name, session))
            .map(|entry| Arc::clone(&entry.handle))
    }

    pub fn remove(&self, name: &str, session: &str) -> Option<Arc<dyn PeerHandle>> {
        self.connections
            .remove(&self.key(name, session))
            .map(|(_, connection)| connection.handle)
    }

    /// Keys of connections registered before `cutoff`
    pub fn snapshot_older_than(&self, cutoff: Instant) -> Vec<String> {
        self.connections
            .iter()
            .filter(|entry| entry.created_at < cutoff)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Remove the given keys that are still older than `cutoff`.
    /// Returns the number of removed connections.
    pub fn remove_all(&self, keys: &[String], cutoff: Instant) -> usize {
        keys.iter()
            .filter(|key| {
                self.connections
                    .remove_if(key.as_str(), |_, connection| connection.created_at < cutoff)
                    .is_some()
            })
            .count()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
