//! Main router implementation
//!
//! The router is transport-agnostic: it accepts connections from any
//! transport implementing [`TransportServer`] and talks to them only
//! through [`PeerHandle`]s. Every inbound text frame goes through
//! [`Router::handle`], which never fails; problems are answered with a
//! JSON failure response on the same connection.
//!
//! Maintenance runs on the back of regular traffic: after each message
//! (and each new connection) the router asks its gates whether a cleanup
//! pass or a statistics dump is due.
//!
//! # Example
//!
//! ```no_run
//! use mediator_router::{Router, RouterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let router = Router::new(RouterConfig::default());
//!     router.serve_websocket("0.0.0.0:8080").await?;
//!     Ok(())
//! }
//! ```

use mediator_core::names::{is_valid_lang, is_valid_name};
use mediator_core::redact::{excerpt, mask_opt_addr, short_name};
use mediator_core::{
    msg, InboundMessage, MessageType, Response, CONNECT_TYPE, ERROR_TYPE, LOG_EXCERPT_LEN,
};
use mediator_transport::{PeerHandle, TransportError, TransportReceiver, TransportServer};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[cfg(feature = "websocket")]
use mediator_transport::WebSocketServer;

use crate::{
    allocator::{CandidateSource, IdentifierAllocator, RandomCandidates},
    clock::wall_time,
    config::RouterConfig,
    dictionary::{DictionaryProvider, DictionaryStore},
    error::Result,
    handler::SignalingConnection,
    maintenance::MaintenanceGate,
    registry::{Connection, ConnectionRegistry, SessionRegistry},
    statistics::{StatKey, Statistics},
};

/// Outcome of a cleanup pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    /// Time of the previous pass
    pub last_run: Instant,
    /// Sessions before eviction
    pub sessions: usize,
    pub evicted_sessions: usize,
    /// Connections before eviction
    pub connections: usize,
    pub evicted_connections: usize,
}

/// Signaling router
#[derive(Clone)]
pub struct Router {
    config: Arc<RouterConfig>,
    sessions: Arc<SessionRegistry>,
    connections: Arc<ConnectionRegistry>,
    allocator: Arc<IdentifierAllocator>,
    cleanup_gate: Arc<MaintenanceGate>,
    statistics_gate: Arc<MaintenanceGate>,
    statistics: Arc<Statistics>,
    dictionaries: Arc<dyn DictionaryProvider>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl Router {
    pub fn new(config: RouterConfig) -> Self {
        let dictionaries = Arc::new(DictionaryStore::new(config.dictionary_dir.clone()));
        Self::with_dictionaries(config, dictionaries)
    }

    /// Create a router resolving dictionaries through `dictionaries`
    pub fn with_dictionaries(
        config: RouterConfig,
        dictionaries: Arc<dyn DictionaryProvider>,
    ) -> Self {
        Self::assemble(config, dictionaries, Arc::new(RandomCandidates))
    }

    /// Create a router drawing session numbers from `candidates`
    pub fn with_candidates(config: RouterConfig, candidates: Arc<dyn CandidateSource>) -> Self {
        let dictionaries = Arc::new(DictionaryStore::new(config.dictionary_dir.clone()));
        Self::assemble(config, dictionaries, candidates)
    }

    fn assemble(
        config: RouterConfig,
        dictionaries: Arc<dyn DictionaryProvider>,
        candidates: Arc<dyn CandidateSource>,
    ) -> Self {
        let now = Instant::now();
        let sessions = Arc::new(SessionRegistry::new());
        let (shutdown, _) = watch::channel(false);
        Self {
            connections: Arc::new(ConnectionRegistry::new(config.locale.clone())),
            allocator: Arc::new(IdentifierAllocator::with_candidates(
                Arc::clone(&sessions),
                candidates,
            )),
            sessions,
            cleanup_gate: Arc::new(MaintenanceGate::new(now)),
            statistics_gate: Arc::new(MaintenanceGate::new(now)),
            statistics: Arc::new(Statistics::new()),
            dictionaries,
            shutdown: Arc::new(shutdown),
            config: Arc::new(config),
        }
    }

    // =========================================================================
    // Connection Lifecycle
    // =========================================================================

    /// Create the handler for a newly accepted connection
    pub fn connection(&self, handle: Arc<dyn PeerHandle>) -> SignalingConnection {
        SignalingConnection::new(self.clone(), handle)
    }

    /// Greet a new connection with a fresh session id
    pub fn open(&self, peer: &Arc<dyn PeerHandle>) {
        self.open_at(peer, Instant::now());
    }

    pub fn open_at(&self, peer: &Arc<dyn PeerHandle>, now: Instant) {
        self.statistics.increment(StatKey::Connect);
        info!("Connection opened: {}", mask_opt_addr(peer.remote_addr()));

        match self.allocator.allocate(now) {
            Ok(session) => {
                self.send(
                    peer.as_ref(),
                    &Response::success(CONNECT_TYPE)
                        .with_text("session", session)
                        .with_msg(msg::CONNECT_HINT),
                );
                peer.set_idle_timeout(self.config.idle_timeout);
            }
            Err(e) => {
                error!("Rejecting connection: {}", e);
                self.send(
                    peer.as_ref(),
                    &Response::failure(CONNECT_TYPE).with_msg(msg::OVERLOADED),
                );
                peer.close();
            }
        }

        self.cleanup_at(now);
    }

    /// Process one inbound text frame
    pub fn handle(&self, peer: &Arc<dyn PeerHandle>, text: &str) {
        self.handle_at(peer, text, Instant::now());
    }

    pub fn handle_at(&self, peer: &Arc<dyn PeerHandle>, text: &str, now: Instant) {
        self.statistics.increment(StatKey::Message);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(peer, text, now)));
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) if e.is_validation() => {
                error!(
                    "Illegal argument while processing message \"{}\" with length {}: {}",
                    excerpt(text, LOG_EXCERPT_LEN),
                    text.chars().count(),
                    e
                );
                Some(msg::BAD_ARGUMENTS)
            }
            Ok(Err(e)) => {
                error!(
                    "Error while processing message \"{}\" with length {}: {}",
                    excerpt(text, LOG_EXCERPT_LEN),
                    text.chars().count(),
                    e
                );
                Some(msg::INTERNAL)
            }
            Err(_) => {
                error!(
                    "Panic while processing message \"{}\" with length {}",
                    excerpt(text, LOG_EXCERPT_LEN),
                    text.chars().count()
                );
                Some(msg::INTERNAL)
            }
        };
        if let Some(reply) = failure {
            self.send(peer.as_ref(), &Response::failure(ERROR_TYPE).with_msg(reply));
        }

        self.cleanup_at(now);
        self.dump_statistics_at(now);
    }

    /// The transport closed a connection
    pub fn closed(&self, peer: &dyn PeerHandle, code: Option<u16>, reason: Option<&str>) {
        self.statistics.increment(StatKey::Close);
        info!(
            "Connection closed: {}, code={:?}, reason={:?}",
            mask_opt_addr(peer.remote_addr()),
            code,
            reason
        );
    }

    /// The transport reported an error on a connection
    pub fn errored(&self, peer: &dyn PeerHandle, error: &TransportError) {
        self.statistics.increment(StatKey::Error);
        let addr = mask_opt_addr(peer.remote_addr());
        match error {
            TransportError::Timeout => info!("WebSocket timeout on {}", addr),
            e if e.is_disconnect() => info!("WebSocket EOF on {}: {}", addr, e),
            e => error!("WebSocket error on {}: {}", addr, e),
        }
    }

    // =========================================================================
    // Message Dispatch
    // =========================================================================

    fn dispatch(&self, peer: &Arc<dyn PeerHandle>, text: &str, now: Instant) -> Result<()> {
        let message = InboundMessage::decode(text, self.config.max_message_len)?;
        let session = message
            .session
            .as_deref()
            .map(|s| self.connections.locale().fold(s));
        let kind = message.message_type();
        if let Some(kind) = kind {
            self.statistics.increment(StatKey::for_message(kind));
        }

        info!(
            "Message from {}: type={}, session={}, name={}, nr={:?}, peer={}, peerNr={:?}, boxType={:?}",
            mask_opt_addr(peer.remote_addr()),
            message.kind,
            session.as_deref().unwrap_or_default(),
            short_name(message.name.as_deref()),
            message.local_nr,
            short_name(message.peer.as_deref()),
            message.peer_nr,
            message.box_type
        );

        let kind = match kind {
            Some(kind) => kind,
            None => {
                error!("Unexpected type: {}", message.kind);
                self.send(
                    peer.as_ref(),
                    &Response::failure(message.kind.as_str()).with_msg(msg::UNEXPECTED_TYPE),
                );
                return Ok(());
            }
        };

        let session = session.as_deref();
        match kind {
            MessageType::Login => self.login(peer, &message, session, now),
            MessageType::Relogin => self.relogin(peer, &message, session, now),
            MessageType::Logout => self.logout(peer, &message, session),
            MessageType::Dictionary => self.dictionary(peer, &message),
            _ => self.route(peer, kind, &message, session),
        }
    }

    fn login(
        &self,
        peer: &Arc<dyn PeerHandle>,
        message: &InboundMessage<'_>,
        session: Option<&str>,
        now: Instant,
    ) -> Result<()> {
        let kind = MessageType::Login.as_str();
        let name = message.name.as_deref().unwrap_or_default();
        let Some(session) = self.check_credentials(peer.as_ref(), kind, name, session) else {
            return Ok(());
        };

        if let Some(previous) = self.register(peer, name, session, now) {
            warn!(
                "Old session of user {}: tsStart={}",
                short_name(Some(name)),
                wall_time(previous.created_at, self.config.time_zone)
            );
        }

        self.send(
            peer.as_ref(),
            &Response::success(kind)
                .with_msg(msg::LOGIN_OK)
                .with_int("boxType", message.box_type)
                .with_text("name", name)
                .with_int("localNr", message.local_nr),
        );
        Ok(())
    }

    fn relogin(
        &self,
        peer: &Arc<dyn PeerHandle>,
        message: &InboundMessage<'_>,
        session: Option<&str>,
        now: Instant,
    ) -> Result<()> {
        let kind = MessageType::Relogin.as_str();
        let name = message.name.as_deref().unwrap_or_default();
        let Some(session) = self.check_credentials(peer.as_ref(), kind, name, session) else {
            return Ok(());
        };

        if let Some(previous) = self.register(peer, name, session, now) {
            info!(
                "Relogin: new connection {}, old connection of user {} was {} starting at {}",
                mask_opt_addr(peer.remote_addr()),
                short_name(Some(name)),
                mask_opt_addr(previous.handle.remote_addr()),
                wall_time(previous.created_at, self.config.time_zone)
            );
        }

        self.send(
            peer.as_ref(),
            &Response::success(kind)
                .with_msg(msg::RELOGIN_OK)
                .with_text("name", name),
        );
        Ok(())
    }

    /// Validate name and session of a (re)login, answering failures.
    /// Returns the session on success.
    fn check_credentials<'s>(
        &self,
        peer: &dyn PeerHandle,
        kind: &str,
        name: &str,
        session: Option<&'s str>,
    ) -> Option<&'s str> {
        let failure =
            |text: &str| Response::failure(kind).with_text("name", name).with_msg(text);

        if !is_valid_name(name) {
            self.send(peer, &failure(msg::UNEXPECTED_USER));
            return None;
        }
        match session {
            Some(session) if is_valid_name(session) => Some(session),
            _ => {
                self.send(peer, &failure(msg::UNEXPECTED_SESSION));
                None
            }
        }
    }

    fn register(
        &self,
        peer: &Arc<dyn PeerHandle>,
        name: &str,
        session: &str,
        now: Instant,
    ) -> Option<Connection> {
        let previous = self
            .connections
            .put(name, session, Arc::clone(peer), now);
        self.sessions.upsert(session, now);
        previous
    }

    fn logout(
        &self,
        peer: &Arc<dyn PeerHandle>,
        message: &InboundMessage<'_>,
        session: Option<&str>,
    ) -> Result<()> {
        let kind = MessageType::Logout.as_str();
        let name = message.name.as_deref().unwrap_or_default();

        let response = if !is_valid_name(name) {
            Response::failure(kind).with_msg(msg::UNEXPECTED_USER)
        } else if session
            .and_then(|session| self.connections.remove(name, session))
            .is_none()
        {
            Response::success(kind).with_msg(msg::NO_SESSION)
        } else {
            Response::success(kind)
                .with_msg(msg::LOGOUT_OK)
                .with_text("name", name)
        };
        self.send(peer.as_ref(), &response);
        Ok(())
    }

    /// Forward a call-setup message to the addressed peer of the same session
    fn route(
        &self,
        peer: &Arc<dyn PeerHandle>,
        kind: MessageType,
        message: &InboundMessage<'_>,
        session: Option<&str>,
    ) -> Result<()> {
        let kind_name = kind.as_str();
        let reject = |text: &str| -> Result<()> {
            self.send(peer.as_ref(), &Response::failure(kind_name).with_msg(text));
            Ok(())
        };

        let (name, peer_name) = match (message.name.as_deref(), message.peer.as_deref()) {
            (_, None) => return reject(msg::NAME_MISSING),
            (None, _) => return reject(msg::MISSING_USER),
            (Some(name), _) if !is_valid_name(name) => return reject(msg::UNEXPECTED_USER),
            (_, Some(peer_name)) if !is_valid_name(peer_name) => {
                return reject(msg::UNEXPECTED_PEER_USER)
            }
            (Some(name), Some(peer_name)) => (name, peer_name),
        };

        let payload = if kind.carries_payload() {
            Some(message.payload(kind)?)
        } else {
            None
        };

        let Some(target) = session.and_then(|session| self.connections.get(peer_name, session))
        else {
            return reject(msg::PEER_UNKNOWN);
        };

        if kind == MessageType::RequestCall {
            info!(
                "request: {}@{} -> {}@{}",
                short_name(Some(name)),
                mask_opt_addr(peer.remote_addr()),
                short_name(Some(peer_name)),
                mask_opt_addr(target.remote_addr())
            );
        }

        let forward = Response::success(kind_name)
            .with_raw(kind_name, payload)
            .with_text("name", name)
            .with_int("localNr", message.local_nr)
            .with_text("peer", peer_name)
            .with_int("peerNr", message.peer_nr)
            .with_int("boxType", message.box_type);
        let delivered = self.send(target.as_ref(), &forward);

        if !delivered && kind == MessageType::RequestCall {
            self.send(
                peer.as_ref(),
                &Response::failure(kind_name).with_msg(msg::PEER_UNREACHABLE),
            );
        }
        Ok(())
    }

    fn dictionary(&self, peer: &Arc<dyn PeerHandle>, message: &InboundMessage<'_>) -> Result<()> {
        let kind = MessageType::Dictionary.as_str();
        let lang = message.lang()?;

        let response = match lang.as_deref().filter(|lang| is_valid_lang(lang)) {
            None => Response::failure(kind).with_msg(msg::UNEXPECTED_LANGUAGE),
            Some(lang) => match self.dictionaries.resolve(lang) {
                None => Response::failure(kind).with_msg(msg::UNSUPPORTED_LANGUAGE),
                Some(dictionary) => Response::success(kind)
                    .with_text("lang", dictionary.lang())
                    .with_text("dictionary", dictionary.json()),
            },
        };
        self.send(peer.as_ref(), &response);
        Ok(())
    }

    /// Queue a response on `peer`. Returns false if it could not be handed
    /// to the transport.
    fn send(&self, peer: &dyn PeerHandle, response: &Response) -> bool {
        let addr = mask_opt_addr(peer.remote_addr());
        info!(
            "Sending response to {}: type={}, success={}",
            addr,
            response.kind(),
            response.is_success()
        );

        let json = match response.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to encode response for {}: {}", addr, e);
                return false;
            }
        };
        match peer.send_text(json) {
            Ok(()) => true,
            Err(e) => {
                error!("Error while sending a response to {}: {}", addr, e);
                false
            }
        }
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Evict sessions and connections older than the configured max age,
    /// if the cleanup interval has elapsed. Returns a report to the caller
    /// that ran the pass.
    pub fn cleanup_at(&self, now: Instant) -> Option<CleanupReport> {
        let last_run = self
            .cleanup_gate
            .try_enter_since(now, self.config.cleanup_interval)?;

        let cutoff = now.checked_sub(self.config.max_age);
        let stale_sessions = cutoff
            .map(|cutoff| self.sessions.snapshot_older_than(cutoff))
            .unwrap_or_default();
        let stale_connections = cutoff
            .map(|cutoff| self.connections.snapshot_older_than(cutoff))
            .unwrap_or_default();

        let mut report = CleanupReport {
            last_run,
            sessions: self.sessions.len(),
            evicted_sessions: 0,
            connections: self.connections.len(),
            evicted_connections: 0,
        };
        info!(
            "cleanup: lastCleanup={}, sessions={}, oldSessions={}, connections={}, oldConnections={}",
            wall_time(last_run, self.config.time_zone),
            report.sessions,
            stale_sessions.len(),
            report.connections,
            stale_connections.len()
        );

        if let Some(cutoff) = cutoff {
            report.evicted_sessions = self.sessions.remove_all(&stale_sessions, cutoff);
            report.evicted_connections = self.connections.remove_all(&stale_connections, cutoff);
        }
        Some(report)
    }

    /// Log all counters if the statistics interval has elapsed
    pub fn dump_statistics_at(&self, now: Instant) -> bool {
        if !self
            .statistics_gate
            .try_enter(now, self.config.statistics_interval)
        {
            return false;
        }
        self.statistics.log();
        true
    }

    // =========================================================================
    // Serving
    // =========================================================================

    /// Serve using any TransportServer implementation.
    ///
    /// Each accepted connection gets its own task driving a
    /// [`SignalingConnection`]. Returns once [`stop`](Self::stop) is called.
    pub async fn serve_on<S>(&self, mut server: S) -> Result<()>
    where
        S: TransportServer + 'static,
        S::Handle: 'static,
        S::Receiver: 'static,
    {
        info!("Router accepting connections");
        let mut shutdown = self.shutdown.subscribe();

        while !*shutdown.borrow_and_update() {
            tokio::select! {
                accepted = server.accept() => match accepted {
                    Ok((handle, receiver, addr)) => {
                        info!("New connection from {}", mask_opt_addr(Some(addr)));
                        self.handle_connection(Arc::new(handle), receiver);
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        server.close().await?;
        info!("Router stopped accepting connections");
        Ok(())
    }

    /// Start the router on WebSocket
    #[cfg(feature = "websocket")]
    pub async fn serve_websocket(&self, addr: &str) -> Result<()> {
        let server = WebSocketServer::bind(addr).await?;
        self.serve_on(server).await
    }

    /// Stop accepting connections. Open connections are left to the
    /// transport. A stopped router does not serve again.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    fn handle_connection<R>(&self, handle: Arc<dyn PeerHandle>, receiver: R)
    where
        R: TransportReceiver + 'static,
    {
        let connection = self.connection(handle);
        tokio::spawn(connection.run(receiver));
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Number of active sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of registered connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Whether `name` is registered in `session` (folded like inbound ids)
    pub fn is_registered(&self, name: &str, session: &str) -> bool {
        let session = self.connections.locale().fold(session);
        self.connections.get(name, &session).is_some()
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(RouterConfig::default())
    }
}
