//! WebSocket transport implementation

use async_trait::async_trait;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::{PeerHandle, TransportEvent, TransportReceiver, TransportServer};

/// Close code reported when the idle timeout fires (going away)
const IDLE_CLOSE_CODE: u16 = 1001;

/// WebSocket configuration
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Capacity of each connection's outbound queue
    pub send_queue: usize,
    /// Idle timeout in effect until a handle sets its own
    pub idle_timeout: Option<Duration>,
    /// Time a client gets to complete the WebSocket upgrade
    pub handshake_timeout: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            send_queue: 256,
            idle_timeout: None,
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

/// Send half of an accepted WebSocket connection
pub struct WebSocketHandle {
    tx: mpsc::Sender<WsMessage>,
    connected: Arc<Mutex<bool>>,
    idle_timeout: Arc<Mutex<Option<Duration>>>,
    idle_changed: Arc<Notify>,
    remote: SocketAddr,
}

impl PeerHandle for WebSocketHandle {
    fn send_text(&self, text: String) -> Result<()> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        self.tx.try_send(WsMessage::Text(text)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                TransportError::SendFailed("outbound queue full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => TransportError::ConnectionClosed,
        })
    }

    fn is_connected(&self) -> bool {
        *self.connected.lock()
    }

    fn close(&self) {
        let _ = self.tx.try_send(WsMessage::Close(None));
        *self.connected.lock() = false;
    }

    fn set_idle_timeout(&self, timeout: Duration) {
        *self.idle_timeout.lock() = Some(timeout);
        self.idle_changed.notify_one();
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        Some(self.remote)
    }
}

/// Receive half of an accepted WebSocket connection
pub struct WebSocketReceiver {
    rx: mpsc::Receiver<TransportEvent>,
}

#[async_trait]
impl TransportReceiver for WebSocketReceiver {
    async fn recv(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }
}

/// WebSocket server
pub struct WebSocketServer {
    listener: tokio::net::TcpListener,
    config: WebSocketConfig,
}

impl WebSocketServer {
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        info!("WebSocket server listening on {}", addr);

        Ok(Self {
            listener,
            config: WebSocketConfig::default(),
        })
    }

    pub fn with_config(mut self, config: WebSocketConfig) -> Self {
        self.config = config;
        self
    }
}

#[async_trait]
impl TransportServer for WebSocketServer {
    type Handle = WebSocketHandle;
    type Receiver = WebSocketReceiver;

    /// Accept a TCP connection. The WebSocket handshake runs in the
    /// connection's own task; `Connected` is reported once it succeeds.
    async fn accept(&mut self) -> Result<(Self::Handle, Self::Receiver, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await?;

        debug!("Accepted TCP connection from {}", addr);

        let (send_tx, send_rx) = mpsc::channel::<WsMessage>(self.config.send_queue.max(1));
        let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(100);

        let handle = WebSocketHandle {
            tx: send_tx.clone(),
            connected: Arc::new(Mutex::new(true)),
            idle_timeout: Arc::new(Mutex::new(self.config.idle_timeout)),
            idle_changed: Arc::new(Notify::new()),
            remote: addr,
        };

        let task = ConnectionTask {
            addr,
            handshake_timeout: self.config.handshake_timeout,
            close_tx: send_tx,
            event_tx,
            connected: handle.connected.clone(),
            idle_timeout: handle.idle_timeout.clone(),
            idle_changed: handle.idle_changed.clone(),
        };
        tokio::spawn(task.run(stream, send_rx));

        let receiver = WebSocketReceiver { rx: event_rx };

        Ok((handle, receiver, addr))
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(TransportError::Io)
    }

    async fn close(&self) -> Result<()> {
        // TCP listener doesn't need explicit close
        Ok(())
    }
}

/// State shared between a handle and its connection task
struct ConnectionTask {
    addr: SocketAddr,
    handshake_timeout: Duration,
    close_tx: mpsc::Sender<WsMessage>,
    event_tx: mpsc::Sender<TransportEvent>,
    connected: Arc<Mutex<bool>>,
    idle_timeout: Arc<Mutex<Option<Duration>>>,
    idle_changed: Arc<Notify>,
}

impl ConnectionTask {
    async fn run(self, stream: TcpStream, send_rx: mpsc::Receiver<WsMessage>) {
        let addr = self.addr;
        let upgrade = tokio::time::timeout(
            self.handshake_timeout,
            tokio_tungstenite::accept_async(stream),
        )
        .await;

        let ws_stream = match upgrade {
            Ok(Ok(ws_stream)) => ws_stream,
            Ok(Err(e)) => {
                warn!("WebSocket handshake with {} failed: {}", addr, e);
                let reason = e.to_string();
                self.fail(TransportError::ConnectionFailed(reason.clone()), reason)
                    .await;
                return;
            }
            Err(_) => {
                debug!("WebSocket handshake with {} timed out", addr);
                self.fail(TransportError::Timeout, "handshake timeout".to_string())
                    .await;
                return;
            }
        };

        let (write, read) = ws_stream.split();

        let connected_write = self.connected.clone();
        tokio::spawn(async move {
            let mut write = write;
            let mut send_rx = send_rx;
            while let Some(msg) = send_rx.recv().await {
                let closing = matches!(msg, WsMessage::Close(_));
                if let Err(e) = write.send(msg).await {
                    warn!("WebSocket write error: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
            *connected_write.lock() = false;
        });

        self.read_loop(read).await;
        *self.connected.lock() = false;
    }

    async fn fail(&self, error: TransportError, reason: String) {
        *self.connected.lock() = false;
        let _ = self.event_tx.send(TransportEvent::Error(error)).await;
        let _ = self
            .event_tx
            .send(TransportEvent::Disconnected {
                code: None,
                reason: Some(reason),
            })
            .await;
    }

    async fn read_loop(&self, mut read: SplitStream<WebSocketStream<TcpStream>>) {
        let addr = self.addr;
        let event_tx = &self.event_tx;

        let _ = event_tx.send(TransportEvent::Connected).await;

        loop {
            let idle = *self.idle_timeout.lock();
            let expired = async move {
                match idle {
                    Some(limit) => tokio::time::sleep(limit).await,
                    None => std::future::pending::<()>().await,
                }
            };

            let next = tokio::select! {
                next = read.next() => next,
                _ = expired => {
                    debug!("Idle timeout on connection from {}", addr);
                    let _ = event_tx.send(TransportEvent::Error(TransportError::Timeout)).await;
                    let _ = self.close_tx.try_send(WsMessage::Close(None));
                    let _ = event_tx
                        .send(TransportEvent::Disconnected {
                            code: Some(IDLE_CLOSE_CODE),
                            reason: Some("idle timeout".to_string()),
                        })
                        .await;
                    return;
                }
                _ = self.idle_changed.notified() => continue,
            };

            match next {
                Some(Ok(WsMessage::Text(text))) => {
                    let _ = event_tx.send(TransportEvent::Text(text)).await;
                }
                Some(Ok(WsMessage::Binary(data))) => match String::from_utf8(data) {
                    Ok(text) => {
                        let _ = event_tx.send(TransportEvent::Text(text)).await;
                    }
                    Err(_) => warn!("Dropping non UTF-8 binary frame from {}", addr),
                },
                Some(Ok(WsMessage::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(f) => (Some(u16::from(f.code)), Some(f.reason.to_string())),
                        None => (Some(u16::from(CloseCode::Status)), None),
                    };
                    let _ = event_tx
                        .send(TransportEvent::Disconnected { code, reason })
                        .await;
                    return;
                }
                Some(Ok(_)) => {
                    // Ping/pong are answered by tungstenite
                }
                Some(Err(e)) => {
                    let reason = e.to_string();
                    let _ = event_tx.send(TransportEvent::Error(e.into())).await;
                    let _ = event_tx
                        .send(TransportEvent::Disconnected {
                            code: None,
                            reason: Some(reason),
                        })
                        .await;
                    return;
                }
                None => {
                    let _ = event_tx
                        .send(TransportEvent::Disconnected {
                            code: None,
                            reason: None,
                        })
                        .await;
                    return;
                }
            }
        }
    }
}
