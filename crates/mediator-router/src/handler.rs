//! Per-connection event handling

use mediator_transport::{PeerHandle, TransportError, TransportEvent, TransportReceiver};
use std::sync::Arc;

use crate::router::Router;

/// Callbacks for the lifecycle of one connection
pub trait ConnectionHandler: Send {
    /// The connection has been established
    fn on_open(&self);

    /// A text frame has arrived
    fn on_message(&self, text: &str);

    /// The connection is gone
    fn on_close(&self, code: Option<u16>, reason: Option<&str>);

    /// The transport reported an error
    fn on_error(&self, error: &TransportError);
}

/// Binds one connection's handle to the shared router
pub struct SignalingConnection {
    router: Router,
    handle: Arc<dyn PeerHandle>,
}

impl SignalingConnection {
    pub fn new(router: Router, handle: Arc<dyn PeerHandle>) -> Self {
        Self { router, handle }
    }

    pub fn handle(&self) -> &Arc<dyn PeerHandle> {
        &self.handle
    }

    /// Drive the handler from a transport event stream until the
    /// connection is gone
    pub async fn run<R: TransportReceiver>(self, mut receiver: R) {
        while let Some(event) = receiver.recv().await {
            match event {
                TransportEvent::Connected => self.on_open(),
                TransportEvent::Text(text) => self.on_message(&text),
                TransportEvent::Disconnected { code, reason } => {
                    self.on_close(code, reason.as_deref());
                    break;
                }
                TransportEvent::Error(e) => self.on_error(&e),
            }
        }
    }
}

impl ConnectionHandler for SignalingConnection {
    fn on_open(&self) {
        self.router.open(&self.handle);
    }

    fn on_message(&self, text: &str) {
        self.router.handle(&self.handle, text);
    }

    fn on_close(&self, code: Option<u16>, reason: Option<&str>) {
        self.router.closed(self.handle.as_ref(), code, reason);
    }

    fn on_error(&self, error: &TransportError) {
        self.router.errored(self.handle.as_ref(), error);
    }
}
