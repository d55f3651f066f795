//! Common test helpers for stream mediator tests
//!
//! - [`RecordingHandle`]: an in-memory [`PeerHandle`] that records every
//!   frame sent to it and can be switched to fail
//! - Port allocation and condition-based waiting for socket tests

use mediator_transport::{PeerHandle, Result as TransportResult, TransportError};
use parking_lot::Mutex;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default test timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default condition check interval
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Recording Handle
// ============================================================================

/// A [`PeerHandle`] that keeps sent frames in memory
pub struct RecordingHandle {
    addr: SocketAddr,
    frames: Mutex<Vec<String>>,
    failing: AtomicBool,
    closed: AtomicBool,
    idle_timeout: Mutex<Option<Duration>>,
}

impl RecordingHandle {
    /// A handle with a distinct loopback address
    pub fn new() -> Arc<Self> {
        static NEXT_PORT: AtomicU16 = AtomicU16::new(40000);
        let port = NEXT_PORT.fetch_add(1, Ordering::Relaxed);
        Self::with_addr(SocketAddr::from(([127, 0, 0, 1], port)))
    }

    pub fn with_addr(addr: SocketAddr) -> Arc<Self> {
        Arc::new(Self {
            addr,
            frames: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            idle_timeout: Mutex::new(None),
        })
    }

    /// This handle as a trait object, as the router stores it
    pub fn peer(self: &Arc<Self>) -> Arc<dyn PeerHandle> {
        Arc::clone(self) as Arc<dyn PeerHandle>
    }

    /// Raw frames sent so far
    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().clone()
    }

    /// Frames sent so far, parsed
    pub fn messages(&self) -> Vec<Value> {
        self.frames
            .lock()
            .iter()
            .map(|frame| serde_json::from_str(frame).expect("frame is JSON"))
            .collect()
    }

    /// Last frame sent, parsed
    pub fn last(&self) -> Option<Value> {
        self.frames
            .lock()
            .last()
            .map(|frame| serde_json::from_str(frame).expect("frame is JSON"))
    }

    /// Remove and return the frames sent so far, parsed
    pub fn take(&self) -> Vec<Value> {
        std::mem::take(&mut *self.frames.lock())
            .iter()
            .map(|frame| serde_json::from_str(frame).expect("frame is JSON"))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.frames.lock().len()
    }

    /// Make every following send fail (or succeed again)
    pub fn fail_sends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Idle timeout set through the handle, if any
    pub fn idle_timeout(&self) -> Option<Duration> {
        *self.idle_timeout.lock()
    }
}

impl PeerHandle for RecordingHandle {
    fn send_text(&self, text: String) -> TransportResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed("simulated failure".to_string()));
        }
        if self.is_closed() {
            return Err(TransportError::ConnectionClosed);
        }
        self.frames.lock().push(text);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.is_closed()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn set_idle_timeout(&self, timeout: Duration) {
        *self.idle_timeout.lock() = Some(timeout);
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        Some(self.addr)
    }
}

// ============================================================================
// Port Allocation
// ============================================================================

/// Find an available TCP port for testing
pub async fn find_available_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

// ============================================================================
// Condition-Based Waiting
// ============================================================================

/// Wait for a condition with timeout - condition-based, not time-based
pub async fn wait_for<F>(check: F, max_wait: Duration) -> bool
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < max_wait {
        if check() {
            return true;
        }
        tokio::time::sleep(DEFAULT_CHECK_INTERVAL).await;
    }
    check()
}
