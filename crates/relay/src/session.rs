//! Streaming session lifecycle.
//!
//! A [`StreamingSession`] owns the server side of one SSE response: an
//! ordered frame channel, a heartbeat task, and a disconnect watcher. Every
//! write goes through the session, so frame ordering and the closed flag
//! are enforced in exactly one place.
//!
//! State machine:
//!
//! ```text
//! Initialized -> HeadersSent -> Streaming -> Closing -> Closed
//! ```
//!
//! `open` performs the first transition, the first delivered event the
//! second, `close` the last two. A client disconnect jumps straight to
//! `Closed` from any state; writes after that point are silently dropped,
//! never retried.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use chrono::Utc;
use ironquill_core::SessionError;
use tokio::sync::{Mutex, mpsc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::event::{Frame, StreamEvent};

/// The legacy end-of-stream marker, written as a bare `data:` record after
/// the structured done event.
pub const DONE_MARKER: &str = "[DONE]";

/// Lifecycle states of a streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum SessionState {
    /// Created, response not yet started.
    Initialized = 0,
    /// The frame receiver has been handed to the transport.
    HeadersSent = 1,
    /// At least one event has been delivered.
    Streaming = 2,
    /// Teardown in progress.
    Closing = 3,
    /// Fully closed. Terminal.
    Closed = 4,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Initialized,
            1 => Self::HeadersSent,
            2 => Self::Streaming,
            3 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Tunables for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Interval between heartbeat comments.
    pub heartbeat_interval: Duration,
    /// Frame channel capacity before sends apply backpressure.
    pub channel_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(15),
            channel_capacity: 128,
        }
    }
}

struct Shared {
    state: AtomicU8,
    tx: Mutex<Option<mpsc::Sender<Frame>>>,
    cancel: CancellationToken,
}

impl Shared {
    fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Disconnect path: jump to Closed, cancel in-flight work, drop the
    /// sender so the transport stream terminates.
    async fn route_closed(&self) {
        self.state
            .store(SessionState::Closed as u8, Ordering::SeqCst);
        self.cancel.cancel();
        self.tx.lock().await.take();
    }
}

/// The server side of one SSE response.
pub struct StreamingSession {
    shared: Arc<Shared>,
    heartbeat_interval: Duration,
    rx_slot: std::sync::Mutex<Option<mpsc::Receiver<Frame>>>,
}

impl StreamingSession {
    pub fn new(config: SessionConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        Self {
            shared: Arc::new(Shared {
                state: AtomicU8::new(SessionState::Initialized as u8),
                tx: Mutex::new(Some(tx)),
                cancel: CancellationToken::new(),
            }),
            heartbeat_interval: config.heartbeat_interval,
            rx_slot: std::sync::Mutex::new(Some(rx)),
        }
    }

    /// Starts the session and hands the frame receiver to the transport.
    ///
    /// Callable exactly once. Also spawns the heartbeat task and the
    /// disconnect watcher; both live until the session closes.
    pub async fn open(&self) -> Result<mpsc::Receiver<Frame>, SessionError> {
        match self.shared.state.compare_exchange(
            SessionState::Initialized as u8,
            SessionState::HeadersSent as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => {}
            Err(state) if state >= SessionState::Closing as u8 => {
                return Err(SessionError::Closed);
            }
            Err(_) => return Err(SessionError::AlreadyOpened),
        }

        let rx = self
            .rx_slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or(SessionError::AlreadyOpened)?;

        if let Some(tx) = self.shared.tx.lock().await.clone() {
            self.spawn_heartbeat(tx.clone());
            self.spawn_disconnect_watcher(tx);
        }
        debug!("session opened");
        Ok(rx)
    }

    /// Queues a semantic event. A no-op once the session is closing or
    /// closed.
    pub async fn send_event(&self, event: StreamEvent) {
        if self.is_closed() {
            trace!(event = event.event_name(), "session closed, dropping event");
            return;
        }
        if self.send_frame(Frame::from(&event)).await {
            let _ = self.shared.state.compare_exchange(
                SessionState::HeadersSent as u8,
                SessionState::Streaming as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
        }
    }

    /// Queues an SSE comment line.
    pub async fn send_comment(&self, text: impl Into<String>) {
        if self.is_closed() {
            return;
        }
        self.send_frame(Frame::Comment(text.into())).await;
    }

    /// Writes the legacy `data: [DONE]` record that ends the event stream.
    pub async fn send_done_marker(&self) {
        if self.is_closed() {
            return;
        }
        self.send_frame(Frame::Data(DONE_MARKER.to_string())).await;
    }

    /// Closes the session. Idempotent; the first caller performs teardown,
    /// later callers return immediately.
    pub async fn close(&self) {
        let mut current = self.shared.state.load(Ordering::SeqCst);
        loop {
            if current >= SessionState::Closing as u8 {
                return;
            }
            match self.shared.state.compare_exchange(
                current,
                SessionState::Closing as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        self.shared.cancel.cancel();
        self.shared.tx.lock().await.take();
        self.shared
            .state
            .store(SessionState::Closed as u8, Ordering::SeqCst);
        debug!("session closed");
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// True once close has begun; no further writes will be delivered.
    pub fn is_closed(&self) -> bool {
        self.state() >= SessionState::Closing
    }

    /// Token cancelled when the session closes or the client disconnects.
    /// Handed to the provider so upstream work stops with the session.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    async fn send_frame(&self, frame: Frame) -> bool {
        let tx = match self.shared.tx.lock().await.as_ref() {
            Some(tx) => tx.clone(),
            None => return false,
        };
        if tx.send(frame).await.is_err() {
            debug!("frame channel closed by transport, treating as disconnect");
            self.shared.route_closed().await;
            return false;
        }
        true
    }

    fn spawn_heartbeat(&self, tx: mpsc::Sender<Frame>) {
        let cancel = self.shared.cancel.clone();
        let period = self.heartbeat_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                let frame = Frame::Comment(format!("heartbeat {}", Utc::now().timestamp_millis()));
                if tx.send(frame).await.is_err() {
                    return;
                }
                trace!("heartbeat sent");
            }
        });
    }

    fn spawn_disconnect_watcher(&self, tx: mpsc::Sender<Frame>) {
        let shared = self.shared.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tx.closed() => {
                    debug!("client disconnected, closing session");
                    shared.route_closed().await;
                }
                _ = shared.cancel.cancelled() => {}
            }
        });
    }
}

impl Drop for StreamingSession {
    fn drop(&mut self) {
        // A dropped session must not leave its tasks or the transport
        // stream alive.
        self.shared.cancel.cancel();
    }
}
