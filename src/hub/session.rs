use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{close_code, CloseFrame, Message, Utf8Bytes};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::Hub;

pub type SessionId = Uuid;

/// Lifecycle of a client session. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SessionState::Connecting,
            1 => SessionState::Open,
            2 => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }
}

/// Result of handing a frame to a session's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Queued,
    /// The queue was full; the new frame was discarded.
    Dropped,
    /// The session is not open; nothing was queued.
    Inactive,
}

/// Why a session's pumps stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    Shutdown,
    ClientClosed,
    Disconnected,
    IdleTimeout,
    ReadFailed(String),
    WriteFailed(String),
    WriteTimedOut,
}

impl CloseReason {
    /// Close frame to send before closing the socket, if the sink is still
    /// usable for it.
    fn close_frame(&self) -> Option<CloseFrame> {
        let (code, reason) = match self {
            CloseReason::Shutdown => (close_code::AWAY, "server shutting down"),
            CloseReason::ClientClosed => (close_code::NORMAL, ""),
            CloseReason::IdleTimeout => (close_code::POLICY, "idle timeout"),
            _ => return None,
        };
        Some(CloseFrame {
            code,
            reason: Utf8Bytes::from_static(reason),
        })
    }
}

struct Shared {
    id: SessionId,
    user_id: String,
    state: AtomicU8,
    tx: mpsc::Sender<Utf8Bytes>,
    cancel: CancellationToken,
    dropped: AtomicU64,
}

/// Cheap, cloneable reference to a session. This is what the registry holds
/// and what broadcasts enqueue onto; the socket itself never leaves the
/// session's task.
#[derive(Clone)]
pub struct SessionHandle(Arc<Shared>);

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.0.id)
            .field("user_id", &self.0.user_id)
            .field("state", &self.state())
            .finish()
    }
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.0.id
    }

    pub fn user_id(&self) -> &str {
        &self.0.user_id
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.0.state.load(Ordering::Acquire))
    }

    /// Frames discarded because the queue was full.
    pub fn dropped_frames(&self) -> u64 {
        self.0.dropped.load(Ordering::Relaxed)
    }

    /// Queue a frame for delivery. Never blocks: when the queue is full the
    /// newest frame is dropped and the overflow is logged.
    pub fn enqueue(&self, frame: Utf8Bytes) -> Enqueued {
        if self.state() != SessionState::Open {
            return Enqueued::Inactive;
        }
        match self.0.tx.try_send(frame) {
            Ok(()) => Enqueued::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.0.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    session_id = %self.0.id,
                    user_id = %self.0.user_id,
                    dropped,
                    "send queue full, dropping message"
                );
                Enqueued::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Enqueued::Inactive,
        }
    }

    pub(crate) fn open(&self) -> bool {
        self.0
            .state
            .compare_exchange(
                SessionState::Connecting as u8,
                SessionState::Open as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Move to `Closing` and signal the pumps. Returns true only for the call
    /// that performed the transition.
    pub(crate) fn begin_close(&self) -> bool {
        let mut current = self.0.state.load(Ordering::Acquire);
        loop {
            if current >= SessionState::Closing as u8 {
                return false;
            }
            match self.0.state.compare_exchange(
                current,
                SessionState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.0.cancel.cancel();
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
    }

    fn finish(&self) {
        self.0
            .state
            .store(SessionState::Closed as u8, Ordering::Release);
    }

    async fn cancelled(&self) {
        self.0.cancel.cancelled().await
    }
}

/// One accepted WebSocket connection: its two halves, its private queue, and
/// the handle the hub knows it by.
pub struct ClientSession<W, R> {
    handle: SessionHandle,
    rx: mpsc::Receiver<Utf8Bytes>,
    sink: W,
    stream: R,
}

impl<W, R> ClientSession<W, R>
where
    W: Sink<Message, Error = axum::Error> + Unpin + Send + 'static,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin + Send + 'static,
{
    pub fn new(user_id: impl Into<String>, sink: W, stream: R, queue_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let shared = Shared {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            state: AtomicU8::new(SessionState::Connecting as u8),
            tx,
            cancel: CancellationToken::new(),
            dropped: AtomicU64::new(0),
        };
        Self {
            handle: SessionHandle(Arc::new(shared)),
            rx,
            sink,
            stream,
        }
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Close a connection that never made it into the registry.
    pub(crate) async fn reject(self, write_timeout: Duration) {
        let ClientSession {
            handle, mut sink, ..
        } = self;
        handle.begin_close();
        if timeout(write_timeout, close_sink(&mut sink, &CloseReason::Shutdown))
            .await
            .is_err()
        {
            tracing::debug!(session_id = %handle.id(), "close handshake timed out");
        }
        drop(sink);
        handle.finish();
    }

    /// Drive the session until either pump hits a terminal condition or the
    /// hub asks it to close, then tear it down.
    pub(crate) async fn run(self, hub: Hub) {
        let ClientSession {
            handle,
            mut rx,
            mut sink,
            mut stream,
        } = self;
        let config = hub.config().clone();

        tracing::debug!(session_id = %handle.id(), user_id = %handle.user_id(), "session open");

        let reason = tokio::select! {
            reason = read_pump(&mut stream, config.pong_wait) => reason,
            reason = write_pump(&mut sink, &mut rx, config.write_timeout, config.ping_interval) => reason,
            _ = handle.cancelled() => CloseReason::Shutdown,
        };

        handle.begin_close();
        hub.registry().remove(&handle.id()).await;
        rx.close();

        // The close frame and the close itself share one write budget, and a
        // forced shutdown cuts both short.
        tokio::select! {
            closed = timeout(config.write_timeout, close_sink(&mut sink, &reason)) => {
                if closed.is_err() {
                    tracing::debug!(session_id = %handle.id(), "close handshake timed out");
                }
            }
            _ = hub.force_closed() => {
                tracing::warn!(session_id = %handle.id(), "session force-closed");
            }
        }
        drop(sink);
        drop(stream);
        handle.finish();

        tracing::debug!(
            session_id = %handle.id(),
            user_id = %handle.user_id(),
            reason = ?reason,
            dropped = handle.dropped_frames(),
            "session closed"
        );
    }
}

/// Send the close frame for `reason`, if it has one, then close the sink.
/// A failed close frame does not skip the close.
async fn close_sink<W>(sink: &mut W, reason: &CloseReason)
where
    W: Sink<Message, Error = axum::Error> + Unpin,
{
    if let Some(frame) = reason.close_frame() {
        let _ = sink.send(Message::Close(Some(frame))).await;
    }
    let _ = sink.close().await;
}

/// Reads only to observe liveness and disconnection. Pings are answered by
/// the protocol layer; data frames from clients are ignored.
async fn read_pump<R>(stream: &mut R, pong_wait: Duration) -> CloseReason
where
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        match timeout(pong_wait, stream.next()).await {
            Err(_) => return CloseReason::IdleTimeout,
            Ok(None) => return CloseReason::Disconnected,
            Ok(Some(Err(e))) => return CloseReason::ReadFailed(e.to_string()),
            Ok(Some(Ok(Message::Close(_)))) => return CloseReason::ClientClosed,
            Ok(Some(Ok(_))) => {}
        }
    }
}

/// Writes queued frames in FIFO order, interleaving periodic pings. Every
/// write is bounded by `write_timeout`.
async fn write_pump<W>(
    sink: &mut W,
    rx: &mut mpsc::Receiver<Utf8Bytes>,
    write_timeout: Duration,
    ping_interval: Duration,
) -> CloseReason
where
    W: Sink<Message, Error = axum::Error> + Unpin,
{
    let mut ping = tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);
    loop {
        let msg = tokio::select! {
            frame = rx.recv() => match frame {
                Some(text) => Message::Text(text),
                None => return CloseReason::Shutdown,
            },
            _ = ping.tick() => Message::Ping(Bytes::new()),
        };
        match timeout(write_timeout, sink.send(msg)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return CloseReason::WriteFailed(e.to_string()),
            Err(_) => return CloseReason::WriteTimedOut,
        }
    }
}
