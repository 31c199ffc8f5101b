//! Real-time fan-out of post events to connected WebSocket clients.
//!
//! HTTP handlers hand a [`WebSocketMessage`] to [`Hub::broadcast`]; the hub
//! encodes it once and queues it on every registered session. Each session
//! owns its socket and drains its own bounded queue, so a slow client only
//! ever slows itself down.

pub mod error;
pub mod events;
pub mod heartbeat;
pub mod registry;
pub mod session;
pub mod upgrade;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures_util::{Sink, Stream};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tokio_util::task::TaskTracker;

pub use error::HubError;
pub use events::{EventKind, WebSocketMessage};
pub use registry::Registry;
pub use session::{ClientSession, Enqueued, SessionHandle, SessionId, SessionState};

/// Per-session queue capacity used when nothing else is configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Frames buffered per session before new ones are dropped.
    pub queue_capacity: usize,
    /// Upper bound on a single socket write.
    pub write_timeout: Duration,
    /// Upper bound on waiting for session tasks during shutdown. Sessions
    /// still closing after this are dropped.
    pub shutdown_timeout: Duration,
    pub ping_interval: Duration,
    pub pong_wait: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            write_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(15),
            ping_interval: heartbeat::PING_INTERVAL,
            pong_wait: heartbeat::PONG_WAIT,
        }
    }
}

struct HubInner {
    registry: Registry,
    tasks: TaskTracker,
    force_close: CancellationToken,
    config: HubConfig,
}

/// Cloneable handle to the process-wide hub. Construct once at startup and
/// pass it to whatever needs to publish or register.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

impl Hub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            inner: Arc::new(HubInner {
                registry: Registry::new(),
                tasks: TaskTracker::new(),
                force_close: CancellationToken::new(),
                config,
            }),
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub async fn session_count(&self) -> usize {
        self.inner.registry.len().await
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.registry.is_closed().await
    }

    /// Resolves once shutdown has run out of patience with closing sessions.
    fn force_closed(&self) -> WaitForCancellationFuture<'_> {
        self.inner.force_close.cancelled()
    }

    /// Register a session and start its pumps. If the hub is shutting down the
    /// connection is closed here and `RegistryClosed` is returned.
    pub async fn register<W, R>(&self, session: ClientSession<W, R>) -> Result<SessionHandle, HubError>
    where
        W: Sink<Message, Error = axum::Error> + Unpin + Send + 'static,
        R: Stream<Item = Result<Message, axum::Error>> + Unpin + Send + 'static,
    {
        let handle = session.handle().clone();
        let mut pending = Some(session);

        // Opening and spawning happen under the registry lock, so shutdown
        // either sees this session in the registry with its task tracked, or
        // refuses it outright.
        let added = self
            .inner
            .registry
            .add_with(handle.clone(), || {
                if let Some(session) = pending.take() {
                    handle.open();
                    self.inner.tasks.spawn(session.run(self.clone()));
                }
            })
            .await;

        match added {
            Ok(()) => {
                tracing::debug!(
                    session_id = %handle.id(),
                    user_id = %handle.user_id(),
                    "session registered"
                );
                Ok(handle)
            }
            Err(e) => {
                if let Some(session) = pending {
                    session.reject(self.inner.config.write_timeout).await;
                }
                Err(e)
            }
        }
    }

    /// Queue `message` on every registered session except `exclude`. Returns
    /// how many sessions accepted it. Never waits on a client; a full or
    /// closing session is skipped and the loop moves on.
    pub async fn broadcast(
        &self,
        message: &WebSocketMessage,
        exclude: Option<&SessionId>,
    ) -> Result<usize, HubError> {
        let frame = message.to_frame()?;
        let sessions = self.inner.registry.snapshot().await;

        let mut queued = 0;
        for session in &sessions {
            if exclude == Some(&session.id()) {
                continue;
            }
            if session.enqueue(frame.clone()) == Enqueued::Queued {
                queued += 1;
            }
        }

        tracing::debug!(
            kind = message.kind().as_str(),
            recipients = sessions.len(),
            queued,
            "broadcast"
        );
        Ok(queued)
    }

    /// Close the registry, signal every session, and wait for their tasks to
    /// finish. Sessions still closing when the shutdown timeout expires have
    /// their sockets dropped, and `ShutdownTimedOut` reports how many. Either
    /// way no session connection outlives this call. Safe to call more than
    /// once.
    pub async fn shutdown(&self) -> Result<(), HubError> {
        let drained = self.inner.registry.close().await;
        self.inner.tasks.close();
        tracing::info!(sessions = drained.len(), "hub shutting down");

        let wait = self.inner.tasks.wait();
        if tokio::time::timeout(self.inner.config.shutdown_timeout, wait)
            .await
            .is_ok()
        {
            tracing::info!("hub shutdown complete");
            return Ok(());
        }

        let forced = self.inner.tasks.len();
        tracing::warn!(forced, "hub shutdown timed out, dropping remaining sessions");
        self.inner.force_close.cancel();
        self.inner.tasks.wait().await;

        Err(HubError::ShutdownTimedOut { forced })
    }
}
