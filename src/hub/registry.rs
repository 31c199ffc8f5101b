use std::collections::HashMap;

use tokio::sync::RwLock;

use super::error::HubError;
use super::session::{SessionHandle, SessionId};

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, SessionHandle>,
    closed: bool,
}

/// The set of live sessions. Every read and write goes through one lock, so
/// a snapshot never sees a half-inserted or half-removed session.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session. Fails once the registry has been closed.
    pub async fn add(&self, session: SessionHandle) -> Result<(), HubError> {
        self.add_with(session, || ()).await
    }

    /// Insert a session and run `on_insert` before the lock is released, so
    /// nothing can close the registry between the two.
    pub(crate) async fn add_with<T>(
        &self,
        session: SessionHandle,
        on_insert: impl FnOnce() -> T,
    ) -> Result<T, HubError> {
        let mut inner = self.inner.write().await;
        if inner.closed {
            return Err(HubError::RegistryClosed);
        }
        inner.sessions.insert(session.id(), session);
        Ok(on_insert())
    }

    /// Remove a session. Removing an unknown id is a no-op.
    pub async fn remove(&self, id: &SessionId) -> Option<SessionHandle> {
        self.inner.write().await.sessions.remove(id)
    }

    /// Point-in-time copy of the registered sessions.
    pub async fn snapshot(&self) -> Vec<SessionHandle> {
        self.inner.read().await.sessions.values().cloned().collect()
    }

    pub async fn contains(&self, id: &SessionId) -> bool {
        self.inner.read().await.sessions.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.read().await.closed
    }

    /// Refuse further inserts and drain every session, signalling each one to
    /// close while the lock is still held.
    pub async fn close(&self) -> Vec<SessionHandle> {
        let mut inner = self.inner.write().await;
        inner.closed = true;
        let drained: Vec<SessionHandle> = inner.sessions.drain().map(|(_, s)| s).collect();
        for session in &drained {
            session.begin_close();
        }
        drained
    }
}
