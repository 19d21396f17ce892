//! In-memory session store
//!
//! Sessions are volatile and cleared on restart. Each session sits behind
//! its own mutex so a request pass owns its session exclusively for as long
//! as it runs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};

use super::session::{Session, SessionId};

/// Shared handle to one browser's session
pub type SessionHandle = Arc<Mutex<Session>>;

/// Process-local session store
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    /// Sessions idle for longer than this are dropped
    idle_timeout: Duration,
}

impl SessionStore {
    /// Create an empty store
    ///
    /// # Arguments
    /// * `idle_timeout` - How long a session may go without a request
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// Look up an existing session
    ///
    /// A session idle for longer than the timeout is removed and reported
    /// as absent.
    pub async fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        let handle = self.sessions.read().await.get(id).cloned()?;

        let expired = handle
            .try_lock()
            .map(|session| session.idle_for() > self.idle_timeout)
            .unwrap_or(false);
        if expired {
            tracing::debug!(session_id = %id, "Session expired");
            self.remove(id).await;
            return None;
        }

        Some(handle)
    }

    /// Create and register an empty session
    ///
    /// Idle sessions are purged first, so the store never grows past the
    /// set of browsers seen within the idle timeout.
    pub async fn create(&self) -> (SessionId, SessionHandle) {
        let id = SessionId::generate();
        let handle: SessionHandle = Arc::new(Mutex::new(Session::new()));

        let mut sessions = self.sessions.write().await;
        let purged = Self::retain_active(&mut sessions, self.idle_timeout);
        sessions.insert(id.clone(), handle.clone());
        Self::record_size(sessions.len());
        drop(sessions);

        if purged > 0 {
            tracing::debug!(purged, "Purged idle sessions");
        }
        tracing::debug!(session_id = %id, "Session created");

        (id, handle)
    }

    /// Remove a session
    ///
    /// # Returns
    /// `true` if the session existed
    pub async fn remove(&self, id: &SessionId) -> bool {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(id).is_some();
        Self::record_size(sessions.len());
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    fn retain_active(sessions: &mut HashMap<SessionId, SessionHandle>, timeout: Duration) -> usize {
        let before = sessions.len();
        // A locked session is in use by a request right now, so it is not idle.
        sessions.retain(|_, handle| match handle.try_lock() {
            Ok(session) => session.idle_for() <= timeout,
            Err(_) => true,
        });
        before - sessions.len()
    }

    fn record_size(len: usize) {
        use crate::metrics::ACTIVE_SESSIONS;
        ACTIVE_SESSIONS.set(len as i64);
    }
}
