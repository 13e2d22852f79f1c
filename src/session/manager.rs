//! Fill Session Manager
//!
//! Manages fill sessions with:
//! - In-memory session storage behind a read/write lock
//! - A cap on live sessions
//! - Expiry cleanup

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::types::{
    CreateSessionRequest, FillSession, SessionError, MAX_SESSIONS, SESSION_EXPIRY_HOURS,
};

// ============================================================================
// Session Manager
// ============================================================================

/// Manages fill sessions
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionManagerInner>,
}

struct SessionManagerInner {
    /// Live sessions indexed by ID
    sessions: RwLock<HashMap<Uuid, FillSession>>,

    /// Maximum live sessions (0 = unlimited)
    max_sessions: usize,

    /// Lifetime of a new session
    expiry_hours: i64,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new() -> Self {
        Self::with_limits(MAX_SESSIONS, SESSION_EXPIRY_HOURS)
    }

    /// Create a session manager with a custom cap and lifetime
    pub fn with_limits(max_sessions: usize, expiry_hours: i64) -> Self {
        Self {
            inner: Arc::new(SessionManagerInner {
                sessions: RwLock::new(HashMap::new()),
                max_sessions,
                expiry_hours,
            }),
        }
    }

    // ========================================================================
    // Session Lifecycle
    // ========================================================================

    /// Register a new session in `Loading`
    pub async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<FillSession, SessionError> {
        let mut sessions = self.inner.sessions.write().await;

        if self.inner.max_sessions > 0 {
            let live = sessions.values().filter(|s| !s.is_expired()).count();
            if live >= self.inner.max_sessions {
                return Err(SessionError::CapacityExceeded(self.inner.max_sessions));
            }
        }

        let session = FillSession::new(request, self.inner.expiry_hours);
        sessions.insert(session.id, session.clone());

        tracing::info!(
            session_id = %session.id,
            template_url = %session.template_url,
            document_kind = %session.document_kind,
            "Created fill session"
        );

        Ok(session)
    }

    /// Get a snapshot of a session
    pub async fn get_session(&self, id: Uuid) -> Result<FillSession, SessionError> {
        let sessions = self.inner.sessions.read().await;
        sessions
            .get(&id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Get a session by string ID
    pub async fn get_session_by_str(&self, id: &str) -> Result<FillSession, SessionError> {
        let uuid = parse_id(id)?;
        self.get_session(uuid).await
    }

    /// Mutate a session in place under the write lock
    pub async fn update_session<T, F>(&self, id: Uuid, f: F) -> Result<T, SessionError>
    where
        F: FnOnce(&mut FillSession) -> Result<T, SessionError>,
    {
        let mut sessions = self.inner.sessions.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        f(session)
    }

    /// Remove a session
    pub async fn remove_session(&self, id: Uuid) -> Result<FillSession, SessionError> {
        let session = self
            .inner
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        tracing::info!(session_id = %id, state = ?session.state, "Removed fill session");
        Ok(session)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Number of sessions held, expired or not
    pub async fn session_count(&self) -> usize {
        self.inner.sessions.read().await.len()
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    /// Remove expired sessions, returning their IDs
    pub async fn cleanup_expired(&self) -> Vec<Uuid> {
        let mut sessions = self.inner.sessions.write().await;
        let now = Utc::now();

        let expired: Vec<Uuid> = sessions
            .iter()
            .filter(|(_, s)| now > s.expires_at)
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            sessions.remove(id);
            tracing::debug!(session_id = %id, "Removed expired fill session");
        }

        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "Cleaned up expired fill sessions");
        }

        expired
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a session ID from a path segment
pub fn parse_id(id: &str) -> Result<Uuid, SessionError> {
    Uuid::parse_str(id).map_err(|_| SessionError::NotFound(id.to_string()))
}
