//! Session lifecycle: creation, validation, invalidation, cleanup.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Duration;
use rand::RngExt;
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::repository::SessionRepository;
use crate::domain::types::Session;
use crate::error::IdentityError;

/// Generate an unguessable session identifier
/// (32 random bytes, base64url-encoded without padding).
pub fn generate_session_id() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Build a fresh active session row. The caller decides how it is
/// persisted (standalone, or atomically with a refresh token on login).
pub fn new_session(
    user_id: Uuid,
    username: &str,
    refresh_token_hash: Option<String>,
    clock: &dyn Clock,
) -> Session {
    let now = clock.now();
    Session {
        session_id: generate_session_id(),
        user_id,
        username: username.to_owned(),
        refresh_token_hash,
        created_at: now,
        last_accessed: now,
        is_active: true,
        logged_out_at: None,
    }
}

/// Manages sessions. Multiple concurrent active sessions per user are a
/// first-class supported state.
pub struct SessionManager<S: SessionRepository> {
    pub sessions: S,
    pub clock: Arc<dyn Clock>,
}

impl<S: SessionRepository> SessionManager<S> {
    /// Create and persist a standalone session, returning its id.
    pub async fn create(&self, user_id: Uuid, username: &str) -> Result<String, IdentityError> {
        let session = new_session(user_id, username, None, self.clock.as_ref());
        let session_id = session.session_id.clone();
        self.sessions.create(&session).await?;
        Ok(session_id)
    }

    /// Validate a session id. Absent or inactive sessions are invalid;
    /// a valid lookup bumps `last_accessed` and returns the owning
    /// username.
    pub async fn validate(&self, session_id: &str) -> Result<Option<String>, IdentityError> {
        let Some(session) = self.sessions.find(session_id).await? else {
            return Ok(None);
        };
        if !session.is_active {
            return Ok(None);
        }
        self.sessions.touch(session_id, self.clock.now()).await?;
        Ok(Some(session.username))
    }

    /// Mark a session inactive and stamp the logout time. Idempotent.
    pub async fn invalidate(&self, session_id: &str) -> Result<(), IdentityError> {
        self.sessions.invalidate(session_id, self.clock.now()).await
    }

    /// Deactivate every active session for a user ("log out everywhere").
    /// Returns the count affected.
    pub async fn invalidate_all(&self, username: &str) -> Result<u64, IdentityError> {
        self.sessions
            .invalidate_all_for_user(username, self.clock.now())
            .await
    }

    pub async fn list_active(&self, username: &str) -> Result<Vec<Session>, IdentityError> {
        self.sessions.list_active(username).await
    }

    /// Deactivate sessions older than `max_age_hours`, by absolute
    /// creation age. A recently used but old session is still reclaimed.
    pub async fn cleanup_stale(&self, max_age_hours: i64) -> Result<u64, IdentityError> {
        let now = self.clock.now();
        let cutoff = now - Duration::hours(max_age_hours);
        self.sessions.deactivate_created_before(cutoff, now).await
    }
}
