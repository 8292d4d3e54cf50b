#![allow(async_fn_in_trait)]

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::types::{
    AuditEntry, LoginAttempt, OneTimeCode, OtpKind, PersonalProfile, RefreshTokenRecord, Session,
    User, UserUpdate,
};
use crate::error::IdentityError;

/// Repository for user accounts and their profiles.
pub trait UserRepository: Send + Sync {
    /// Insert a user and their profile atomically (same transaction).
    async fn create_with_profile(
        &self,
        user: &User,
        profile: &PersonalProfile,
    ) -> Result<(), IdentityError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, IdentityError>;

    /// Lookup by the normalized (lowercase) username.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, IdentityError>;

    /// Lookup by the normalized (lowercase) profile email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, IdentityError>;

    /// Apply an enumerated partial update.
    async fn update(&self, id: Uuid, update: &UserUpdate) -> Result<(), IdentityError>;
}

/// Repository for one-time codes.
pub trait OtpRepository: Send + Sync {
    async fn create(&self, code: &OneTimeCode) -> Result<(), IdentityError>;

    /// Most recently issued unused code of a kind for a user. Older
    /// codes of the same kind are logically superseded and never
    /// consulted.
    async fn find_latest_unused(
        &self,
        user_id: Uuid,
        kind: OtpKind,
    ) -> Result<Option<OneTimeCode>, IdentityError>;

    async fn mark_used(&self, id: Uuid) -> Result<(), IdentityError>;
}

/// Repository for opaque refresh-token mappings. Tokens come into
/// existence alongside a session ([`SessionRepository::create_with_refresh_token`])
/// or through rotation; this trait covers lookup and removal.
pub trait RefreshTokenRepository: Send + Sync {
    async fn find(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, IdentityError>;

    /// Atomically consume `old_hash` and insert `new` (token rotation).
    /// Returns the user id of the consumed mapping, or `None` if it was
    /// already gone; a replayed token must fail.
    async fn rotate(
        &self,
        old_hash: &str,
        new: &RefreshTokenRecord,
    ) -> Result<Option<Uuid>, IdentityError>;

    /// Remove a mapping. Revoking a non-existent token is not an error.
    async fn revoke(&self, token_hash: &str) -> Result<(), IdentityError>;

    /// Remove every mapping for a user. Returns the count removed.
    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, IdentityError>;
}

/// Repository for sessions.
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &Session) -> Result<(), IdentityError>;

    /// Insert a session and its refresh token atomically (same
    /// transaction), so a crash between the two cannot leave an orphaned
    /// token.
    async fn create_with_refresh_token(
        &self,
        session: &Session,
        token: &RefreshTokenRecord,
    ) -> Result<(), IdentityError>;

    async fn find(&self, session_id: &str) -> Result<Option<Session>, IdentityError>;

    /// Bump `last_accessed`.
    async fn touch(&self, session_id: &str, at: DateTime<Utc>) -> Result<(), IdentityError>;

    /// Mark inactive and stamp the logout time. Idempotent: an already
    /// inactive session keeps its original logout stamp.
    async fn invalidate(&self, session_id: &str, at: DateTime<Utc>) -> Result<(), IdentityError>;

    /// Deactivate every active session for a user. Returns the count
    /// affected.
    async fn invalidate_all_for_user(
        &self,
        username: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, IdentityError>;

    async fn list_active(&self, username: &str) -> Result<Vec<Session>, IdentityError>;

    /// Point the session holding `old_hash` at `new_hash` after a
    /// refresh rotation, so logout keeps revoking the live token.
    async fn reassign_refresh_token(
        &self,
        old_hash: &str,
        new_hash: &str,
    ) -> Result<(), IdentityError>;

    /// Deactivate every active session created before `cutoff`,
    /// regardless of last access. Returns the count affected.
    async fn deactivate_created_before(
        &self,
        cutoff: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<u64, IdentityError>;
}

/// Repository for login attempts (append-only).
pub trait LoginAttemptRepository: Send + Sync {
    async fn record(&self, attempt: &LoginAttempt) -> Result<(), IdentityError>;
}

/// Repository for audit entries (append-only).
pub trait AuditLogRepository: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> Result<(), IdentityError>;
}
