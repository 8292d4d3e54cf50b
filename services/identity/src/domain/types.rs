use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// Account record. Usernames and profile emails are normalized to
/// lowercase on write, making uniqueness and lookup case-insensitive.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_2fa_enabled: bool,
    pub twofa_secret: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Personal profile owned by a user (zero-or-one per account).
#[derive(Debug, Clone)]
pub struct PersonalProfile {
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub age: Option<i16>,
    pub gender: Option<String>,
}

/// Enumerated partial update for a [`User`]. Every mutable field is
/// listed here; anything else on the entity is immutable after creation.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub password_hash: Option<String>,
    pub is_2fa_enabled: Option<bool>,
    /// `Some(None)` clears the stored second-factor secret.
    pub twofa_secret: Option<Option<String>>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Purpose tag of a one-time code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpKind {
    ResetPassword,
    TwoFactorLogin,
    TwoFactorSetup,
}

impl OtpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResetPassword => "RESET_PASSWORD",
            Self::TwoFactorLogin => "TWO_FACTOR_LOGIN",
            Self::TwoFactorSetup => "TWO_FACTOR_SETUP",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "RESET_PASSWORD" => Some(Self::ResetPassword),
            "TWO_FACTOR_LOGIN" => Some(Self::TwoFactorLogin),
            "TWO_FACTOR_SETUP" => Some(Self::TwoFactorSetup),
            _ => None,
        }
    }
}

/// One-time numeric code bound to a user and purpose. Single-use,
/// time-boxed, stored only as a digest.
#[derive(Debug, Clone)]
pub struct OneTimeCode {
    pub id: Uuid,
    pub user_id: Uuid,
    pub code_hash: String,
    pub kind: OtpKind,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
}

impl OneTimeCode {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Opaque refresh-token mapping, keyed by digest of the raw token.
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub token_hash: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Append-only record of an authentication attempt.
#[derive(Debug, Clone)]
pub struct LoginAttempt {
    pub id: Uuid,
    pub identifier: String,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One authenticated client context. Deactivated on logout, bulk
/// revocation or staleness cleanup; never deleted.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub user_id: Uuid,
    pub username: String,
    /// Digest of the refresh token issued alongside this session, so
    /// logout can revoke it.
    pub refresh_token_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub is_active: bool,
    pub logged_out_at: Option<DateTime<Utc>>,
}

/// Fixed vocabulary of audited security actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Register,
    Login,
    Login2faInitiated,
    Logout,
    PasswordReset,
    SessionCleanup,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "REGISTER",
            Self::Login => "LOGIN",
            Self::Login2faInitiated => "LOGIN_2FA_INITIATED",
            Self::Logout => "LOGOUT",
            Self::PasswordReset => "PASSWORD_RESET",
            Self::SessionCleanup => "SESSION_CLEANUP",
        }
    }
}

/// Security audit entry. `details` is stored pre-redacted.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: AuditAction,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

/// One-time code length in digits.
pub const OTP_LEN: usize = 6;

/// One-time code time-to-live in seconds.
pub const OTP_TTL_SECS: i64 = 300;

/// Pre-auth token time-to-live in seconds (window to complete 2FA).
pub const PRE_AUTH_TTL_SECS: i64 = 300;

/// Access token time-to-live in seconds.
pub const ACCESS_TOKEN_TTL_SECS: i64 = 3600;

/// Maximum stored user-agent length; longer values are truncated with a
/// marker.
pub const USER_AGENT_MAX_LEN: usize = 255;

/// Default absolute session age (hours) for staleness cleanup.
pub const SESSION_MAX_AGE_HOURS: i64 = 24;

/// Validate a username: 1..=64 chars, ASCII alphanumerics plus `.`,
/// `_` and `-`.
pub fn validate_username(username: &str) -> bool {
    !username.is_empty()
        && username.len() <= 64
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Minimal structural email check: one `@` with non-empty local part and
/// a dotted domain. Real validation happens at delivery.
pub fn validate_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}
