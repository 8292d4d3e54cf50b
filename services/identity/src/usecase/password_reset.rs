//! Password reset via one-time codes.

use std::sync::Arc;

use serde_json::json;

use crate::clock::Clock;
use crate::domain::repository::{
    AuditLogRepository, OtpRepository, RefreshTokenRepository, SessionRepository, UserRepository,
};
use crate::domain::types::{AuditAction, OtpKind, UserUpdate};
use crate::error::IdentityError;
use crate::password;
use crate::ratelimit::RateLimiter;
use crate::usecase::audit::AuditService;
use crate::usecase::otp::OtpManager;

/// Result of initiating a reset. `code` is `None` when the email is
/// unknown; the caller sees the same shape either way, so the endpoint
/// cannot be used to enumerate accounts.
#[derive(Debug)]
pub struct PasswordResetChallenge {
    pub code: Option<String>,
}

pub struct InitiatePasswordResetUseCase<U, O>
where
    U: UserRepository,
    O: OtpRepository,
{
    pub users: U,
    pub otps: OtpManager<O>,
    pub limiter: Arc<RateLimiter>,
}

impl<U, O> InitiatePasswordResetUseCase<U, O>
where
    U: UserRepository,
    O: OtpRepository,
{
    /// Issue a RESET_PASSWORD code for the account behind `email`.
    /// Rate-limited per email; the plaintext code is returned for
    /// out-of-band delivery.
    pub async fn execute(&self, email: &str) -> Result<PasswordResetChallenge, IdentityError> {
        let email = email.trim().to_lowercase();

        let decision = self.limiter.check(&email);
        if decision.limited {
            return Err(IdentityError::RateLimited {
                retry_after_secs: decision.retry_after_secs,
            });
        }

        let Some(user) = self.users.find_by_email(&email).await? else {
            return Ok(PasswordResetChallenge { code: None });
        };

        let code = self
            .otps
            .issue(user.id, &email, OtpKind::ResetPassword)
            .await?;
        Ok(PasswordResetChallenge { code: Some(code) })
    }
}

pub struct CompletePasswordResetUseCase<U, O, S, R, A>
where
    U: UserRepository,
    O: OtpRepository,
    S: SessionRepository,
    R: RefreshTokenRepository,
    A: AuditLogRepository,
{
    pub users: U,
    pub otps: OtpManager<O>,
    pub sessions: S,
    pub refresh_tokens: R,
    pub audit: AuditService<A>,
    pub clock: Arc<dyn Clock>,
}

impl<U, O, S, R, A> CompletePasswordResetUseCase<U, O, S, R, A>
where
    U: UserRepository,
    O: OtpRepository,
    S: SessionRepository,
    R: RefreshTokenRepository,
    A: AuditLogRepository,
{
    /// Verify the reset code and store the new password. On `OtpExpired`
    /// or `OtpMismatch` the stored password is untouched. A successful
    /// reset logs the user out everywhere: every active session is
    /// deactivated and every refresh token revoked.
    pub async fn execute(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), IdentityError> {
        let email = email.trim().to_lowercase();

        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(IdentityError::OtpNotFound)?;

        if new_password.len() < 8 {
            return Err(IdentityError::Validation(
                "password must be at least 8 characters".to_owned(),
            ));
        }

        self.otps
            .verify(user.id, OtpKind::ResetPassword, code)
            .await?;

        let password_hash = password::hash_password(new_password)?;
        self.users
            .update(
                user.id,
                &UserUpdate {
                    password_hash: Some(password_hash),
                    ..Default::default()
                },
            )
            .await?;

        let now = self.clock.now();
        let sessions_revoked = self
            .sessions
            .invalidate_all_for_user(&user.username, now)
            .await?;
        self.refresh_tokens.revoke_all_for_user(user.id).await?;

        self.audit
            .log(
                Some(user.id),
                AuditAction::PasswordReset,
                None,
                None,
                Some(json!({ "sessions_revoked": sessions_revoked })),
            )
            .await;

        Ok(())
    }
}
