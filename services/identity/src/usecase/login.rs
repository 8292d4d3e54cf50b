//! Login state machine, 2FA verification and logout.
//!
//! The consult order inside `execute` is fixed: rate limiter, then the
//! identity store, then (conditionally) the OTP manager, then the token
//! and session managers, and finally the audit service. The ordering
//! determines what gets logged on partial failure.

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::repository::{
    AuditLogRepository, LoginAttemptRepository, OtpRepository, RefreshTokenRepository,
    SessionRepository, UserRepository,
};
use crate::domain::types::{AuditAction, LoginAttempt, OtpKind, RefreshTokenRecord, User, UserUpdate};
use crate::error::IdentityError;
use crate::password;
use crate::ratelimit::RateLimiter;
use crate::usecase::audit::AuditService;
use crate::usecase::otp::OtpManager;
use crate::usecase::session::new_session;
use crate::usecase::token::{
    SCOPE_PRE_AUTH, generate_refresh_token, hash_refresh_token, issue_access_token,
    issue_pre_auth_token, validate_token,
};

pub struct LoginInput {
    pub identifier: String,
    pub password: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

pub struct Verify2faInput {
    pub pre_auth_token: String,
    pub code: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Fully authenticated login: a live session plus a token pair.
#[derive(Debug)]
pub struct AuthenticatedLogin {
    pub user_id: Uuid,
    pub username: String,
    pub session_id: String,
    pub access_token: String,
    pub access_token_exp: u64,
    pub refresh_token: String,
}

/// Password accepted but a second factor is pending. The plaintext code
/// is surfaced for out-of-band delivery by the caller.
#[derive(Debug)]
pub struct PreAuthChallenge {
    pub pre_auth_token: String,
    pub code: String,
}

#[derive(Debug)]
pub enum LoginOutcome {
    Authenticated(AuthenticatedLogin),
    PreAuth(PreAuthChallenge),
}

async fn record_failure<L, A>(
    attempts: &L,
    audit: &AuditService<A>,
    user_id: Option<Uuid>,
    identifier: &str,
    reason: &str,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
    clock: &dyn Clock,
) -> Result<(), IdentityError>
where
    L: LoginAttemptRepository,
    A: AuditLogRepository,
{
    attempts
        .record(&LoginAttempt {
            id: Uuid::new_v4(),
            identifier: identifier.to_owned(),
            success: false,
            failure_reason: Some(reason.to_owned()),
            user_agent: user_agent.map(str::to_owned),
            created_at: clock.now(),
        })
        .await?;
    audit
        .log(
            user_id,
            AuditAction::Login,
            ip_address,
            user_agent,
            Some(json!({ "success": false, "reason": reason })),
        )
        .await;
    Ok(())
}

/// Common success tail of both the non-2FA login branch and a completed
/// 2FA verification: session + refresh token committed atomically, last
/// login stamped, attempt and audit recorded, access token issued.
async fn finalize_login<U, S, L, A>(
    users: &U,
    sessions: &S,
    attempts: &L,
    audit: &AuditService<A>,
    user: &User,
    identifier: &str,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
    jwt_secret: &str,
    clock: &dyn Clock,
    method: &str,
) -> Result<AuthenticatedLogin, IdentityError>
where
    U: UserRepository,
    S: SessionRepository,
    L: LoginAttemptRepository,
    A: AuditLogRepository,
{
    let now = clock.now();
    let raw_refresh = generate_refresh_token();
    let refresh_record = RefreshTokenRecord {
        token_hash: hash_refresh_token(&raw_refresh),
        user_id: user.id,
        created_at: now,
    };
    let session = new_session(
        user.id,
        &user.username,
        Some(refresh_record.token_hash.clone()),
        clock,
    );

    sessions
        .create_with_refresh_token(&session, &refresh_record)
        .await?;

    users
        .update(
            user.id,
            &UserUpdate {
                last_login: Some(now),
                ..Default::default()
            },
        )
        .await?;

    attempts
        .record(&LoginAttempt {
            id: Uuid::new_v4(),
            identifier: identifier.to_owned(),
            success: true,
            failure_reason: None,
            user_agent: user_agent.map(str::to_owned),
            created_at: now,
        })
        .await?;

    audit
        .log(
            Some(user.id),
            AuditAction::Login,
            ip_address,
            user_agent,
            Some(json!({ "success": true, "method": method })),
        )
        .await;

    let (access_token, access_token_exp) = issue_access_token(user.id, jwt_secret, clock)?;

    Ok(AuthenticatedLogin {
        user_id: user.id,
        username: user.username.clone(),
        session_id: session.session_id,
        access_token,
        access_token_exp,
        refresh_token: raw_refresh,
    })
}

// ── Login ────────────────────────────────────────────────────────────────────

pub struct LoginUseCase<U, O, S, L, A>
where
    U: UserRepository,
    O: OtpRepository,
    S: SessionRepository,
    L: LoginAttemptRepository,
    A: AuditLogRepository,
{
    pub users: U,
    pub otps: OtpManager<O>,
    pub sessions: S,
    pub attempts: L,
    pub audit: AuditService<A>,
    pub limiter: Arc<RateLimiter>,
    pub jwt_secret: String,
    pub clock: Arc<dyn Clock>,
}

impl<U, O, S, L, A> LoginUseCase<U, O, S, L, A>
where
    U: UserRepository,
    O: OtpRepository,
    S: SessionRepository,
    L: LoginAttemptRepository,
    A: AuditLogRepository,
{
    pub async fn execute(&self, input: LoginInput) -> Result<LoginOutcome, IdentityError> {
        let identifier = input.identifier.trim().to_lowercase();
        let ip = input.ip_address.as_deref();
        let ua = input.user_agent.as_deref();

        // 1. Rate limit before credentials are touched.
        let decision = self.limiter.check(&identifier);
        if decision.limited {
            return Err(IdentityError::RateLimited {
                retry_after_secs: decision.retry_after_secs,
            });
        }

        // 2. Lookup by username, falling back to profile email.
        let user = match self.users.find_by_username(&identifier).await? {
            Some(user) => Some(user),
            None => self.users.find_by_email(&identifier).await?,
        };
        let Some(user) = user else {
            record_failure(
                &self.attempts,
                &self.audit,
                None,
                &identifier,
                "invalid_credentials",
                ip,
                ua,
                self.clock.as_ref(),
            )
            .await?;
            return Err(IdentityError::InvalidCredentials);
        };

        // 3. Password check.
        if !password::verify_password(&input.password, &user.password_hash)? {
            record_failure(
                &self.attempts,
                &self.audit,
                Some(user.id),
                &identifier,
                "invalid_credentials",
                ip,
                ua,
                self.clock.as_ref(),
            )
            .await?;
            return Err(IdentityError::InvalidCredentials);
        }

        // 4. Deactivation is checked strictly before the 2FA branch: a
        //    deactivated account must not receive a pre-auth challenge.
        if !user.is_active {
            record_failure(
                &self.attempts,
                &self.audit,
                Some(user.id),
                &identifier,
                "account_deactivated",
                ip,
                ua,
                self.clock.as_ref(),
            )
            .await?;
            return Err(IdentityError::AccountDeactivated);
        }

        // 5. Second factor: issue a code and hand back a pre-auth token.
        if user.is_2fa_enabled {
            let code = self
                .otps
                .issue(user.id, &user.username, OtpKind::TwoFactorLogin)
                .await?;
            let (pre_auth_token, _) =
                issue_pre_auth_token(user.id, &self.jwt_secret, self.clock.as_ref())?;

            self.audit
                .log(
                    Some(user.id),
                    AuditAction::Login2faInitiated,
                    ip,
                    ua,
                    None,
                )
                .await;

            return Ok(LoginOutcome::PreAuth(PreAuthChallenge {
                pre_auth_token,
                code,
            }));
        }

        // 6. No second factor: fully authenticate.
        let authenticated = finalize_login(
            &self.users,
            &self.sessions,
            &self.attempts,
            &self.audit,
            &user,
            &identifier,
            ip,
            ua,
            &self.jwt_secret,
            self.clock.as_ref(),
            "password",
        )
        .await?;
        Ok(LoginOutcome::Authenticated(authenticated))
    }
}

// ── Verify2fa ────────────────────────────────────────────────────────────────

pub struct Verify2faUseCase<U, O, S, L, A>
where
    U: UserRepository,
    O: OtpRepository,
    S: SessionRepository,
    L: LoginAttemptRepository,
    A: AuditLogRepository,
{
    pub users: U,
    pub otps: OtpManager<O>,
    pub sessions: S,
    pub attempts: L,
    pub audit: AuditService<A>,
    pub jwt_secret: String,
    pub clock: Arc<dyn Clock>,
}

impl<U, O, S, L, A> Verify2faUseCase<U, O, S, L, A>
where
    U: UserRepository,
    O: OtpRepository,
    S: SessionRepository,
    L: LoginAttemptRepository,
    A: AuditLogRepository,
{
    pub async fn execute(&self, input: Verify2faInput) -> Result<AuthenticatedLogin, IdentityError> {
        let ip = input.ip_address.as_deref();
        let ua = input.user_agent.as_deref();

        // The token must carry the pre_auth scope; a full session token
        // is not a valid second-factor carrier.
        let info = validate_token(
            &input.pre_auth_token,
            &self.jwt_secret,
            SCOPE_PRE_AUTH,
            self.clock.as_ref(),
        )?;

        let user = self
            .users
            .find_by_id(info.user_id)
            .await?
            .ok_or(IdentityError::InvalidToken)?;
        if !user.is_active {
            record_failure(
                &self.attempts,
                &self.audit,
                Some(user.id),
                &user.username,
                "account_deactivated",
                ip,
                ua,
                self.clock.as_ref(),
            )
            .await?;
            return Err(IdentityError::AccountDeactivated);
        }

        if let Err(e) = self
            .otps
            .verify(user.id, OtpKind::TwoFactorLogin, &input.code)
            .await
        {
            let reason = match &e {
                IdentityError::OtpExpired => "otp_expired",
                IdentityError::OtpMismatch => "otp_mismatch",
                IdentityError::OtpNotFound => "otp_not_found",
                _ => return Err(e),
            };
            record_failure(
                &self.attempts,
                &self.audit,
                Some(user.id),
                &user.username,
                reason,
                ip,
                ua,
                self.clock.as_ref(),
            )
            .await?;
            return Err(e);
        }

        finalize_login(
            &self.users,
            &self.sessions,
            &self.attempts,
            &self.audit,
            &user,
            &user.username,
            ip,
            ua,
            &self.jwt_secret,
            self.clock.as_ref(),
            "2fa",
        )
        .await
    }
}

// ── Logout ───────────────────────────────────────────────────────────────────

pub struct LogoutUseCase<S, R, A>
where
    S: SessionRepository,
    R: RefreshTokenRepository,
    A: AuditLogRepository,
{
    pub sessions: S,
    pub refresh_tokens: R,
    pub audit: AuditService<A>,
    pub clock: Arc<dyn Clock>,
}

impl<S, R, A> LogoutUseCase<S, R, A>
where
    S: SessionRepository,
    R: RefreshTokenRepository,
    A: AuditLogRepository,
{
    /// Invalidate the session and revoke its refresh token. Idempotent:
    /// logging out an unknown or already-closed session is a no-op.
    pub async fn execute(&self, session_id: &str) -> Result<(), IdentityError> {
        let Some(session) = self.sessions.find(session_id).await? else {
            return Ok(());
        };

        self.sessions
            .invalidate(session_id, self.clock.now())
            .await?;
        if let Some(token_hash) = &session.refresh_token_hash {
            self.refresh_tokens.revoke(token_hash).await?;
        }

        self.audit
            .log(
                Some(session.user_id),
                AuditAction::Logout,
                None,
                None,
                Some(json!({ "username": session.username })),
            )
            .await;
        Ok(())
    }
}
