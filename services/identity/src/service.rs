//! The auth orchestrator facade, the single entry point the host HTTP
//! layer calls. Owns the connection, rate limiters, signing secret and
//! clock, and assembles the use cases per call.

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::IdentityConfig;
use crate::domain::types::{Session, User};
use crate::error::IdentityError;
use crate::infra::db::{
    DbAuditLogRepository, DbLoginAttemptRepository, DbOtpRepository, DbRefreshTokenRepository,
    DbSessionRepository, DbUserRepository,
};
use crate::ratelimit::RateLimiter;
use crate::usecase::audit::AuditService;
use crate::usecase::cleanup::CleanupStaleSessionsUseCase;
use crate::usecase::login::{
    AuthenticatedLogin, LoginInput, LoginOutcome, LoginUseCase, LogoutUseCase, Verify2faInput,
    Verify2faUseCase,
};
use crate::usecase::otp::OtpManager;
use crate::usecase::password_reset::{
    CompletePasswordResetUseCase, InitiatePasswordResetUseCase, PasswordResetChallenge,
};
use crate::usecase::register::{RegisterInput, RegisterUseCase};
use crate::usecase::session::SessionManager;
use crate::usecase::token::{RefreshAccessTokenOutput, RefreshAccessTokenUseCase};
use crate::usecase::twofactor::TwoFactorSetupUseCase;

pub struct IdentityService {
    db: DatabaseConnection,
    jwt_secret: String,
    session_max_age_hours: i64,
    clock: Arc<dyn Clock>,
    login_limiter: Arc<RateLimiter>,
    registration_limiter: Arc<RateLimiter>,
    password_reset_limiter: Arc<RateLimiter>,
    otp_issue_limiter: Arc<RateLimiter>,
}

impl IdentityService {
    pub fn new(db: DatabaseConnection, config: &IdentityConfig) -> Self {
        Self::with_clock(db, config, Arc::new(SystemClock))
    }

    /// Construct with an explicit clock. Used by tests to drive expiry.
    pub fn with_clock(
        db: DatabaseConnection,
        config: &IdentityConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            jwt_secret: config.jwt_secret.clone(),
            session_max_age_hours: config.session_max_age_hours,
            login_limiter: Arc::new(RateLimiter::login(clock.clone())),
            registration_limiter: Arc::new(RateLimiter::registration(clock.clone())),
            password_reset_limiter: Arc::new(RateLimiter::password_reset(clock.clone())),
            otp_issue_limiter: Arc::new(RateLimiter::otp_issue(clock.clone())),
            clock,
        }
    }

    fn user_repo(&self) -> DbUserRepository {
        DbUserRepository {
            db: self.db.clone(),
        }
    }

    fn otp_repo(&self) -> DbOtpRepository {
        DbOtpRepository {
            db: self.db.clone(),
        }
    }

    fn refresh_token_repo(&self) -> DbRefreshTokenRepository {
        DbRefreshTokenRepository {
            db: self.db.clone(),
        }
    }

    fn session_repo(&self) -> DbSessionRepository {
        DbSessionRepository {
            db: self.db.clone(),
        }
    }

    fn attempt_repo(&self) -> DbLoginAttemptRepository {
        DbLoginAttemptRepository {
            db: self.db.clone(),
        }
    }

    fn audit_service(&self) -> AuditService<DbAuditLogRepository> {
        AuditService {
            entries: DbAuditLogRepository {
                db: self.db.clone(),
            },
            clock: self.clock.clone(),
        }
    }

    fn otp_manager(&self) -> OtpManager<DbOtpRepository> {
        OtpManager {
            codes: self.otp_repo(),
            issue_limiter: self.otp_issue_limiter.clone(),
            clock: self.clock.clone(),
        }
    }

    fn session_manager(&self) -> SessionManager<DbSessionRepository> {
        SessionManager {
            sessions: self.session_repo(),
            clock: self.clock.clone(),
        }
    }

    pub async fn register(&self, input: RegisterInput) -> Result<User, IdentityError> {
        let usecase = RegisterUseCase {
            users: self.user_repo(),
            audit: self.audit_service(),
            limiter: self.registration_limiter.clone(),
            clock: self.clock.clone(),
        };
        usecase.execute(input).await
    }

    pub async fn login(&self, input: LoginInput) -> Result<LoginOutcome, IdentityError> {
        let usecase = LoginUseCase {
            users: self.user_repo(),
            otps: self.otp_manager(),
            sessions: self.session_repo(),
            attempts: self.attempt_repo(),
            audit: self.audit_service(),
            limiter: self.login_limiter.clone(),
            jwt_secret: self.jwt_secret.clone(),
            clock: self.clock.clone(),
        };
        usecase.execute(input).await
    }

    pub async fn verify_2fa(
        &self,
        input: Verify2faInput,
    ) -> Result<AuthenticatedLogin, IdentityError> {
        let usecase = Verify2faUseCase {
            users: self.user_repo(),
            otps: self.otp_manager(),
            sessions: self.session_repo(),
            attempts: self.attempt_repo(),
            audit: self.audit_service(),
            jwt_secret: self.jwt_secret.clone(),
            clock: self.clock.clone(),
        };
        usecase.execute(input).await
    }

    pub async fn refresh_access_token(
        &self,
        raw_refresh_token: &str,
    ) -> Result<RefreshAccessTokenOutput, IdentityError> {
        let usecase = RefreshAccessTokenUseCase {
            refresh_tokens: self.refresh_token_repo(),
            users: self.user_repo(),
            sessions: self.session_repo(),
            jwt_secret: self.jwt_secret.clone(),
            clock: self.clock.clone(),
        };
        usecase.execute(raw_refresh_token).await
    }

    pub async fn logout(&self, session_id: &str) -> Result<(), IdentityError> {
        let usecase = LogoutUseCase {
            sessions: self.session_repo(),
            refresh_tokens: self.refresh_token_repo(),
            audit: self.audit_service(),
            clock: self.clock.clone(),
        };
        usecase.execute(session_id).await
    }

    /// Middleware hook: look up a session id and return the owning
    /// username when it is live. Bumps the session's last-accessed time.
    pub async fn validate_session(
        &self,
        session_id: &str,
    ) -> Result<Option<String>, IdentityError> {
        self.session_manager().validate(session_id).await
    }

    pub async fn active_sessions(&self, username: &str) -> Result<Vec<Session>, IdentityError> {
        self.session_manager().list_active(username).await
    }

    /// "Log out everywhere": deactivate every active session for a
    /// user. Returns the count affected.
    pub async fn invalidate_all_sessions(&self, username: &str) -> Result<u64, IdentityError> {
        self.session_manager().invalidate_all(username).await
    }

    pub async fn initiate_password_reset(
        &self,
        email: &str,
    ) -> Result<PasswordResetChallenge, IdentityError> {
        let usecase = InitiatePasswordResetUseCase {
            users: self.user_repo(),
            otps: self.otp_manager(),
            limiter: self.password_reset_limiter.clone(),
        };
        usecase.execute(email).await
    }

    pub async fn complete_password_reset(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), IdentityError> {
        let usecase = CompletePasswordResetUseCase {
            users: self.user_repo(),
            otps: self.otp_manager(),
            sessions: self.session_repo(),
            refresh_tokens: self.refresh_token_repo(),
            audit: self.audit_service(),
            clock: self.clock.clone(),
        };
        usecase.execute(email, code, new_password).await
    }

    /// Reclaim sessions older than the configured absolute age.
    pub async fn cleanup_stale_sessions(&self) -> Result<u64, IdentityError> {
        let usecase = CleanupStaleSessionsUseCase {
            sessions: self.session_manager(),
            audit: self.audit_service(),
        };
        usecase.execute(self.session_max_age_hours).await
    }

    pub async fn send_2fa_setup_code(&self, user_id: Uuid) -> Result<String, IdentityError> {
        let usecase = TwoFactorSetupUseCase {
            users: self.user_repo(),
            otps: self.otp_manager(),
        };
        usecase.send_setup_code(user_id).await
    }

    pub async fn enable_2fa(&self, user_id: Uuid, code: &str) -> Result<(), IdentityError> {
        let usecase = TwoFactorSetupUseCase {
            users: self.user_repo(),
            otps: self.otp_manager(),
        };
        usecase.enable(user_id, code).await
    }

    pub async fn disable_2fa(&self, user_id: Uuid) -> Result<(), IdentityError> {
        let usecase = TwoFactorSetupUseCase {
            users: self.user_repo(),
            otps: self.otp_manager(),
        };
        usecase.disable(user_id).await
    }
}
