/// Identity subsystem error variants.
///
/// Authentication failures carry deliberately generic display messages so
/// the HTTP layer cannot leak which part of a credential was wrong; the
/// machine-readable code lives in [`IdentityError::kind`].
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("{0}")]
    Validation(String),
    #[error("username already taken")]
    UsernameTaken,
    #[error("email already registered")]
    EmailTaken,
    #[error("too many requests, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("incorrect username or password")]
    InvalidCredentials,
    #[error("account is deactivated")]
    AccountDeactivated,
    #[error("no active code")]
    OtpNotFound,
    #[error("code expired")]
    OtpExpired,
    #[error("incorrect code")]
    OtpMismatch,
    #[error("invalid token")]
    InvalidToken,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl IdentityError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::UsernameTaken => "USERNAME_TAKEN",
            Self::EmailTaken => "EMAIL_TAKEN",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::AccountDeactivated => "ACCOUNT_DEACTIVATED",
            Self::OtpNotFound => "OTP_NOT_FOUND",
            Self::OtpExpired => "OTP_EXPIRED",
            Self::OtpMismatch => "OTP_MISMATCH",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::Internal(_) => "INTERNAL",
        }
    }
}
