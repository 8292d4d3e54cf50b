use crate::domain::types::SESSION_MAX_AGE_HOURS;

/// Identity service configuration loaded from environment variables.
#[derive(Debug)]
pub struct IdentityConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// HMAC secret for signing access and pre-auth tokens.
    pub jwt_secret: String,
    /// Absolute session age after which cleanup deactivates a session
    /// (default 24). Env var: `SESSION_MAX_AGE_HOURS`.
    pub session_max_age_hours: i64,
}

impl IdentityConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").expect("DATABASE_URL"),
            jwt_secret: std::env::var("JWT_SECRET").expect("JWT_SECRET"),
            session_max_age_hours: std::env::var("SESSION_MAX_AGE_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(SESSION_MAX_AGE_HOURS),
        }
    }
}
