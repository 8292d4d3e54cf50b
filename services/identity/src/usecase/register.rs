//! User registration.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::repository::{AuditLogRepository, UserRepository};
use crate::domain::types::{
    AuditAction, PersonalProfile, User, validate_email, validate_username,
};
use crate::error::IdentityError;
use crate::password;
use crate::ratelimit::RateLimiter;
use crate::usecase::audit::AuditService;

pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub age: Option<i16>,
    pub gender: Option<String>,
    pub password: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

pub struct RegisterUseCase<U, A>
where
    U: UserRepository,
    A: AuditLogRepository,
{
    pub users: U,
    pub audit: AuditService<A>,
    pub limiter: Arc<RateLimiter>,
    pub clock: Arc<dyn Clock>,
}

impl<U, A> RegisterUseCase<U, A>
where
    U: UserRepository,
    A: AuditLogRepository,
{
    pub async fn execute(&self, input: RegisterInput) -> Result<User, IdentityError> {
        // 1. Registration-family rate limit, keyed by client IP.
        if let Some(ip) = &input.ip_address {
            let decision = self.limiter.check(ip);
            if decision.limited {
                return Err(IdentityError::RateLimited {
                    retry_after_secs: decision.retry_after_secs,
                });
            }
        }

        // 2. Field validation. Never audited; bad input is local to the
        //    caller.
        let username = input.username.trim().to_lowercase();
        let email = input.email.trim().to_lowercase();
        if !validate_username(&username) {
            return Err(IdentityError::Validation("invalid username".to_owned()));
        }
        if !validate_email(&email) {
            return Err(IdentityError::Validation("invalid email".to_owned()));
        }
        if input.password.len() < 8 {
            return Err(IdentityError::Validation(
                "password must be at least 8 characters".to_owned(),
            ));
        }

        // 3. Case-insensitive uniqueness (usernames and emails are stored
        //    lowercased).
        if self.users.find_by_username(&username).await?.is_some() {
            return Err(IdentityError::UsernameTaken);
        }
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(IdentityError::EmailTaken);
        }

        // 4. Hash and persist user + profile atomically.
        let password_hash = password::hash_password(&input.password)?;
        let now: DateTime<Utc> = self.clock.now();
        let user = User {
            id: Uuid::now_v7(),
            username,
            password_hash,
            is_active: true,
            is_2fa_enabled: false,
            twofa_secret: None,
            created_at: now,
            last_login: None,
        };
        let profile = PersonalProfile {
            user_id: user.id,
            email,
            first_name: input.first_name,
            last_name: input.last_name,
            age: input.age,
            gender: input.gender,
        };
        self.users.create_with_profile(&user, &profile).await?;

        self.audit
            .log(
                Some(user.id),
                AuditAction::Register,
                input.ip_address.as_deref(),
                input.user_agent.as_deref(),
                Some(json!({ "username": user.username })),
            )
            .await;

        Ok(user)
    }
}
