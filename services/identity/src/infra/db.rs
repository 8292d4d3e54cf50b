//! sea-orm implementations of the identity store repositories.

use anyhow::{Context as _, anyhow};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use uuid::Uuid;

use soulsense_identity_schema::{
    audit_logs, login_attempts, one_time_codes, personal_profiles, refresh_tokens, sessions, users,
};

use crate::domain::repository::{
    AuditLogRepository, LoginAttemptRepository, OtpRepository, RefreshTokenRepository,
    SessionRepository, UserRepository,
};
use crate::domain::types::{
    AuditEntry, LoginAttempt, OneTimeCode, OtpKind, PersonalProfile, RefreshTokenRecord, Session,
    User, UserUpdate,
};
use crate::error::IdentityError;

// ── User repository ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbUserRepository {
    pub db: DatabaseConnection,
}

impl UserRepository for DbUserRepository {
    async fn create_with_profile(
        &self,
        user: &User,
        profile: &PersonalProfile,
    ) -> Result<(), IdentityError> {
        self.db
            .transaction::<_, (), sea_orm::DbErr>(|txn| {
                let user = user.clone();
                let profile = profile.clone();
                Box::pin(async move {
                    insert_user(txn, &user).await?;
                    insert_profile(txn, &profile).await?;
                    Ok(())
                })
            })
            .await
            .context("create user with profile")?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, IdentityError> {
        let model = users::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find user by id")?;
        Ok(model.map(user_from_model))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, IdentityError> {
        let model = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.db)
            .await
            .context("find user by username")?;
        Ok(model.map(user_from_model))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, IdentityError> {
        let Some(profile) = personal_profiles::Entity::find()
            .filter(personal_profiles::Column::Email.eq(email))
            .one(&self.db)
            .await
            .context("find profile by email")?
        else {
            return Ok(None);
        };
        let model = users::Entity::find_by_id(profile.user_id)
            .one(&self.db)
            .await
            .context("find user by profile")?;
        Ok(model.map(user_from_model))
    }

    async fn update(&self, id: Uuid, update: &UserUpdate) -> Result<(), IdentityError> {
        let mut model = users::ActiveModel {
            id: Set(id),
            ..Default::default()
        };
        if let Some(hash) = &update.password_hash {
            model.password_hash = Set(hash.clone());
        }
        if let Some(enabled) = update.is_2fa_enabled {
            model.is_2fa_enabled = Set(enabled);
        }
        if let Some(secret) = &update.twofa_secret {
            model.twofa_secret = Set(secret.clone());
        }
        if let Some(at) = update.last_login {
            model.last_login = Set(Some(at));
        }
        model.update(&self.db).await.context("update user")?;
        Ok(())
    }
}

async fn insert_user(txn: &DatabaseTransaction, user: &User) -> Result<(), sea_orm::DbErr> {
    users::ActiveModel {
        id: Set(user.id),
        username: Set(user.username.clone()),
        password_hash: Set(user.password_hash.clone()),
        is_active: Set(user.is_active),
        is_2fa_enabled: Set(user.is_2fa_enabled),
        twofa_secret: Set(user.twofa_secret.clone()),
        created_at: Set(user.created_at),
        last_login: Set(user.last_login),
    }
    .insert(txn)
    .await?;
    Ok(())
}

async fn insert_profile(
    txn: &DatabaseTransaction,
    profile: &PersonalProfile,
) -> Result<(), sea_orm::DbErr> {
    personal_profiles::ActiveModel {
        user_id: Set(profile.user_id),
        email: Set(profile.email.clone()),
        first_name: Set(profile.first_name.clone()),
        last_name: Set(profile.last_name.clone()),
        age: Set(profile.age),
        gender: Set(profile.gender.clone()),
    }
    .insert(txn)
    .await?;
    Ok(())
}

fn user_from_model(model: users::Model) -> User {
    User {
        id: model.id,
        username: model.username,
        password_hash: model.password_hash,
        is_active: model.is_active,
        is_2fa_enabled: model.is_2fa_enabled,
        twofa_secret: model.twofa_secret,
        created_at: model.created_at,
        last_login: model.last_login,
    }
}

// ── OTP repository ───────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbOtpRepository {
    pub db: DatabaseConnection,
}

impl OtpRepository for DbOtpRepository {
    async fn create(&self, code: &OneTimeCode) -> Result<(), IdentityError> {
        one_time_codes::ActiveModel {
            id: Set(code.id),
            user_id: Set(code.user_id),
            code_hash: Set(code.code_hash.clone()),
            kind: Set(code.kind.as_str().to_owned()),
            expires_at: Set(code.expires_at),
            is_used: Set(code.is_used),
            created_at: Set(code.created_at),
        }
        .insert(&self.db)
        .await
        .context("create one-time code")?;
        Ok(())
    }

    async fn find_latest_unused(
        &self,
        user_id: Uuid,
        kind: OtpKind,
    ) -> Result<Option<OneTimeCode>, IdentityError> {
        let model = one_time_codes::Entity::find()
            .filter(one_time_codes::Column::UserId.eq(user_id))
            .filter(one_time_codes::Column::Kind.eq(kind.as_str()))
            .filter(one_time_codes::Column::IsUsed.eq(false))
            .order_by_desc(one_time_codes::Column::CreatedAt)
            .one(&self.db)
            .await
            .context("find latest unused code")?;
        model.map(otp_from_model).transpose()
    }

    async fn mark_used(&self, id: Uuid) -> Result<(), IdentityError> {
        one_time_codes::ActiveModel {
            id: Set(id),
            is_used: Set(true),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("mark code used")?;
        Ok(())
    }
}

fn otp_from_model(model: one_time_codes::Model) -> Result<OneTimeCode, IdentityError> {
    let kind = OtpKind::from_db(&model.kind)
        .ok_or_else(|| anyhow!("unknown one-time code kind: {}", model.kind))?;
    Ok(OneTimeCode {
        id: model.id,
        user_id: model.user_id,
        code_hash: model.code_hash,
        kind,
        expires_at: model.expires_at,
        is_used: model.is_used,
        created_at: model.created_at,
    })
}

// ── Refresh token repository ─────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbRefreshTokenRepository {
    pub db: DatabaseConnection,
}

impl RefreshTokenRepository for DbRefreshTokenRepository {
    async fn find(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, IdentityError> {
        let model = refresh_tokens::Entity::find_by_id(token_hash.to_owned())
            .one(&self.db)
            .await
            .context("find refresh token")?;
        Ok(model.map(|m| RefreshTokenRecord {
            token_hash: m.token_hash,
            user_id: m.user_id,
            created_at: m.created_at,
        }))
    }

    async fn rotate(
        &self,
        old_hash: &str,
        new: &RefreshTokenRecord,
    ) -> Result<Option<Uuid>, IdentityError> {
        let consumed = self
            .db
            .transaction::<_, Option<Uuid>, sea_orm::DbErr>(|txn| {
                let old_hash = old_hash.to_owned();
                let new = new.clone();
                Box::pin(async move {
                    let Some(existing) = refresh_tokens::Entity::find_by_id(old_hash.clone())
                        .one(txn)
                        .await?
                    else {
                        return Ok(None);
                    };
                    refresh_tokens::Entity::delete_by_id(old_hash).exec(txn).await?;
                    refresh_token_model(&new).insert(txn).await?;
                    Ok(Some(existing.user_id))
                })
            })
            .await
            .context("rotate refresh token")?;
        Ok(consumed)
    }

    async fn revoke(&self, token_hash: &str) -> Result<(), IdentityError> {
        refresh_tokens::Entity::delete_by_id(token_hash.to_owned())
            .exec(&self.db)
            .await
            .context("revoke refresh token")?;
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, IdentityError> {
        let result = refresh_tokens::Entity::delete_many()
            .filter(refresh_tokens::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await
            .context("revoke refresh tokens for user")?;
        Ok(result.rows_affected)
    }
}

fn refresh_token_model(token: &RefreshTokenRecord) -> refresh_tokens::ActiveModel {
    refresh_tokens::ActiveModel {
        token_hash: Set(token.token_hash.clone()),
        user_id: Set(token.user_id),
        created_at: Set(token.created_at),
    }
}

// ── Session repository ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbSessionRepository {
    pub db: DatabaseConnection,
}

impl SessionRepository for DbSessionRepository {
    async fn create(&self, session: &Session) -> Result<(), IdentityError> {
        session_model(session)
            .insert(&self.db)
            .await
            .context("create session")?;
        Ok(())
    }

    async fn create_with_refresh_token(
        &self,
        session: &Session,
        token: &RefreshTokenRecord,
    ) -> Result<(), IdentityError> {
        self.db
            .transaction::<_, (), sea_orm::DbErr>(|txn| {
                let session = session.clone();
                let token = token.clone();
                Box::pin(async move {
                    session_model(&session).insert(txn).await?;
                    refresh_token_model(&token).insert(txn).await?;
                    Ok(())
                })
            })
            .await
            .context("create session with refresh token")?;
        Ok(())
    }

    async fn find(&self, session_id: &str) -> Result<Option<Session>, IdentityError> {
        let model = sessions::Entity::find_by_id(session_id.to_owned())
            .one(&self.db)
            .await
            .context("find session")?;
        Ok(model.map(session_from_model))
    }

    async fn touch(&self, session_id: &str, at: DateTime<Utc>) -> Result<(), IdentityError> {
        sessions::ActiveModel {
            session_id: Set(session_id.to_owned()),
            last_accessed: Set(at),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("touch session")?;
        Ok(())
    }

    async fn invalidate(&self, session_id: &str, at: DateTime<Utc>) -> Result<(), IdentityError> {
        // Filtering on is_active keeps this idempotent: a second logout
        // affects zero rows and the original logout stamp survives.
        sessions::Entity::update_many()
            .col_expr(sessions::Column::IsActive, Expr::value(false))
            .col_expr(sessions::Column::LoggedOutAt, Expr::value(at))
            .filter(sessions::Column::SessionId.eq(session_id))
            .filter(sessions::Column::IsActive.eq(true))
            .exec(&self.db)
            .await
            .context("invalidate session")?;
        Ok(())
    }

    async fn invalidate_all_for_user(
        &self,
        username: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, IdentityError> {
        let result = sessions::Entity::update_many()
            .col_expr(sessions::Column::IsActive, Expr::value(false))
            .col_expr(sessions::Column::LoggedOutAt, Expr::value(at))
            .filter(sessions::Column::Username.eq(username))
            .filter(sessions::Column::IsActive.eq(true))
            .exec(&self.db)
            .await
            .context("invalidate sessions for user")?;
        Ok(result.rows_affected)
    }

    async fn list_active(&self, username: &str) -> Result<Vec<Session>, IdentityError> {
        let models = sessions::Entity::find()
            .filter(sessions::Column::Username.eq(username))
            .filter(sessions::Column::IsActive.eq(true))
            .order_by_desc(sessions::Column::CreatedAt)
            .all(&self.db)
            .await
            .context("list active sessions")?;
        Ok(models.into_iter().map(session_from_model).collect())
    }

    async fn reassign_refresh_token(
        &self,
        old_hash: &str,
        new_hash: &str,
    ) -> Result<(), IdentityError> {
        sessions::Entity::update_many()
            .col_expr(
                sessions::Column::RefreshTokenHash,
                Expr::value(new_hash),
            )
            .filter(sessions::Column::RefreshTokenHash.eq(old_hash))
            .exec(&self.db)
            .await
            .context("reassign session refresh token")?;
        Ok(())
    }

    async fn deactivate_created_before(
        &self,
        cutoff: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<u64, IdentityError> {
        let result = sessions::Entity::update_many()
            .col_expr(sessions::Column::IsActive, Expr::value(false))
            .col_expr(sessions::Column::LoggedOutAt, Expr::value(at))
            .filter(sessions::Column::CreatedAt.lt(cutoff))
            .filter(sessions::Column::IsActive.eq(true))
            .exec(&self.db)
            .await
            .context("deactivate stale sessions")?;
        Ok(result.rows_affected)
    }
}

fn session_model(session: &Session) -> sessions::ActiveModel {
    sessions::ActiveModel {
        session_id: Set(session.session_id.clone()),
        user_id: Set(session.user_id),
        username: Set(session.username.clone()),
        refresh_token_hash: Set(session.refresh_token_hash.clone()),
        created_at: Set(session.created_at),
        last_accessed: Set(session.last_accessed),
        is_active: Set(session.is_active),
        logged_out_at: Set(session.logged_out_at),
    }
}

fn session_from_model(model: sessions::Model) -> Session {
    Session {
        session_id: model.session_id,
        user_id: model.user_id,
        username: model.username,
        refresh_token_hash: model.refresh_token_hash,
        created_at: model.created_at,
        last_accessed: model.last_accessed,
        is_active: model.is_active,
        logged_out_at: model.logged_out_at,
    }
}

// ── Login attempt repository ─────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbLoginAttemptRepository {
    pub db: DatabaseConnection,
}

impl LoginAttemptRepository for DbLoginAttemptRepository {
    async fn record(&self, attempt: &LoginAttempt) -> Result<(), IdentityError> {
        login_attempts::ActiveModel {
            id: Set(attempt.id),
            identifier: Set(attempt.identifier.clone()),
            success: Set(attempt.success),
            failure_reason: Set(attempt.failure_reason.clone()),
            user_agent: Set(attempt.user_agent.clone()),
            created_at: Set(attempt.created_at),
        }
        .insert(&self.db)
        .await
        .context("record login attempt")?;
        Ok(())
    }
}

// ── Audit log repository ─────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbAuditLogRepository {
    pub db: DatabaseConnection,
}

impl AuditLogRepository for DbAuditLogRepository {
    async fn append(&self, entry: &AuditEntry) -> Result<(), IdentityError> {
        audit_logs::ActiveModel {
            id: Set(entry.id),
            user_id: Set(entry.user_id),
            action: Set(entry.action.as_str().to_owned()),
            ip_address: Set(entry.ip_address.clone()),
            user_agent: Set(entry.user_agent.clone()),
            details: Set(entry.details.clone()),
            created_at: Set(entry.created_at),
        }
        .insert(&self.db)
        .await
        .context("append audit entry")?;
        Ok(())
    }
}
