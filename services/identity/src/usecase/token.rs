//! Signed access / pre-auth tokens and opaque rotating refresh tokens.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::repository::{RefreshTokenRepository, SessionRepository, UserRepository};
use crate::domain::types::{ACCESS_TOKEN_TTL_SECS, PRE_AUTH_TTL_SECS, RefreshTokenRecord};
use crate::error::IdentityError;

/// Scope claim of a full session token.
pub const SCOPE_SESSION: &str = "session";

/// Scope claim of a restricted token proving password validation only,
/// used to carry state through a pending second factor.
pub const SCOPE_PRE_AUTH: &str = "pre_auth";

/// JWT claims for access and pre-auth tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub scope: String,
    pub iat: u64,
    pub exp: u64,
}

/// Identity extracted from a validated token.
#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub user_id: Uuid,
    pub exp: u64,
}

fn issue_token(
    user_id: Uuid,
    scope: &str,
    ttl_secs: i64,
    secret: &str,
    clock: &dyn Clock,
) -> Result<(String, u64), IdentityError> {
    let now = clock.now().timestamp() as u64;
    let exp = now + ttl_secs as u64;
    let claims = TokenClaims {
        sub: user_id.to_string(),
        scope: scope.to_owned(),
        iat: now,
        exp,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| IdentityError::Internal(e.into()))?;
    Ok((token, exp))
}

/// Issue a full session access token.
pub fn issue_access_token(
    user_id: Uuid,
    secret: &str,
    clock: &dyn Clock,
) -> Result<(String, u64), IdentityError> {
    issue_token(user_id, SCOPE_SESSION, ACCESS_TOKEN_TTL_SECS, secret, clock)
}

/// Issue a short-lived pre-auth token for the 2FA window.
pub fn issue_pre_auth_token(
    user_id: Uuid,
    secret: &str,
    clock: &dyn Clock,
) -> Result<(String, u64), IdentityError> {
    issue_token(user_id, SCOPE_PRE_AUTH, PRE_AUTH_TTL_SECS, secret, clock)
}

/// Validate signature, expiry and scope, returning the token's subject.
///
/// Fails closed: malformed, expired, badly-signed or wrong-scope tokens
/// are all rejected as `INVALID_TOKEN`, never partially trusted. Expiry
/// is enforced against the injected clock (the library's own exp check
/// runs on wall time, which would defeat deterministic tests).
pub fn validate_token(
    token: &str,
    secret: &str,
    expected_scope: &str,
    clock: &dyn Clock,
) -> Result<TokenInfo, IdentityError> {
    let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.validate_exp = false;
    validation.required_spec_claims.clear();
    validation.set_required_spec_claims(&["sub"]);

    let data = decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| IdentityError::InvalidToken)?;

    let claims = data.claims;
    if claims.exp <= clock.now().timestamp() as u64 {
        return Err(IdentityError::InvalidToken);
    }
    if claims.scope != expected_scope {
        return Err(IdentityError::InvalidToken);
    }
    let user_id = claims
        .sub
        .parse::<Uuid>()
        .map_err(|_| IdentityError::InvalidToken)?;

    Ok(TokenInfo {
        user_id,
        exp: claims.exp,
    })
}

/// Generate a cryptographically random opaque refresh token
/// (32 bytes, base64url-encoded without padding).
pub fn generate_refresh_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 digest of a raw refresh token, hex-encoded. This is the value
/// stored and looked up; the raw token never touches the database.
pub fn hash_refresh_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

// ── RefreshAccessToken ───────────────────────────────────────────────────────

#[derive(Debug)]
pub struct RefreshAccessTokenOutput {
    pub user_id: Uuid,
    pub access_token: String,
    pub access_token_exp: u64,
    pub refresh_token: String,
}

pub struct RefreshAccessTokenUseCase<R, U, S>
where
    R: RefreshTokenRepository,
    U: UserRepository,
    S: SessionRepository,
{
    pub refresh_tokens: R,
    pub users: U,
    pub sessions: S,
    pub jwt_secret: String,
    pub clock: Arc<dyn Clock>,
}

impl<R, U, S> RefreshAccessTokenUseCase<R, U, S>
where
    R: RefreshTokenRepository,
    U: UserRepository,
    S: SessionRepository,
{
    /// Redeem a refresh token for a new token pair. The old mapping is
    /// consumed atomically: replaying it afterwards fails, and a
    /// deactivated or deleted user cannot refresh.
    pub async fn execute(
        &self,
        raw_refresh_token: &str,
    ) -> Result<RefreshAccessTokenOutput, IdentityError> {
        let old_hash = hash_refresh_token(raw_refresh_token);

        let mapping = self
            .refresh_tokens
            .find(&old_hash)
            .await?
            .ok_or(IdentityError::InvalidToken)?;

        let user = self
            .users
            .find_by_id(mapping.user_id)
            .await?
            .ok_or(IdentityError::InvalidToken)?;
        if !user.is_active {
            return Err(IdentityError::InvalidToken);
        }

        let new_raw = generate_refresh_token();
        let new_record = RefreshTokenRecord {
            token_hash: hash_refresh_token(&new_raw),
            user_id: user.id,
            created_at: self.clock.now(),
        };

        // A concurrent redemption may have consumed the mapping between
        // the lookup and here; the rotation is the authoritative step.
        if self
            .refresh_tokens
            .rotate(&old_hash, &new_record)
            .await?
            .is_none()
        {
            return Err(IdentityError::InvalidToken);
        }

        // Keep the owning session pointed at the live token, so a later
        // logout still revokes it.
        self.sessions
            .reassign_refresh_token(&old_hash, &new_record.token_hash)
            .await?;

        let (access_token, access_token_exp) =
            issue_access_token(user.id, &self.jwt_secret, self.clock.as_ref())?;

        Ok(RefreshAccessTokenOutput {
            user_id: user.id,
            access_token,
            access_token_exp,
            refresh_token: new_raw,
        })
    }
}
