//! One-time code issuance and verification.

use std::sync::Arc;

use chrono::Duration;
use rand::RngExt;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::repository::OtpRepository;
use crate::domain::types::{OTP_LEN, OTP_TTL_SECS, OneTimeCode, OtpKind};
use crate::error::IdentityError;
use crate::ratelimit::RateLimiter;

/// Charset for generating numeric one-time codes.
const CHARSET: &[u8] = b"0123456789";

/// Generate a fixed-length numeric code from a CSPRNG.
pub fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..OTP_LEN)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

/// SHA-256 digest of a code, hex-encoded. This is the only form stored.
pub fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Issues and verifies one-time codes.
///
/// Issuance is throttled per identifier so a flow cannot be used to spam
/// codes; verification consumes a code exactly once.
pub struct OtpManager<O: OtpRepository> {
    pub codes: O,
    pub issue_limiter: Arc<RateLimiter>,
    pub clock: Arc<dyn Clock>,
}

impl<O: OtpRepository> OtpManager<O> {
    /// Issue a fresh code for `user_id`, keyed on `identifier` for the
    /// issuance throttle. Returns the plaintext for out-of-band delivery;
    /// only the digest is stored.
    pub async fn issue(
        &self,
        user_id: Uuid,
        identifier: &str,
        kind: OtpKind,
    ) -> Result<String, IdentityError> {
        let decision = self.issue_limiter.check(identifier);
        if decision.limited {
            return Err(IdentityError::RateLimited {
                retry_after_secs: decision.retry_after_secs,
            });
        }

        let code = generate_code();
        let now = self.clock.now();
        let record = OneTimeCode {
            id: Uuid::new_v4(),
            user_id,
            code_hash: hash_code(&code),
            kind,
            expires_at: now + Duration::seconds(OTP_TTL_SECS),
            is_used: false,
            created_at: now,
        };
        self.codes.create(&record).await?;
        Ok(code)
    }

    /// Verify `candidate` against the most recent unused code of `kind`.
    ///
    /// An expired code is marked used the moment it is inspected, so it
    /// cannot be probed by later retries. A mismatch mutates nothing;
    /// repeated guessing is throttled by the calling layer.
    pub async fn verify(
        &self,
        user_id: Uuid,
        kind: OtpKind,
        candidate: &str,
    ) -> Result<(), IdentityError> {
        let record = self
            .codes
            .find_latest_unused(user_id, kind)
            .await?
            .ok_or(IdentityError::OtpNotFound)?;

        if record.is_expired_at(self.clock.now()) {
            self.codes.mark_used(record.id).await?;
            return Err(IdentityError::OtpExpired);
        }

        let candidate_hash = hash_code(candidate);
        if !constant_time_eq(candidate_hash.as_bytes(), record.code_hash.as_bytes()) {
            return Err(IdentityError::OtpMismatch);
        }

        self.codes.mark_used(record.id).await?;
        Ok(())
    }
}
