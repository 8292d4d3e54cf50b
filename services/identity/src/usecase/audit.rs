//! Redacted, size-bounded audit logging of security events.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::repository::AuditLogRepository;
use crate::domain::types::{AuditAction, AuditEntry, USER_AGENT_MAX_LEN};

/// Keys stripped from `details` before storage. Matching is
/// case-insensitive containment, so `reset_code` and `accessToken` are
/// caught too.
const REDACTED_KEYS: [&str; 5] = ["password", "secret", "code", "token", "otp"];

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_lowercase();
    REDACTED_KEYS.iter().any(|denied| key.contains(denied))
}

/// Strip denylisted keys from a details blob, recursing into nested
/// objects and arrays.
pub fn redact_details(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !is_sensitive_key(key))
                .map(|(key, val)| (key.clone(), redact_details(val)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_details).collect()),
        other => other.clone(),
    }
}

/// Cap a user-agent string at the storage limit, appending a marker when
/// cut.
pub fn truncate_user_agent(user_agent: &str) -> String {
    if user_agent.chars().count() <= USER_AGENT_MAX_LEN {
        return user_agent.to_owned();
    }
    let mut truncated: String = user_agent.chars().take(USER_AGENT_MAX_LEN - 3).collect();
    truncated.push_str("...");
    truncated
}

/// Appends audit entries. Storage failures never propagate to the
/// caller (a broken audit trail must not abort a login), so `log`
/// reports success through its return value only.
pub struct AuditService<A: AuditLogRepository> {
    pub entries: A,
    pub clock: Arc<dyn Clock>,
}

impl<A: AuditLogRepository> AuditService<A> {
    pub async fn log(
        &self,
        user_id: Option<Uuid>,
        action: AuditAction,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
        details: Option<Value>,
    ) -> bool {
        let entry = AuditEntry {
            id: Uuid::new_v4(),
            user_id,
            action,
            ip_address: ip_address.map(str::to_owned),
            user_agent: user_agent.map(truncate_user_agent),
            details: details
                .map(|d| redact_details(&d))
                .unwrap_or(Value::Null),
            created_at: self.clock.now(),
        };

        match self.entries.append(&entry).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, action = action.as_str(), "audit write failed");
                false
            }
        }
    }
}
