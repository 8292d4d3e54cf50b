//! Stale-session reclamation.

use serde_json::json;

use crate::domain::repository::{AuditLogRepository, SessionRepository};
use crate::domain::types::AuditAction;
use crate::error::IdentityError;
use crate::usecase::audit::AuditService;
use crate::usecase::session::SessionManager;

pub struct CleanupStaleSessionsUseCase<S, A>
where
    S: SessionRepository,
    A: AuditLogRepository,
{
    pub sessions: SessionManager<S>,
    pub audit: AuditService<A>,
}

impl<S, A> CleanupStaleSessionsUseCase<S, A>
where
    S: SessionRepository,
    A: AuditLogRepository,
{
    /// Deactivate sessions whose creation time exceeds `max_age_hours`
    /// and audit the sweep. Returns the count deactivated.
    pub async fn execute(&self, max_age_hours: i64) -> Result<u64, IdentityError> {
        let deactivated = self.sessions.cleanup_stale(max_age_hours).await?;
        self.audit
            .log(
                None,
                AuditAction::SessionCleanup,
                None,
                None,
                Some(json!({
                    "deactivated": deactivated,
                    "max_age_hours": max_age_hours,
                })),
            )
            .await;
        Ok(deactivated)
    }
}
