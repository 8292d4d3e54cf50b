use chrono::Duration;

use soulsense_identity::clock::Clock;
use soulsense_identity::domain::types::AuditAction;

use crate::helpers::Harness;

#[tokio::test]
async fn validate_bumps_last_accessed() {
    let harness = Harness::new();
    let user = harness
        .register_user("bump", "bump@example.com", "Password1!")
        .await;

    let manager = harness.session_manager();
    let session_id = manager.create(user.id, "bump").await.unwrap();
    let created_access = harness
        .store
        .sessions
        .lock()
        .unwrap()
        .iter()
        .find(|s| s.session_id == session_id)
        .unwrap()
        .last_accessed;

    harness.clock.advance(Duration::seconds(30));
    let username = manager.validate(&session_id).await.unwrap();
    assert_eq!(username.as_deref(), Some("bump"));

    let bumped = harness
        .store
        .sessions
        .lock()
        .unwrap()
        .iter()
        .find(|s| s.session_id == session_id)
        .unwrap()
        .last_accessed;
    assert!(bumped > created_access);
}

#[tokio::test]
async fn an_invalidated_session_never_validates_again() {
    let harness = Harness::new();
    let user = harness
        .register_user("inval", "inval@example.com", "Password1!")
        .await;

    let manager = harness.session_manager();
    let session_id = manager.create(user.id, "inval").await.unwrap();
    assert!(manager.validate(&session_id).await.unwrap().is_some());

    manager.invalidate(&session_id).await.unwrap();
    assert_eq!(manager.validate(&session_id).await.unwrap(), None);

    // Logout stamp is set once and survives a second invalidation.
    let first_stamp = harness
        .store
        .sessions
        .lock()
        .unwrap()
        .iter()
        .find(|s| s.session_id == session_id)
        .unwrap()
        .logged_out_at;
    assert_eq!(first_stamp, Some(harness.clock.now()));

    harness.clock.advance(Duration::minutes(5));
    manager.invalidate(&session_id).await.unwrap();
    let second_stamp = harness
        .store
        .sessions
        .lock()
        .unwrap()
        .iter()
        .find(|s| s.session_id == session_id)
        .unwrap()
        .logged_out_at;
    assert_eq!(second_stamp, first_stamp);
}

#[tokio::test]
async fn validate_unknown_session_is_invalid() {
    let harness = Harness::new();
    let manager = harness.session_manager();
    assert_eq!(manager.validate("no-such-session").await.unwrap(), None);
}

#[tokio::test]
async fn invalidate_all_deactivates_every_session_and_reports_the_count() {
    let harness = Harness::new();
    let user = harness
        .register_user("bulk", "bulk@example.com", "Password1!")
        .await;

    let manager = harness.session_manager();
    for _ in 0..3 {
        manager.create(user.id, "bulk").await.unwrap();
    }
    assert_eq!(manager.list_active("bulk").await.unwrap().len(), 3);

    let count = manager.invalidate_all("bulk").await.unwrap();
    assert_eq!(count, 3);
    assert!(manager.list_active("bulk").await.unwrap().is_empty());

    // A second sweep finds nothing left to deactivate.
    assert_eq!(manager.invalidate_all("bulk").await.unwrap(), 0);
}

#[tokio::test]
async fn cleanup_uses_absolute_creation_age_not_idle_time() {
    let harness = Harness::new();
    let user = harness
        .register_user("stale", "stale@example.com", "Password1!")
        .await;

    let manager = harness.session_manager();
    let old_session = manager.create(user.id, "stale").await.unwrap();

    harness.clock.advance(Duration::hours(24));
    let fresh_session = manager.create(user.id, "stale").await.unwrap();
    harness.clock.advance(Duration::hours(1));

    // Keep the old session recently used: absolute age must still win.
    manager.validate(&old_session).await.unwrap();

    let count = manager.cleanup_stale(24).await.unwrap();
    assert_eq!(count, 1);

    assert_eq!(manager.validate(&old_session).await.unwrap(), None);
    assert!(manager.validate(&fresh_session).await.unwrap().is_some());
}

#[tokio::test]
async fn cleanup_usecase_audits_the_sweep() {
    let harness = Harness::new();
    let user = harness
        .register_user("sweep", "sweep@example.com", "Password1!")
        .await;

    let manager = harness.session_manager();
    manager.create(user.id, "sweep").await.unwrap();
    harness.clock.advance(Duration::hours(25));

    let count = harness.cleanup_usecase().execute(24).await.unwrap();
    assert_eq!(count, 1);

    let audit = harness.store.audit.lock().unwrap();
    let entry = audit
        .iter()
        .find(|e| e.action == AuditAction::SessionCleanup)
        .expect("cleanup audit entry");
    assert_eq!(entry.details["deactivated"], 1);
    assert_eq!(entry.user_id, None);
}
