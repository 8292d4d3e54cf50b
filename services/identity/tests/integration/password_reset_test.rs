use chrono::Duration;

use soulsense_identity::domain::types::AuditAction;
use soulsense_identity::error::IdentityError;

use crate::helpers::Harness;

#[tokio::test]
async fn full_reset_flow_replaces_the_password() {
    let harness = Harness::new();
    harness
        .register_user("reset", "reset@example.com", "OldPassword1!")
        .await;

    let challenge = harness
        .initiate_reset_usecase()
        .execute("reset@example.com")
        .await
        .unwrap();
    let code = challenge.code.expect("known email yields a code");

    harness
        .complete_reset_usecase()
        .execute("reset@example.com", &code, "NewPassword1!")
        .await
        .unwrap();

    // Old password no longer works; the new one does.
    let old = harness
        .login_usecase()
        .execute(soulsense_identity::usecase::login::LoginInput {
            identifier: "reset".to_owned(),
            password: "OldPassword1!".to_owned(),
            ip_address: None,
            user_agent: None,
        })
        .await;
    assert!(matches!(old, Err(IdentityError::InvalidCredentials)));

    harness.login_authenticated("reset", "NewPassword1!").await;

    let audit = harness.store.audit.lock().unwrap();
    assert!(audit.iter().any(|e| e.action == AuditAction::PasswordReset));
}

#[tokio::test]
async fn an_immediate_second_initiation_is_throttled() {
    let harness = Harness::new();
    harness
        .register_user("rate", "rate@example.com", "Password1!")
        .await;

    harness
        .initiate_reset_usecase()
        .execute("rate@example.com")
        .await
        .unwrap();

    let second = harness
        .initiate_reset_usecase()
        .execute("rate@example.com")
        .await;
    assert!(matches!(second, Err(IdentityError::RateLimited { .. })));

    // After the issuance window the flow opens up again.
    harness.clock.advance(Duration::seconds(61));
    assert!(
        harness
            .initiate_reset_usecase()
            .execute("rate@example.com")
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn an_expired_code_is_rejected_and_consumed() {
    let harness = Harness::new();
    harness
        .register_user("expire", "expire@example.com", "OldPassword1!")
        .await;

    let code = harness
        .initiate_reset_usecase()
        .execute("expire@example.com")
        .await
        .unwrap()
        .code
        .unwrap();

    harness.clock.advance(Duration::minutes(6));

    let expired = harness
        .complete_reset_usecase()
        .execute("expire@example.com", &code, "NewPassword1!")
        .await;
    assert!(matches!(expired, Err(IdentityError::OtpExpired)));

    // The password was not touched.
    harness
        .login_authenticated("expire", "OldPassword1!")
        .await;

    // The expired code was marked used on inspection, so a late retry
    // cannot probe it again.
    let retry = harness
        .complete_reset_usecase()
        .execute("expire@example.com", &code, "NewPassword1!")
        .await;
    assert!(matches!(retry, Err(IdentityError::OtpNotFound)));
}

#[tokio::test]
async fn a_mismatched_code_leaves_everything_untouched() {
    let harness = Harness::new();
    harness
        .register_user("wrongcode", "wrongcode@example.com", "OldPassword1!")
        .await;

    let code = harness
        .initiate_reset_usecase()
        .execute("wrongcode@example.com")
        .await
        .unwrap()
        .code
        .unwrap();

    let mismatch = harness
        .complete_reset_usecase()
        .execute("wrongcode@example.com", "000000", "NewPassword1!")
        .await;
    assert!(matches!(mismatch, Err(IdentityError::OtpMismatch)));

    // Old password intact, and the real code is still redeemable.
    harness
        .login_authenticated("wrongcode", "OldPassword1!")
        .await;
    harness
        .complete_reset_usecase()
        .execute("wrongcode@example.com", &code, "NewPassword1!")
        .await
        .unwrap();
}

#[tokio::test]
async fn a_reset_code_never_verifies_twice() {
    let harness = Harness::new();
    harness
        .register_user("onceonly", "onceonly@example.com", "OldPassword1!")
        .await;

    let code = harness
        .initiate_reset_usecase()
        .execute("onceonly@example.com")
        .await
        .unwrap()
        .code
        .unwrap();

    harness
        .complete_reset_usecase()
        .execute("onceonly@example.com", &code, "NewPassword1!")
        .await
        .unwrap();

    let replay = harness
        .complete_reset_usecase()
        .execute("onceonly@example.com", &code, "AnotherPassword1!")
        .await;
    assert!(matches!(replay, Err(IdentityError::OtpNotFound)));
}

#[tokio::test]
async fn unknown_email_yields_the_same_shape_with_no_code() {
    let harness = Harness::new();
    let challenge = harness
        .initiate_reset_usecase()
        .execute("nobody@example.com")
        .await
        .unwrap();
    assert!(challenge.code.is_none());
    assert!(harness.store.codes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn a_successful_reset_logs_the_user_out_everywhere() {
    let harness = Harness::new();
    harness
        .register_user("evict", "evict@example.com", "OldPassword1!")
        .await;
    let authenticated = harness
        .login_authenticated("evict", "OldPassword1!")
        .await;

    let code = harness
        .initiate_reset_usecase()
        .execute("evict@example.com")
        .await
        .unwrap()
        .code
        .unwrap();
    harness
        .complete_reset_usecase()
        .execute("evict@example.com", &code, "NewPassword1!")
        .await
        .unwrap();

    // The pre-reset session and refresh token are both dead.
    let username = harness
        .session_manager()
        .validate(&authenticated.session_id)
        .await
        .unwrap();
    assert_eq!(username, None);

    let refresh = harness
        .refresh_usecase()
        .execute(&authenticated.refresh_token)
        .await;
    assert!(matches!(refresh, Err(IdentityError::InvalidToken)));
}
