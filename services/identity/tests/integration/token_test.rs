use soulsense_identity::domain::repository::RefreshTokenRepository;
use soulsense_identity::error::IdentityError;

use crate::helpers::Harness;

#[tokio::test]
async fn redeeming_a_refresh_token_rotates_it() {
    let harness = Harness::new();
    let user = harness
        .register_user("rotate", "rotate@example.com", "Password1!")
        .await;
    let authenticated = harness.login_authenticated("rotate", "Password1!").await;

    let rotated = harness
        .refresh_usecase()
        .execute(&authenticated.refresh_token)
        .await
        .unwrap();
    assert_eq!(rotated.user_id, user.id);
    assert!(!rotated.access_token.is_empty());
    assert_ne!(rotated.refresh_token, authenticated.refresh_token);

    // The replacement works.
    let again = harness
        .refresh_usecase()
        .execute(&rotated.refresh_token)
        .await
        .unwrap();
    assert_eq!(again.user_id, user.id);
}

#[tokio::test]
async fn second_redemption_of_the_same_token_fails() {
    let harness = Harness::new();
    harness
        .register_user("replay", "replay@example.com", "Password1!")
        .await;
    let authenticated = harness.login_authenticated("replay", "Password1!").await;

    harness
        .refresh_usecase()
        .execute(&authenticated.refresh_token)
        .await
        .unwrap();

    // An attacker replaying the consumed token gets nothing.
    let replay = harness
        .refresh_usecase()
        .execute(&authenticated.refresh_token)
        .await;
    assert!(matches!(replay, Err(IdentityError::InvalidToken)));
}

#[tokio::test]
async fn logout_after_rotation_revokes_the_live_token() {
    let harness = Harness::new();
    harness
        .register_user("chain", "chain@example.com", "Password1!")
        .await;
    let authenticated = harness.login_authenticated("chain", "Password1!").await;

    let rotated = harness
        .refresh_usecase()
        .execute(&authenticated.refresh_token)
        .await
        .unwrap();

    harness
        .logout_usecase()
        .execute(&authenticated.session_id)
        .await
        .unwrap();

    // The rotated descendant dies with the session, not just the token
    // issued at login.
    let result = harness.refresh_usecase().execute(&rotated.refresh_token).await;
    assert!(matches!(result, Err(IdentityError::InvalidToken)));
}

#[tokio::test]
async fn unknown_refresh_token_is_rejected() {
    let harness = Harness::new();
    let result = harness.refresh_usecase().execute("never-issued").await;
    assert!(matches!(result, Err(IdentityError::InvalidToken)));
}

#[tokio::test]
async fn a_deactivated_user_cannot_refresh() {
    let harness = Harness::new();
    let user = harness
        .register_user("frozen", "frozen@example.com", "Password1!")
        .await;
    let authenticated = harness.login_authenticated("frozen", "Password1!").await;

    harness.set_user_flags(user.id, false, false);

    let result = harness
        .refresh_usecase()
        .execute(&authenticated.refresh_token)
        .await;
    assert!(matches!(result, Err(IdentityError::InvalidToken)));
}

#[tokio::test]
async fn revoking_a_token_is_idempotent() {
    let harness = Harness::new();
    harness
        .register_user("revoke", "revoke@example.com", "Password1!")
        .await;
    let authenticated = harness.login_authenticated("revoke", "Password1!").await;

    let repo = harness.store.refresh_token_repo();
    let hash = soulsense_identity::usecase::token::hash_refresh_token(&authenticated.refresh_token);

    repo.revoke(&hash).await.unwrap();
    // Revoking again, or revoking something never issued, is not an error.
    repo.revoke(&hash).await.unwrap();
    repo.revoke("no-such-hash").await.unwrap();

    let result = harness
        .refresh_usecase()
        .execute(&authenticated.refresh_token)
        .await;
    assert!(matches!(result, Err(IdentityError::InvalidToken)));
}
