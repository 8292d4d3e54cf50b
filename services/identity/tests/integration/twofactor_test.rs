use soulsense_identity::error::IdentityError;
use soulsense_identity::usecase::login::{LoginInput, LoginOutcome};

use crate::helpers::Harness;

#[tokio::test]
async fn enabling_2fa_requires_the_setup_code() {
    let harness = Harness::new();
    let user = harness
        .register_user("enroll", "enroll@example.com", "Password1!")
        .await;

    let usecase = harness.twofactor_usecase();
    let code = usecase.send_setup_code(user.id).await.unwrap();

    let wrong = usecase.enable(user.id, "000000").await;
    assert!(matches!(wrong, Err(IdentityError::OtpMismatch)));
    {
        let users = harness.store.users.lock().unwrap();
        assert!(!users.iter().find(|u| u.id == user.id).unwrap().is_2fa_enabled);
    }

    usecase.enable(user.id, &code).await.unwrap();
    {
        let users = harness.store.users.lock().unwrap();
        assert!(users.iter().find(|u| u.id == user.id).unwrap().is_2fa_enabled);
    }

    // The next password login demands a second factor.
    let outcome = harness
        .login_usecase()
        .execute(LoginInput {
            identifier: "enroll".to_owned(),
            password: "Password1!".to_owned(),
            ip_address: None,
            user_agent: None,
        })
        .await
        .unwrap();
    assert!(matches!(outcome, LoginOutcome::PreAuth(_)));
}

#[tokio::test]
async fn disabling_2fa_clears_the_flag_and_secret() {
    let harness = Harness::new();
    let user = harness
        .register_user("unenroll", "unenroll@example.com", "Password1!")
        .await;
    harness.set_user_flags(user.id, true, true);
    {
        let mut users = harness.store.users.lock().unwrap();
        users.iter_mut().find(|u| u.id == user.id).unwrap().twofa_secret =
            Some("legacy-secret".to_owned());
    }

    harness.twofactor_usecase().disable(user.id).await.unwrap();

    let users = harness.store.users.lock().unwrap();
    let stored = users.iter().find(|u| u.id == user.id).unwrap();
    assert!(!stored.is_2fa_enabled);
    assert_eq!(stored.twofa_secret, None);
}

#[tokio::test]
async fn a_deactivated_account_cannot_request_setup_codes() {
    let harness = Harness::new();
    let user = harness
        .register_user("locked", "locked@example.com", "Password1!")
        .await;
    harness.set_user_flags(user.id, false, false);

    let result = harness.twofactor_usecase().send_setup_code(user.id).await;
    assert!(matches!(result, Err(IdentityError::AccountDeactivated)));
    assert!(harness.store.codes.lock().unwrap().is_empty());
}
