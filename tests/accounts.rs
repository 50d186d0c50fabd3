mod common;

use common::{register_teacher, test_app};
use teachshare::services::accounts::NewTeacher;
use teachshare::AppError;

#[tokio::test]
async fn register_rejects_duplicate_username() {
    let app = test_app().await;
    register_teacher(&app, "anna").await;

    let err = app
        .accounts
        .register(NewTeacher {
            username: "anna".to_string(),
            email: "other@example.com".to_string(),
            password: "password123".to_string(),
            full_name: "Other Teacher".to_string(),
            about: None,
            institution_id: None,
            subject_ids: vec![1],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // the original registration is untouched
    let anna = app.accounts.teacher_by_username("anna").await.unwrap();
    assert_eq!(anna.email, "anna@example.com");
}

#[tokio::test]
async fn register_rejects_duplicate_email() {
    let app = test_app().await;
    register_teacher(&app, "anna").await;

    let err = app
        .accounts
        .register(NewTeacher {
            username: "not_anna".to_string(),
            email: "anna@example.com".to_string(),
            password: "password123".to_string(),
            full_name: "Other Teacher".to_string(),
            about: None,
            institution_id: None,
            subject_ids: vec![1],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn authenticate_uses_one_error_for_both_failure_modes() {
    let app = test_app().await;
    register_teacher(&app, "anna").await;

    let unknown_user = app
        .accounts
        .authenticate("nobody", "password123")
        .await
        .unwrap_err();
    let wrong_password = app
        .accounts
        .authenticate("anna", "not-the-password")
        .await
        .unwrap_err();

    assert_eq!(unknown_user.to_string(), wrong_password.to_string());
}

#[tokio::test]
async fn session_round_trip() {
    let app = test_app().await;
    let anna = register_teacher(&app, "anna").await;

    let (teacher, token) = app
        .accounts
        .authenticate("anna", "password123")
        .await
        .unwrap();
    assert_eq!(teacher.id, anna.id);

    let resolved = app.accounts.session_teacher(&token).await.unwrap();
    assert_eq!(resolved.id, anna.id);

    app.accounts.logout(&token).await.unwrap();
    assert!(app.accounts.session_teacher(&token).await.is_err());

    // logout of a dead token is a no-op
    app.accounts.logout(&token).await.unwrap();
}

#[tokio::test]
async fn password_reset_flow() {
    let app = test_app().await;
    register_teacher(&app, "anna").await;

    // unknown addresses produce no token but no error either
    assert!(app
        .accounts
        .request_password_reset("stranger@example.com")
        .await
        .unwrap()
        .is_none());

    let token = app
        .accounts
        .request_password_reset("anna@example.com")
        .await
        .unwrap()
        .expect("registered email should yield a token");

    app.accounts
        .reset_password(&token, "brand-new-password")
        .await
        .unwrap();

    assert!(app
        .accounts
        .authenticate("anna", "password123")
        .await
        .is_err());
    app.accounts
        .authenticate("anna", "brand-new-password")
        .await
        .unwrap();
}

#[tokio::test]
async fn reset_rejects_tampered_token() {
    let app = test_app().await;
    register_teacher(&app, "anna").await;

    let token = app
        .accounts
        .request_password_reset("anna@example.com")
        .await
        .unwrap()
        .unwrap();
    let mut tampered = token.clone();
    tampered.push('x');

    let err = app
        .accounts
        .reset_password(&tampered, "whatever")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidToken));
}
