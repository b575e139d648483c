use client::forms::{AuthForm, LOGIN_SUCCESS_MESSAGE, VALIDATION_ERROR_CODE};
use client::{ToastDispatcher, ToastKind};
use payloads::requests;
use std::sync::Arc;
use test_helpers::{alice_credentials, alice_login_credentials};

use crate::{session_for, spawn_app};

#[tokio::test]
async fn login_form_signs_in() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_user().await?;
    let (manager, store) = session_for(&app);
    let toasts = ToastDispatcher::new();
    let form = AuthForm::new(Arc::new(manager), toasts.clone());

    let session = form.submit_login(alice_login_credentials()).await?;

    assert_eq!(store.len(), 3);
    assert_eq!(form.login_hook().data(), Some(session));
    let shown = toasts.toasts();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].kind, ToastKind::Success);
    assert_eq!(shown[0].message.as_deref(), Some(LOGIN_SUCCESS_MESSAGE));
    Ok(())
}

#[tokio::test]
async fn incomplete_login_stays_local() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_user().await?;
    let (manager, store) = session_for(&app);
    let form = AuthForm::new(Arc::new(manager), ToastDispatcher::new());

    let error = form
        .submit_login(requests::LoginCredentials {
            email: "   ".into(),
            password: "supersecret".into(),
        })
        .await
        .unwrap_err();

    assert_eq!(error.code.as_deref(), Some(VALIDATION_ERROR_CODE));
    assert!(store.is_empty());
    // Only the session opened by registration exists.
    assert_eq!(app.backend.session_count("alice@example.com"), 1);
    Ok(())
}

#[tokio::test]
async fn invalid_registration_stays_local() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (manager, store) = session_for(&app);
    let toasts = ToastDispatcher::new();
    let form = AuthForm::new(Arc::new(manager), toasts.clone());

    let details = requests::RegisterData {
        password: "short".into(),
        ..alice_credentials()
    };
    let error = form.submit_register(details, "short").await.unwrap_err();

    assert_eq!(error.message, "Password must be at least 8 characters");
    assert_eq!(toasts.toasts()[0].kind, ToastKind::Warning);
    assert!(store.is_empty());
    assert!(app.backend.user("alice@example.com").is_none());
    Ok(())
}

#[tokio::test]
async fn registration_form_creates_account() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (manager, store) = session_for(&app);
    let form = AuthForm::new(Arc::new(manager), ToastDispatcher::new());

    let details = alice_credentials();
    let confirm = details.password.clone();
    form.submit_register(details, &confirm).await?;

    assert_eq!(store.len(), 3);
    assert!(app.backend.user("alice@example.com").is_some());
    Ok(())
}
