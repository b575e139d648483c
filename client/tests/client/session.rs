use client::SessionError;
use client::auth::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};
use client::storage::KeyValueStore;
use payloads::{ClientError, requests};
use reqwest::StatusCode;
use test_helpers::{alice_credentials, alice_login_credentials};

use crate::{session_for, spawn_app};

#[tokio::test]
async fn login_persists_session() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_user().await?;
    let (manager, store) = session_for(&app);

    let session = manager.login(&alice_login_credentials()).await?;

    assert!(manager.is_authenticated());
    assert_eq!(
        store.get(ACCESS_TOKEN_KEY)?.as_deref(),
        Some(session.access_token.as_str())
    );
    assert_eq!(
        store.get(REFRESH_TOKEN_KEY)?.as_deref(),
        Some(session.refresh_token.as_str())
    );
    assert!(store.get(USER_KEY)?.is_some());
    assert_eq!(manager.current_user(), session.user);
    assert_eq!(manager.session(), Some(session));
    Ok(())
}

#[tokio::test]
async fn invalid_login_writes_nothing() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_user().await?;
    let (manager, store) = session_for(&app);

    let result = manager
        .login(&requests::LoginCredentials {
            email: "alice@example.com".into(),
            password: "wrong password".into(),
        })
        .await;

    match result {
        Err(SessionError::Client(ClientError::Api { status, message, .. })) => {
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(message, "Invalid email or password");
        }
        other => panic!("expected an API error, got {other:?}"),
    }
    assert!(store.is_empty());
    assert!(!manager.is_authenticated());
    Ok(())
}

#[tokio::test]
async fn register_persists_session() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (manager, store) = session_for(&app);

    let session = manager.register(&alice_credentials()).await?;

    assert_eq!(store.len(), 3);
    let user = session.user.unwrap();
    assert_eq!(user.email, "alice@example.com");
    assert!(!user.email_verified);
    Ok(())
}

#[tokio::test]
async fn duplicate_registration_is_a_conflict() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_user().await?;
    let (manager, store) = session_for(&app);

    let result = manager.register(&alice_credentials()).await;

    assert!(matches!(
        result,
        Err(SessionError::Client(ClientError::Api { status, .. }))
            if status == StatusCode::CONFLICT
    ));
    assert!(store.is_empty());
    Ok(())
}

#[tokio::test]
async fn logout_invalidates_refresh_token() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_user().await?;
    let (manager, store) = session_for(&app);
    let session = manager.login(&alice_login_credentials()).await?;

    manager.logout().await?;

    assert!(store.is_empty());
    assert!(!manager.is_authenticated());
    assert!(!app.backend.is_refresh_token_valid(&session.refresh_token));
    Ok(())
}

#[tokio::test]
async fn logout_clears_session_when_server_fails() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_user().await?;
    let (manager, store) = session_for(&app);
    let session = manager.login(&alice_login_credentials()).await?;

    app.backend.set_fail_logout(true);
    manager.logout().await?;

    assert!(store.is_empty());
    // The server never heard about it.
    assert!(app.backend.is_refresh_token_valid(&session.refresh_token));
    Ok(())
}

#[tokio::test]
async fn logout_clears_session_when_server_is_down() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_user().await?;
    let (manager, store) = session_for(&app);
    manager.login(&alice_login_credentials()).await?;

    app.stop().await;
    manager.logout().await?;

    assert!(store.is_empty());
    Ok(())
}

#[tokio::test]
async fn logout_without_session_is_ok() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (manager, store) = session_for(&app);

    manager.logout().await?;

    assert!(store.is_empty());
    Ok(())
}

#[tokio::test]
async fn refresh_rotates_tokens() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_user().await?;
    let (manager, store) = session_for(&app);
    let session = manager.login(&alice_login_credentials()).await?;

    let pair = manager.refresh().await?;

    assert_ne!(pair.refresh_token, session.refresh_token);
    assert_eq!(store.get(ACCESS_TOKEN_KEY)?, Some(pair.access_token));
    assert_eq!(
        store.get(REFRESH_TOKEN_KEY)?.as_deref(),
        Some(pair.refresh_token.as_str())
    );
    assert!(!app.backend.is_refresh_token_valid(&session.refresh_token));
    assert!(app.backend.is_refresh_token_valid(&pair.refresh_token));
    // The cached user is left alone.
    assert_eq!(manager.current_user(), session.user);
    Ok(())
}

#[tokio::test]
async fn concurrent_refreshes_run_in_turn() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_user().await?;
    let (manager, store) = session_for(&app);
    manager.login(&alice_login_credentials()).await?;

    let (first, second) = tokio::join!(manager.refresh(), manager.refresh());
    let (first, second) = (first?, second?);

    // Each refresh used the token the previous one stored, so both worked
    // and exactly one refresh token is still live.
    let stored = store.get(REFRESH_TOKEN_KEY)?.unwrap();
    let live: Vec<_> = [&first.refresh_token, &second.refresh_token]
        .into_iter()
        .filter(|token| app.backend.is_refresh_token_valid(token))
        .collect();
    assert_eq!(live, vec![&stored]);
    Ok(())
}

#[tokio::test]
async fn refresh_without_session() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (manager, _) = session_for(&app);

    assert!(matches!(
        manager.refresh().await,
        Err(SessionError::NoRefreshToken)
    ));
    Ok(())
}

#[tokio::test]
async fn rejected_refresh_keeps_stored_tokens() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_user().await?;
    let (manager, store) = session_for(&app);
    let session = manager.login(&alice_login_credentials()).await?;

    // Sign out everywhere from another device.
    let (other, _) = session_for(&app);
    other.login(&alice_login_credentials()).await?;
    other.revoke_all_sessions().await?;

    let error = manager.refresh().await.unwrap_err();
    match error {
        SessionError::Client(e) => assert!(e.is_unauthorized()),
        other => panic!("expected a client error, got {other:?}"),
    }
    assert_eq!(
        store.get(REFRESH_TOKEN_KEY)?.as_deref(),
        Some(session.refresh_token.as_str())
    );
    Ok(())
}
