use client::SessionError;
use client::storage::KeyValueStore;
use payloads::{ClientError, requests, responses::NotificationSettings};
use reqwest::StatusCode;
use test_helpers::{
    alice_credentials, alice_login_credentials, assert_status_code,
};

use crate::{session_for, spawn_app};

#[tokio::test]
async fn update_profile_refreshes_cached_user() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (manager, _) = session_for(&app);
    manager.register(&alice_credentials()).await?;

    let user = manager
        .update_profile(&requests::UpdateProfile {
            first_name: Some("Alicia".into()),
            bio: Some("Organise des meetups".into()),
            ..Default::default()
        })
        .await?;

    assert_eq!(user.first_name, "Alicia");
    assert_eq!(user.last_name, "Martin");
    assert_eq!(manager.current_user(), Some(user.clone()));
    assert_eq!(manager.fetch_profile().await?, user);
    Ok(())
}

#[tokio::test]
async fn rejected_profile_update_keeps_cache() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (manager, _) = session_for(&app);
    let session = manager.register(&alice_credentials()).await?;

    let result = manager
        .update_profile(&requests::UpdateProfile {
            first_name: Some("   ".into()),
            ..Default::default()
        })
        .await;

    assert!(matches!(
        result,
        Err(SessionError::Client(ClientError::Api { status, .. }))
            if status == StatusCode::BAD_REQUEST
    ));
    assert_eq!(manager.current_user(), session.user);
    Ok(())
}

#[tokio::test]
async fn signed_out_calls_never_reach_the_server() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (manager, store) = session_for(&app);

    assert!(matches!(
        manager.fetch_profile().await,
        Err(SessionError::NotAuthenticated)
    ));
    assert!(matches!(
        manager.delete_avatar().await,
        Err(SessionError::NotAuthenticated)
    ));
    assert!(store.is_empty());
    Ok(())
}

#[tokio::test]
async fn avatar_lifecycle() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (manager, _) = session_for(&app);
    manager.register(&alice_credentials()).await?;

    let upload =
        requests::UploadAvatar::from_bytes("me.png", "image/png", b"\x89PNG");
    let user = manager.upload_avatar(&upload).await?;
    let avatar = user.avatar.clone().unwrap();
    assert!(avatar.ends_with("/me.png"));
    assert_eq!(manager.current_user().unwrap().avatar, Some(avatar));

    let user = manager
        .update_avatar("https://cdn.example.com/alice.jpg")
        .await?;
    assert_eq!(
        user.avatar.as_deref(),
        Some("https://cdn.example.com/alice.jpg")
    );

    let user = manager.delete_avatar().await?;
    assert_eq!(user.avatar, None);
    assert_eq!(manager.current_user().unwrap().avatar, None);
    Ok(())
}

#[tokio::test]
async fn avatar_must_be_an_image() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let response = app.create_alice_user().await?;

    let upload =
        requests::UploadAvatar::from_bytes("notes.txt", "text/plain", b"hello");
    let result = app
        .client
        .upload_avatar(&upload, &response.access_token)
        .await;

    assert_status_code(result, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn verify_email_marks_cached_user() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (manager, _) = session_for(&app);
    manager.register(&alice_credentials()).await?;
    let token = app.backend.verification_token("alice@example.com").unwrap();

    manager
        .verify_email(&requests::VerifyEmail {
            token: token.clone(),
        })
        .await?;

    assert!(manager.current_user().unwrap().email_verified);
    assert!(app.backend.user("alice@example.com").unwrap().email_verified);

    // Tokens are single use.
    let result = manager.verify_email(&requests::VerifyEmail { token }).await;
    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
async fn resend_verification_issues_new_token() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (manager, _) = session_for(&app);
    manager.register(&alice_credentials()).await?;
    let first = app.backend.verification_token("alice@example.com").unwrap();

    manager
        .resend_verification(&requests::ResendVerification {
            email: "alice@example.com".into(),
        })
        .await?;

    let second = app.backend.verification_token("alice@example.com").unwrap();
    assert_ne!(first, second);
    Ok(())
}

#[tokio::test]
async fn change_password() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (manager, _) = session_for(&app);
    manager.register(&alice_credentials()).await?;

    let wrong = manager
        .change_password(&requests::ChangePassword {
            current_password: "not my password".into(),
            new_password: "brand new password".into(),
        })
        .await;
    assert!(wrong.is_err());

    manager
        .change_password(&requests::ChangePassword {
            current_password: alice_credentials().password,
            new_password: "brand new password".into(),
        })
        .await?;

    let (other, _) = session_for(&app);
    assert!(other.login(&alice_login_credentials()).await.is_err());
    other
        .login(&requests::LoginCredentials {
            email: "alice@example.com".into(),
            password: "brand new password".into(),
        })
        .await?;
    Ok(())
}

#[tokio::test]
async fn forgot_and_reset_password() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_user().await?;
    let (manager, _) = session_for(&app);

    // Unknown addresses look the same as known ones.
    manager
        .forgot_password(&requests::ForgotPassword {
            email: "nobody@example.com".into(),
        })
        .await?;
    manager
        .forgot_password(&requests::ForgotPassword {
            email: "alice@example.com".into(),
        })
        .await?;
    let token = app.backend.password_reset_token("alice@example.com").unwrap();

    let too_short = manager
        .reset_password(&requests::ResetPassword {
            token: token.clone(),
            password: "short".into(),
        })
        .await;
    assert!(too_short.is_err());

    manager
        .reset_password(&requests::ResetPassword {
            token,
            password: "reset password".into(),
        })
        .await?;
    manager
        .login(&requests::LoginCredentials {
            email: "alice@example.com".into(),
            password: "reset password".into(),
        })
        .await?;
    Ok(())
}

#[tokio::test]
async fn notification_settings_round_trip() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (manager, _) = session_for(&app);
    manager.register(&alice_credentials()).await?;

    assert_eq!(
        manager.notification_settings().await?,
        NotificationSettings::default()
    );
    let settings = NotificationSettings {
        push_notifications: true,
        marketing_emails: true,
        ..Default::default()
    };
    assert_eq!(
        manager.update_notification_settings(&settings).await?,
        settings
    );
    assert_eq!(manager.notification_settings().await?, settings);
    Ok(())
}

#[tokio::test]
async fn stats_and_activity() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (manager, _) = session_for(&app);
    let session = manager.register(&alice_credentials()).await?;
    app.seed_events(session.user.unwrap().id, 4);
    manager.login(&alice_login_credentials()).await?;

    assert_eq!(manager.stats().await?.events_created, 4);

    let activity = manager.activity().await?;
    let actions: Vec<_> = activity.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, vec!["login", "register"]);
    Ok(())
}

#[tokio::test]
async fn list_and_revoke_sessions() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_user().await?;
    let (laptop, _) = session_for(&app);
    let (phone, phone_store) = session_for(&app);
    laptop.login(&alice_login_credentials()).await?;
    phone.login(&alice_login_credentials()).await?;

    // Registration opened a session too.
    let sessions = laptop.sessions().await?;
    assert_eq!(sessions.len(), 3);
    assert_eq!(sessions.iter().filter(|s| s.current).count(), 1);

    let phone_session = phone
        .sessions()
        .await?
        .into_iter()
        .find(|s| s.current)
        .unwrap();
    laptop.revoke_session(&phone_session.id).await?;

    assert_eq!(app.backend.session_count("alice@example.com"), 2);
    // The phone still holds its tokens but the server no longer honors them.
    assert!(phone_store.get(client::auth::ACCESS_TOKEN_KEY)?.is_some());
    assert!(phone.refresh().await.is_err());
    Ok(())
}

#[tokio::test]
async fn revoke_all_sessions_signs_out_here_too() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (manager, store) = session_for(&app);
    manager.register(&alice_credentials()).await?;

    manager.revoke_all_sessions().await?;

    assert!(store.is_empty());
    assert_eq!(app.backend.session_count("alice@example.com"), 0);
    Ok(())
}

#[tokio::test]
async fn delete_account() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (manager, store) = session_for(&app);
    manager.register(&alice_credentials()).await?;

    let wrong = manager
        .delete_account(&requests::DeleteAccount {
            password: "not my password".into(),
        })
        .await;
    assert!(wrong.is_err());
    assert!(manager.is_authenticated());

    manager
        .delete_account(&requests::DeleteAccount {
            password: alice_credentials().password,
        })
        .await?;

    assert!(store.is_empty());
    assert!(app.backend.user("alice@example.com").is_none());
    assert!(manager.login(&alice_login_credentials()).await.is_err());
    Ok(())
}
