use client::guard::{Access, GuardDecision, check_access};
use client::{
    PaginatedHook, RequestHook, RequestOptions, ToastDispatcher, ToastKind,
};
use payloads::{Role, requests};
use std::sync::Arc;
use test_helpers::{alice_credentials, bob_credentials, bob_login_credentials};

use crate::{session_for, spawn_app};

#[tokio::test]
async fn browse_events_page_by_page() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let organizer = app.create_alice_user().await?.user.id;
    let events = app.seed_events(organizer, 25);
    let (manager, _) = session_for(&app);
    let manager = Arc::new(manager);

    let hook = PaginatedHook::new(
        ToastDispatcher::new(),
        RequestOptions::default(),
        10,
        move |page: requests::PageRequest| {
            let manager = manager.clone();
            async move { manager.list_events(&page).await }
        },
    );

    let first = hook.load_page(1).await?;
    assert_eq!(first, events[..10].to_vec());
    let pagination = hook.pagination();
    assert_eq!(pagination.total, 25);
    assert_eq!(pagination.total_pages, 3);

    let second = hook.next_page().await?.unwrap();
    assert_eq!(second, events[10..20].to_vec());

    // Out of range: nothing changes.
    assert_eq!(hook.go_to_page(5).await?, Some(second));
    assert_eq!(hook.current_page(), 2);

    let last = hook.go_to_page(3).await?.unwrap();
    assert_eq!(last.len(), 5);
    assert_eq!(hook.next_page().await?, Some(last));
    assert!(!hook.pagination().has_next());
    Ok(())
}

#[tokio::test]
async fn failed_request_is_normalized_and_toasted() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_user().await?;
    let (manager, _) = session_for(&app);
    let manager = Arc::new(manager);
    let toasts = ToastDispatcher::new();

    let hook = RequestHook::new(
        toasts.clone(),
        RequestOptions::default(),
        move |credentials: requests::LoginCredentials| {
            let manager = manager.clone();
            async move { manager.login(&credentials).await }
        },
    );

    let error = hook
        .execute(requests::LoginCredentials {
            email: "alice@example.com".into(),
            password: "wrong password".into(),
        })
        .await
        .unwrap_err();

    assert_eq!(error.message, "Invalid email or password");
    assert_eq!(error.status, Some(401));
    assert_eq!(error.code.as_deref(), Some("UNAUTHORIZED"));

    let state = hook.state();
    assert!(!state.loading);
    assert_eq!(state.data, None);
    assert_eq!(state.error, Some(error.clone()));

    let shown = toasts.toasts();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].kind, ToastKind::Error);
    assert_eq!(shown[0].message.as_deref(), Some(error.message.as_str()));
    Ok(())
}

#[tokio::test]
async fn event_management_rights() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (alice, _) = session_for(&app);
    let alice_id = alice.register(&alice_credentials()).await?.user.unwrap().id;
    let event = app.seed_events(alice_id, 1).remove(0);

    let (bob, _) = session_for(&app);
    bob.register(&bob_credentials()).await?;

    assert!(alice.can_manage_event(&event));
    assert!(alice.has_role(Role::Organizer));
    assert!(!bob.can_manage_event(&event));

    // Roles are read from the cached user, so the promotion shows up after
    // the next login.
    app.backend.set_role("bob@example.com", Role::Moderator);
    assert!(!bob.can_manage_event(&event));
    bob.login(&bob_login_credentials()).await?;
    assert!(bob.can_manage_event(&event));
    assert_eq!(check_access(&bob, Access::Elevated), GuardDecision::Allow);
    Ok(())
}

#[tokio::test]
async fn guard_follows_session() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (manager, _) = session_for(&app);

    assert_eq!(
        check_access(&manager, Access::Authenticated),
        GuardDecision::RedirectToLogin
    );

    manager.register(&bob_credentials()).await?;
    assert_eq!(
        check_access(&manager, Access::GuestOnly),
        GuardDecision::RedirectHome
    );
    assert_eq!(
        check_access(&manager, Access::Role(Role::Organizer)),
        GuardDecision::Forbidden
    );

    manager.logout().await?;
    assert_eq!(
        check_access(&manager, Access::GuestOnly),
        GuardDecision::Allow
    );
    Ok(())
}
