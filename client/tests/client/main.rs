mod account;
mod events;
mod forms;
mod session;

use client::SessionManager;
use client::storage::MemoryStore;
use client::telemetry::{get_subscriber, init_subscriber};
use std::sync::{Arc, Once};
use test_helpers::TestApp;

static TRACING: Once = Once::new();

/// Start a backend for one test. The first call also installs the global
/// log subscriber.
pub async fn spawn_app() -> TestApp {
    TRACING.call_once(|| {
        if let Err(e) = init_subscriber(get_subscriber("error".into())) {
            eprintln!("logs not initialized: {e:#}");
        }
    });
    test_helpers::spawn_app().await
}

/// A session manager talking to `app`, with its memory store.
pub fn session_for(app: &TestApp) -> (SessionManager, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (SessionManager::new(app.client.clone(), store.clone()), store)
}

#[tokio::test]
async fn health_check() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let response = app
        .client
        .inner_client
        .get(format!("{}/api/health_check", app.address()))
        .send()
        .await?;
    assert!(response.status().is_success());
    Ok(())
}
