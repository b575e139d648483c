pub mod backend;
pub mod mock;

use actix_web::{dev::ServerHandle, web};
use payloads::{
    APIClient, Role, UserId, requests,
    responses::{AuthResponse, Event},
};
use reqwest::StatusCode;

pub use backend::MockBackend;

pub struct TestApp {
    #[allow(unused)]
    pub port: u16,
    pub client: APIClient,
    pub backend: web::Data<MockBackend>,
    handle: ServerHandle,
}

impl TestApp {
    pub fn address(&self) -> &str {
        &self.client.address
    }

    pub async fn create_alice_user(&self) -> anyhow::Result<AuthResponse> {
        Ok(self.client.register(&alice_credentials()).await?)
    }

    pub async fn create_bob_user(&self) -> anyhow::Result<AuthResponse> {
        Ok(self.client.register(&bob_credentials()).await?)
    }

    /// Register an account and give it `role` directly.
    pub async fn create_user_with_role(
        &self,
        details: &requests::RegisterData,
        role: Role,
    ) -> anyhow::Result<UserId> {
        let response = self.client.register(details).await?;
        self.backend.set_role(&details.email, role);
        Ok(response.user.id)
    }

    /// Add `count` daily events organized by `organizer_id`.
    pub fn seed_events(
        &self,
        organizer_id: UserId,
        count: usize,
    ) -> Vec<Event> {
        let start = "2025-06-01T18:00:00Z".parse().unwrap();
        let events = mock::events(organizer_id, count, start);
        self.backend.add_events(events.clone());
        events
    }

    /// Stop the server. Later requests fail to connect.
    pub async fn stop(&self) {
        self.handle.stop(false).await;
    }
}

/// Start the mock backend on a free port. Installing a log subscriber is
/// left to the caller.
pub async fn spawn_app() -> TestApp {
    let backend = web::Data::new(MockBackend::default());
    let (server, port) = backend::build(backend.clone()).unwrap();
    let handle = server.handle();
    tokio::spawn(server);

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        port,
        client: APIClient {
            address: format!("http://127.0.0.1:{port}"),
            inner_client: client,
        },
        backend,
        handle,
    }
}

pub fn alice_credentials() -> requests::RegisterData {
    requests::RegisterData {
        email: "alice@example.com".into(),
        password: "supersecret".into(),
        first_name: "Alice".into(),
        last_name: "Martin".into(),
        role: Some(Role::Organizer),
    }
}

pub fn alice_login_credentials() -> requests::LoginCredentials {
    to_login_credentials(&alice_credentials())
}

pub fn bob_credentials() -> requests::RegisterData {
    requests::RegisterData {
        email: "bob@example.com".into(),
        password: "bobpassword".into(),
        first_name: "Bob".into(),
        last_name: "Durand".into(),
        role: None,
    }
}

pub fn bob_login_credentials() -> requests::LoginCredentials {
    to_login_credentials(&bob_credentials())
}

pub fn to_login_credentials(
    details: &requests::RegisterData,
) -> requests::LoginCredentials {
    requests::LoginCredentials {
        email: details.email.clone(),
        password: details.password.clone(),
    }
}

pub fn assert_status_code<T>(
    result: Result<T, payloads::ClientError>,
    expected: StatusCode,
) {
    match result {
        Err(payloads::ClientError::Api { status, .. }) => {
            assert_eq!(status, expected)
        }
        Err(e) => panic!("Expected an API error, got {e:?}"),
        Ok(_) => panic!("Expected an API error, got success"),
    };
}
