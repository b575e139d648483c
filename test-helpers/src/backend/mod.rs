//! In-memory stand-in for the events backend.
//!
//! Serves the `/api/auth/*` and `/api/events` endpoints with the same
//! envelopes as the real server. Everything lives behind one lock, so each
//! request sees a consistent store.

pub mod routes;

use actix_web::{App, HttpServer, dev::Server, web};
use jiff::Timestamp;
use parking_lot::Mutex;
use payloads::{
    Role, SessionId, UserId,
    responses::{ActivityEntry, Event, NotificationSettings, UserRecord},
};
use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

#[derive(Default)]
pub struct MockBackend {
    store: Mutex<Store>,
    fail_logout: AtomicBool,
}

#[derive(Default)]
pub(crate) struct Store {
    accounts: HashMap<UserId, Account>,
    access_tokens: HashMap<String, Grant>,
    refresh_tokens: HashMap<String, Grant>,
    sessions: HashMap<SessionId, SessionRecord>,
    verification_tokens: HashMap<String, UserId>,
    reset_tokens: HashMap<String, UserId>,
    events: Vec<Event>,
}

pub(crate) struct Account {
    user: UserRecord,
    password: String,
    notifications: NotificationSettings,
    activity: Vec<ActivityEntry>,
}

/// Who a token belongs to.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Grant {
    user_id: UserId,
    session_id: SessionId,
}

pub(crate) struct SessionRecord {
    user_id: UserId,
    user_agent: Option<String>,
    created_at: Timestamp,
}

pub(crate) struct IssuedTokens {
    access_token: String,
    refresh_token: String,
}

impl Store {
    fn account_by_email(&self, email: &str) -> Option<&Account> {
        self.accounts
            .values()
            .find(|account| account.user.email.eq_ignore_ascii_case(email))
    }

    fn user_id_by_email(&self, email: &str) -> Option<UserId> {
        self.account_by_email(email).map(|account| account.user.id)
    }

    fn create_account(
        &mut self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
        role: Role,
    ) -> UserRecord {
        let user = UserRecord {
            id: UserId(Uuid::new_v4()),
            email: email.trim().to_string(),
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            role,
            avatar: None,
            email_verified: false,
            bio: None,
            phone: None,
        };
        self.accounts.insert(
            user.id,
            Account {
                user: user.clone(),
                password: password.to_string(),
                notifications: NotificationSettings::default(),
                activity: Vec::new(),
            },
        );
        user
    }

    /// Start a new login session for the user.
    fn issue_tokens(
        &mut self,
        user_id: UserId,
        user_agent: Option<String>,
    ) -> IssuedTokens {
        let session_id = SessionId(Uuid::new_v4());
        self.sessions.insert(
            session_id,
            SessionRecord {
                user_id,
                user_agent,
                created_at: Timestamp::now(),
            },
        );
        self.rotate_tokens(Grant {
            user_id,
            session_id,
        })
    }

    /// Replace the tokens of an existing session.
    fn rotate_tokens(&mut self, grant: Grant) -> IssuedTokens {
        self.access_tokens
            .retain(|_, existing| existing.session_id != grant.session_id);
        self.refresh_tokens
            .retain(|_, existing| existing.session_id != grant.session_id);

        let tokens = IssuedTokens {
            access_token: Uuid::new_v4().to_string(),
            refresh_token: Uuid::new_v4().to_string(),
        };
        self.access_tokens.insert(tokens.access_token.clone(), grant);
        self.refresh_tokens.insert(tokens.refresh_token.clone(), grant);
        tokens
    }

    fn end_session(&mut self, session_id: SessionId) {
        self.sessions.remove(&session_id);
        self.access_tokens
            .retain(|_, grant| grant.session_id != session_id);
        self.refresh_tokens
            .retain(|_, grant| grant.session_id != session_id);
    }

    fn end_all_sessions(&mut self, user_id: UserId) {
        let sessions: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.user_id == user_id)
            .map(|(id, _)| *id)
            .collect();
        for session_id in sessions {
            self.end_session(session_id);
        }
    }

    fn record(&mut self, user_id: UserId, action: &str, description: &str) {
        if let Some(account) = self.accounts.get_mut(&user_id) {
            account.activity.push(ActivityEntry {
                action: action.to_string(),
                description: description.to_string(),
                created_at: Timestamp::now(),
            });
        }
    }
}

/// Test controls and inspection
impl MockBackend {
    /// Make `/auth/logout` answer with a server error.
    pub fn set_fail_logout(&self, fail: bool) {
        self.fail_logout.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn logout_fails(&self) -> bool {
        self.fail_logout.load(Ordering::SeqCst)
    }

    pub(crate) fn store(&self) -> parking_lot::MutexGuard<'_, Store> {
        self.store.lock()
    }

    /// The token that would be emailed to verify this address.
    pub fn verification_token(&self, email: &str) -> Option<String> {
        let store = self.store.lock();
        let user_id = store.user_id_by_email(email)?;
        store
            .verification_tokens
            .iter()
            .find(|(_, owner)| **owner == user_id)
            .map(|(token, _)| token.clone())
    }

    /// The token that would be emailed to reset this account's password.
    pub fn password_reset_token(&self, email: &str) -> Option<String> {
        let store = self.store.lock();
        let user_id = store.user_id_by_email(email)?;
        store
            .reset_tokens
            .iter()
            .find(|(_, owner)| **owner == user_id)
            .map(|(token, _)| token.clone())
    }

    pub fn user(&self, email: &str) -> Option<UserRecord> {
        self.store
            .lock()
            .account_by_email(email)
            .map(|account| account.user.clone())
    }

    pub fn set_role(&self, email: &str, role: Role) {
        let mut store = self.store.lock();
        if let Some(user_id) = store.user_id_by_email(email)
            && let Some(account) = store.accounts.get_mut(&user_id)
        {
            account.user.role = role;
        }
    }

    pub fn is_refresh_token_valid(&self, refresh_token: &str) -> bool {
        self.store.lock().refresh_tokens.contains_key(refresh_token)
    }

    pub fn session_count(&self, email: &str) -> usize {
        let store = self.store.lock();
        let Some(user_id) = store.user_id_by_email(email) else {
            return 0;
        };
        store
            .sessions
            .values()
            .filter(|session| session.user_id == user_id)
            .count()
    }

    pub fn add_events(&self, events: impl IntoIterator<Item = Event>) {
        self.store.lock().events.extend(events);
    }
}

/// Start the mock backend on an OS-assigned port.
pub fn build(
    backend: web::Data<MockBackend>,
) -> std::io::Result<(Server, u16)> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(backend.clone())
            .app_data(web::JsonConfig::default().limit(8 * 1024 * 1024))
            .service(routes::api_services())
    })
    .workers(1)
    .listen(listener)?
    .run();
    Ok((server, port))
}
