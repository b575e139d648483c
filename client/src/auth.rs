//! Authentication lifecycle: login, logout, token refresh and the cached
//! user record.
//!
//! The session lives in a [`KeyValueStore`] under three keys. A single
//! [`SessionManager`] owns that store and is shared by reference with
//! whatever needs the session.

use payloads::{
    APIClient, ClientError, Role, SessionId, requests,
    responses::{
        ActiveSession, ActivityEntry, AuthResponse, Event, NotificationSettings,
        Page, SuccessMessage, TokenPair, UserRecord, UserStats,
    },
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::storage::{KeyValueStore, StorageError};

pub const ACCESS_TOKEN_KEY: &str = "auth-token";
pub const REFRESH_TOKEN_KEY: &str = "refresh-token";
pub const USER_KEY: &str = "user";

const SESSION_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY];

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("No refresh token available")]
    NoRefreshToken,
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("Failed to persist session")]
    Storage(#[from] StorageError),
}

/// The authenticated identity held by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user: Option<UserRecord>,
}

pub struct SessionManager {
    client: APIClient,
    store: Arc<dyn KeyValueStore>,
    /// Serializes refreshes so each one exchanges the newest refresh token.
    refresh_lock: tokio::sync::Mutex<()>,
}

/// Session lifecycle
impl SessionManager {
    pub fn new(client: APIClient, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            client,
            store,
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn client(&self) -> &APIClient {
        &self.client
    }

    #[tracing::instrument(
        skip(self, credentials),
        fields(email = %credentials.email, user_id = tracing::field::Empty)
    )]
    pub async fn login(
        &self,
        credentials: &requests::LoginCredentials,
    ) -> Result<Session, SessionError> {
        let response = self.client.login(credentials).await?;
        tracing::Span::current()
            .record("user_id", tracing::field::display(&response.user.id));
        let session = self.persist_auth(response)?;
        tracing::info!("logged in");
        Ok(session)
    }

    #[tracing::instrument(
        skip(self, details),
        fields(email = %details.email, user_id = tracing::field::Empty)
    )]
    pub async fn register(
        &self,
        details: &requests::RegisterData,
    ) -> Result<Session, SessionError> {
        let response = self.client.register(details).await?;
        tracing::Span::current()
            .record("user_id", tracing::field::display(&response.user.id));
        let session = self.persist_auth(response)?;
        tracing::info!("registered");
        Ok(session)
    }

    /// Tell the server to drop the refresh token, then clear the local
    /// session whether or not the server could be reached.
    ///
    /// Only a failure to clear local storage is reported: tokens left behind
    /// would bring the session back on the next start.
    #[tracing::instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), SessionError> {
        let refresh_token = self.read(REFRESH_TOKEN_KEY).unwrap_or_else(|e| {
            tracing::warn!("could not read refresh token: {e}");
            None
        });
        if let Some(refresh_token) = refresh_token {
            let access_token = self.access_token();
            let details = requests::RefreshToken { refresh_token };
            if let Err(e) = self
                .client
                .logout(&details, access_token.as_deref())
                .await
            {
                tracing::warn!("server-side logout failed: {e}");
            }
        }
        self.clear_session()?;
        tracing::info!("logged out");
        Ok(())
    }

    /// Exchange the stored refresh token for a new token pair.
    ///
    /// Concurrent calls run one after another. If the session was cleared or
    /// replaced while the exchange was in flight, the new pair is returned
    /// but not stored.
    #[tracing::instrument(skip(self))]
    pub async fn refresh(&self) -> Result<TokenPair, SessionError> {
        let _guard = self.refresh_lock.lock().await;

        let refresh_token = self
            .read(REFRESH_TOKEN_KEY)?
            .filter(|token| !token.is_empty())
            .ok_or(SessionError::NoRefreshToken)?;
        let details = requests::RefreshToken {
            refresh_token: refresh_token.clone(),
        };
        let pair = self.client.refresh(&details).await?;

        if self.read(REFRESH_TOKEN_KEY)?.as_deref() != Some(&refresh_token) {
            tracing::warn!(
                "session changed during refresh; not storing tokens"
            );
            return Ok(pair);
        }
        self.store.set_many(&[
            (ACCESS_TOKEN_KEY, pair.access_token.clone()),
            (REFRESH_TOKEN_KEY, pair.refresh_token.clone()),
        ])?;
        tracing::debug!("tokens refreshed");
        Ok(pair)
    }

    /// Remove all session keys in one step.
    pub fn clear_session(&self) -> Result<(), StorageError> {
        self.store.remove_many(&SESSION_KEYS)
    }

    fn persist_auth(
        &self,
        response: AuthResponse,
    ) -> Result<Session, SessionError> {
        let user = serde_json::to_string(&response.user)
            .map_err(StorageError::from)?;
        self.store.set_many(&[
            (ACCESS_TOKEN_KEY, response.access_token.clone()),
            (REFRESH_TOKEN_KEY, response.refresh_token.clone()),
            (USER_KEY, user),
        ])?;
        Ok(Session {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            user: Some(response.user),
        })
    }

    fn cache_user(&self, user: &UserRecord) -> Result<(), SessionError> {
        let user = serde_json::to_string(user).map_err(StorageError::from)?;
        self.store.set(USER_KEY, user)?;
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.store.get(key)
    }

    /// The access token to attach to an authenticated request.
    fn bearer(&self) -> Result<String, SessionError> {
        self.read(ACCESS_TOKEN_KEY)?
            .filter(|token| !token.is_empty())
            .ok_or(SessionError::NotAuthenticated)
    }
}

/// Reads of the cached session. None of these touch the network.
impl SessionManager {
    pub fn access_token(&self) -> Option<String> {
        match self.read(ACCESS_TOKEN_KEY) {
            Ok(token) => token.filter(|token| !token.is_empty()),
            Err(e) => {
                tracing::warn!("could not read access token: {e}");
                None
            }
        }
    }

    /// True when an access token is stored. Expiry isn't checked; an expired
    /// token shows up as a failed request.
    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    pub fn current_user(&self) -> Option<UserRecord> {
        let raw = match self.read(USER_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("could not read cached user: {e}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!("cached user is malformed: {e}");
                None
            }
        }
    }

    pub fn session(&self) -> Option<Session> {
        let access_token = self.access_token()?;
        let refresh_token = match self.read(REFRESH_TOKEN_KEY) {
            Ok(token) => token?,
            Err(e) => {
                tracing::warn!("could not read refresh token: {e}");
                return None;
            }
        };
        Some(Session {
            access_token,
            refresh_token,
            user: self.current_user(),
        })
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.current_user().is_some_and(|user| user.role == role)
    }

    /// Organizers manage their own events; moderators and admins manage all.
    pub fn can_manage_event(&self, event: &Event) -> bool {
        self.current_user().is_some_and(|user| {
            user.id == event.organizer_id || user.role.is_elevated()
        })
    }
}

/// Profile and avatar mutations. The cached user only changes once the
/// server has accepted the change.
impl SessionManager {
    /// Fetch the profile from the server and refresh the cached copy.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_profile(&self) -> Result<UserRecord, SessionError> {
        let token = self.bearer()?;
        let user = self.client.profile(&token).await?;
        self.cache_user(&user)?;
        Ok(user)
    }

    #[tracing::instrument(skip(self, details))]
    pub async fn update_profile(
        &self,
        details: &requests::UpdateProfile,
    ) -> Result<UserRecord, SessionError> {
        let token = self.bearer()?;
        let user = self.client.update_profile(details, &token).await?;
        self.cache_user(&user)?;
        Ok(user)
    }

    #[tracing::instrument(
        skip(self, details),
        fields(file_name = %details.file_name)
    )]
    pub async fn upload_avatar(
        &self,
        details: &requests::UploadAvatar,
    ) -> Result<UserRecord, SessionError> {
        let token = self.bearer()?;
        let user = self.client.upload_avatar(details, &token).await?;
        self.cache_user(&user)?;
        Ok(user)
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_avatar(
        &self,
        avatar_url: &str,
    ) -> Result<UserRecord, SessionError> {
        let token = self.bearer()?;
        let details = requests::UpdateAvatar {
            avatar_url: avatar_url.to_string(),
        };
        let user = self.client.update_avatar(&details, &token).await?;
        self.cache_user(&user)?;
        Ok(user)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_avatar(&self) -> Result<UserRecord, SessionError> {
        let token = self.bearer()?;
        let user = self.client.delete_avatar(&token).await?;
        self.cache_user(&user)?;
        Ok(user)
    }

    /// Delete the account and drop the local session.
    #[tracing::instrument(skip(self, details))]
    pub async fn delete_account(
        &self,
        details: &requests::DeleteAccount,
    ) -> Result<(), SessionError> {
        let token = self.bearer()?;
        self.client.delete_account(details, &token).await?;
        self.clear_session()?;
        tracing::info!("account deleted");
        Ok(())
    }

    pub async fn change_password(
        &self,
        details: &requests::ChangePassword,
    ) -> Result<SuccessMessage, SessionError> {
        let token = self.bearer()?;
        Ok(self.client.change_password(details, &token).await?)
    }

    /// Marks the cached user verified once the server accepts the token.
    pub async fn verify_email(
        &self,
        details: &requests::VerifyEmail,
    ) -> Result<SuccessMessage, SessionError> {
        let message = self.client.verify_email(details).await?;
        if let Some(mut user) = self.current_user() {
            user.email_verified = true;
            self.cache_user(&user)?;
        }
        Ok(message)
    }
}

/// Account endpoints that don't touch the cached session.
impl SessionManager {
    pub async fn forgot_password(
        &self,
        details: &requests::ForgotPassword,
    ) -> Result<SuccessMessage, SessionError> {
        Ok(self.client.forgot_password(details).await?)
    }

    pub async fn reset_password(
        &self,
        details: &requests::ResetPassword,
    ) -> Result<SuccessMessage, SessionError> {
        Ok(self.client.reset_password(details).await?)
    }

    pub async fn resend_verification(
        &self,
        details: &requests::ResendVerification,
    ) -> Result<SuccessMessage, SessionError> {
        Ok(self.client.resend_verification(details).await?)
    }

    pub async fn stats(&self) -> Result<UserStats, SessionError> {
        let token = self.bearer()?;
        Ok(self.client.stats(&token).await?)
    }

    pub async fn notification_settings(
        &self,
    ) -> Result<NotificationSettings, SessionError> {
        let token = self.bearer()?;
        Ok(self.client.notification_settings(&token).await?)
    }

    pub async fn update_notification_settings(
        &self,
        settings: &NotificationSettings,
    ) -> Result<NotificationSettings, SessionError> {
        let token = self.bearer()?;
        Ok(self
            .client
            .update_notification_settings(settings, &token)
            .await?)
    }

    pub async fn activity(&self) -> Result<Vec<ActivityEntry>, SessionError> {
        let token = self.bearer()?;
        Ok(self.client.activity(&token).await?)
    }

    pub async fn sessions(&self) -> Result<Vec<ActiveSession>, SessionError> {
        let token = self.bearer()?;
        Ok(self.client.sessions(&token).await?)
    }

    pub async fn revoke_session(
        &self,
        session_id: &SessionId,
    ) -> Result<(), SessionError> {
        let token = self.bearer()?;
        Ok(self.client.revoke_session(session_id, &token).await?)
    }

    /// Sign out everywhere, this client included.
    #[tracing::instrument(skip(self))]
    pub async fn revoke_all_sessions(&self) -> Result<(), SessionError> {
        let token = self.bearer()?;
        self.client.revoke_all_sessions(&token).await?;
        self.clear_session()?;
        Ok(())
    }

    /// Browse events. The token is attached when there is one.
    pub async fn list_events(
        &self,
        page: &requests::PageRequest,
    ) -> Result<Page<Event>, SessionError> {
        let token = self.access_token();
        Ok(self.client.list_events(page, token.as_deref()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use payloads::{EventId, UserId};
    use uuid::Uuid;

    fn manager_with_user(user: Option<&UserRecord>) -> SessionManager {
        let store = Arc::new(MemoryStore::new());
        if let Some(user) = user {
            store
                .set_many(&[
                    (ACCESS_TOKEN_KEY, "access".into()),
                    (REFRESH_TOKEN_KEY, "refresh".into()),
                    (USER_KEY, serde_json::to_string(user).unwrap()),
                ])
                .unwrap();
        }
        let client = APIClient {
            address: "http://127.0.0.1:9".into(),
            inner_client: reqwest::Client::new(),
        };
        SessionManager::new(client, store)
    }

    fn user(role: Role) -> UserRecord {
        UserRecord {
            id: UserId(Uuid::new_v4()),
            email: "alice@example.com".into(),
            first_name: "Alice".into(),
            last_name: "Martin".into(),
            role,
            avatar: None,
            email_verified: true,
            bio: None,
            phone: None,
        }
    }

    fn event_by(organizer_id: UserId) -> Event {
        Event {
            id: EventId(Uuid::new_v4()),
            title: "Meetup".into(),
            description: None,
            location: None,
            starts_at: "2025-06-01T18:00:00Z".parse().unwrap(),
            organizer_id,
            capacity: None,
        }
    }

    #[test]
    fn anonymous_reads() {
        let manager = manager_with_user(None);
        assert!(!manager.is_authenticated());
        assert_eq!(manager.current_user(), None);
        assert_eq!(manager.session(), None);
        assert!(!manager.has_role(Role::User));
        assert!(!manager.can_manage_event(&event_by(UserId(Uuid::new_v4()))));
    }

    #[test]
    fn organizer_manages_own_events_only() {
        let organizer = user(Role::Organizer);
        let manager = manager_with_user(Some(&organizer));
        assert!(manager.is_authenticated());
        assert!(manager.has_role(Role::Organizer));
        assert!(!manager.has_role(Role::Admin));
        assert!(manager.can_manage_event(&event_by(organizer.id)));
        assert!(!manager.can_manage_event(&event_by(UserId(Uuid::new_v4()))));
    }

    #[test]
    fn elevated_roles_manage_everything() {
        for role in [Role::Admin, Role::Moderator] {
            let manager = manager_with_user(Some(&user(role)));
            assert!(
                manager.can_manage_event(&event_by(UserId(Uuid::new_v4())))
            );
        }
    }

    #[tokio::test]
    async fn refresh_without_token() {
        let manager = manager_with_user(None);
        assert!(matches!(
            manager.refresh().await,
            Err(SessionError::NoRefreshToken)
        ));
    }

    #[tokio::test]
    async fn authenticated_calls_need_a_token() {
        let manager = manager_with_user(None);
        assert!(matches!(
            manager.update_profile(&Default::default()).await,
            Err(SessionError::NotAuthenticated)
        ));
        assert!(matches!(
            manager.stats().await,
            Err(SessionError::NotAuthenticated)
        ));
    }

    /// A store whose refresh token can't be read back.
    struct UnreadableRefreshToken(MemoryStore);

    impl KeyValueStore for UnreadableRefreshToken {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            if key == REFRESH_TOKEN_KEY {
                return Err(StorageError::Io {
                    path: "session.json".into(),
                    source: std::io::ErrorKind::PermissionDenied.into(),
                });
            }
            self.0.get(key)
        }

        fn set_many(
            &self,
            entries: &[(&str, String)],
        ) -> Result<(), StorageError> {
            self.0.set_many(entries)
        }

        fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError> {
            self.0.remove_many(keys)
        }
    }

    #[tokio::test]
    async fn unreadable_refresh_token() {
        let store = UnreadableRefreshToken(MemoryStore::new());
        store
            .set_many(&[
                (ACCESS_TOKEN_KEY, "access".into()),
                (REFRESH_TOKEN_KEY, "refresh".into()),
            ])
            .unwrap();
        let manager = SessionManager::new(
            manager_with_user(None).client().clone(),
            Arc::new(store),
        );

        assert!(manager.is_authenticated());
        assert_eq!(manager.session(), None);
        assert!(matches!(
            manager.refresh().await,
            Err(SessionError::Storage(_))
        ));
    }

    #[test]
    fn clear_session_removes_all_keys() {
        let manager = manager_with_user(Some(&user(Role::User)));
        manager.clear_session().unwrap();
        assert!(!manager.is_authenticated());
        assert_eq!(manager.current_user(), None);
    }
}
