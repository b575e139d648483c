use crate::{
    SessionId, requests,
    responses::{self, Envelope},
};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

type ReqwestResult = Result<reqwest::Response, reqwest::Error>;

/// An API client for interfacing with the backend.
///
/// Authenticated endpoints take the bearer token explicitly; the session
/// layer decides which token to attach.
#[derive(Clone)]
pub struct APIClient {
    pub address: String,
    pub inner_client: reqwest::Client,
}

/// Helper methods for http actions
impl APIClient {
    fn format_url(&self, path: &str) -> String {
        format!("{}/api/{path}", &self.address)
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let request = self.inner_client.request(method, self.format_url(path));
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&(impl Serialize + ?Sized)>,
    ) -> ReqwestResult {
        let request = self.request(method.clone(), path, token);
        let request = match body {
            Some(body) => request.json(body),
            None => request,
        };
        tracing::debug!(%method, path, "sending request");
        request.send().await
    }

    async fn post(
        &self,
        path: &str,
        token: Option<&str>,
        body: &impl Serialize,
    ) -> ReqwestResult {
        self.send(Method::POST, path, token, Some(body)).await
    }

    async fn put(
        &self,
        path: &str,
        token: &str,
        body: &impl Serialize,
    ) -> ReqwestResult {
        self.send(Method::PUT, path, Some(token), Some(body)).await
    }

    async fn empty_post(&self, path: &str, token: &str) -> ReqwestResult {
        self.send(Method::POST, path, Some(token), None::<&()>).await
    }

    async fn empty_get(&self, path: &str, token: &str) -> ReqwestResult {
        self.send(Method::GET, path, Some(token), None::<&()>).await
    }

    async fn empty_delete(&self, path: &str, token: &str) -> ReqwestResult {
        self.send(Method::DELETE, path, Some(token), None::<&()>).await
    }
}

/// Methods on the backend API
impl APIClient {
    pub async fn login(
        &self,
        details: &requests::LoginCredentials,
    ) -> Result<responses::AuthResponse, ClientError> {
        let response = self.post("auth/login", None, details).await?;
        ok_body(response).await
    }

    pub async fn register(
        &self,
        details: &requests::RegisterData,
    ) -> Result<responses::AuthResponse, ClientError> {
        let response = self.post("auth/register", None, details).await?;
        ok_body(response).await
    }

    /// Invalidate the given refresh token server-side.
    pub async fn logout(
        &self,
        details: &requests::RefreshToken,
        token: Option<&str>,
    ) -> Result<(), ClientError> {
        let response = self.post("auth/logout", token, details).await?;
        ok_empty(response).await
    }

    /// Exchange a refresh token for a new token pair.
    pub async fn refresh(
        &self,
        details: &requests::RefreshToken,
    ) -> Result<responses::TokenPair, ClientError> {
        let response = self.post("auth/refresh", None, details).await?;
        ok_body(response).await
    }

    /// Get the current user's profile information.
    pub async fn profile(
        &self,
        token: &str,
    ) -> Result<responses::UserRecord, ClientError> {
        let response = self.empty_get("auth/profile", token).await?;
        ok_body(response).await
    }

    pub async fn update_profile(
        &self,
        details: &requests::UpdateProfile,
        token: &str,
    ) -> Result<responses::UserRecord, ClientError> {
        let response = self.put("auth/profile", token, details).await?;
        ok_body(response).await
    }

    pub async fn change_password(
        &self,
        details: &requests::ChangePassword,
        token: &str,
    ) -> Result<responses::SuccessMessage, ClientError> {
        let response =
            self.post("auth/change-password", Some(token), details).await?;
        ok_body(response).await
    }

    /// Request a password reset email for the given email address.
    pub async fn forgot_password(
        &self,
        details: &requests::ForgotPassword,
    ) -> Result<responses::SuccessMessage, ClientError> {
        let response = self.post("auth/forgot-password", None, details).await?;
        ok_body(response).await
    }

    /// Reset password using a token from the password reset email.
    pub async fn reset_password(
        &self,
        details: &requests::ResetPassword,
    ) -> Result<responses::SuccessMessage, ClientError> {
        let response = self.post("auth/reset-password", None, details).await?;
        ok_body(response).await
    }

    /// Verify email address using a token from the verification email.
    pub async fn verify_email(
        &self,
        details: &requests::VerifyEmail,
    ) -> Result<responses::SuccessMessage, ClientError> {
        let response = self.post("auth/verify-email", None, details).await?;
        ok_body(response).await
    }

    pub async fn resend_verification(
        &self,
        details: &requests::ResendVerification,
    ) -> Result<responses::SuccessMessage, ClientError> {
        let response =
            self.post("auth/resend-verification", None, details).await?;
        ok_body(response).await
    }

    pub async fn upload_avatar(
        &self,
        details: &requests::UploadAvatar,
        token: &str,
    ) -> Result<responses::UserRecord, ClientError> {
        let response =
            self.post("auth/upload-avatar", Some(token), details).await?;
        ok_body(response).await
    }

    pub async fn update_avatar(
        &self,
        details: &requests::UpdateAvatar,
        token: &str,
    ) -> Result<responses::UserRecord, ClientError> {
        let response = self.post("auth/avatar", Some(token), details).await?;
        ok_body(response).await
    }

    pub async fn delete_avatar(
        &self,
        token: &str,
    ) -> Result<responses::UserRecord, ClientError> {
        let response = self.empty_delete("auth/avatar", token).await?;
        ok_body(response).await
    }

    pub async fn stats(
        &self,
        token: &str,
    ) -> Result<responses::UserStats, ClientError> {
        let response = self.empty_get("auth/stats", token).await?;
        ok_body(response).await
    }

    pub async fn notification_settings(
        &self,
        token: &str,
    ) -> Result<responses::NotificationSettings, ClientError> {
        let response =
            self.empty_get("auth/notification-settings", token).await?;
        ok_body(response).await
    }

    pub async fn update_notification_settings(
        &self,
        details: &responses::NotificationSettings,
        token: &str,
    ) -> Result<responses::NotificationSettings, ClientError> {
        let response =
            self.put("auth/notification-settings", token, details).await?;
        ok_body(response).await
    }

    /// Delete the current user's account.
    pub async fn delete_account(
        &self,
        details: &requests::DeleteAccount,
        token: &str,
    ) -> Result<(), ClientError> {
        let response = self
            .send(Method::DELETE, "auth/account", Some(token), Some(details))
            .await?;
        ok_empty(response).await
    }

    pub async fn activity(
        &self,
        token: &str,
    ) -> Result<Vec<responses::ActivityEntry>, ClientError> {
        let response = self.empty_get("auth/activity", token).await?;
        ok_body(response).await
    }

    pub async fn sessions(
        &self,
        token: &str,
    ) -> Result<Vec<responses::ActiveSession>, ClientError> {
        let response = self.empty_get("auth/sessions", token).await?;
        ok_body(response).await
    }

    pub async fn revoke_session(
        &self,
        session_id: &SessionId,
        token: &str,
    ) -> Result<(), ClientError> {
        let response = self
            .empty_delete(&format!("auth/sessions/{session_id}"), token)
            .await?;
        ok_empty(response).await
    }

    pub async fn revoke_all_sessions(
        &self,
        token: &str,
    ) -> Result<(), ClientError> {
        let response =
            self.empty_post("auth/revoke-all-sessions", token).await?;
        ok_empty(response).await
    }

    /// List published events, one page at a time.
    pub async fn list_events(
        &self,
        page: &requests::PageRequest,
        token: Option<&str>,
    ) -> Result<responses::Page<responses::Event>, ClientError> {
        let response = self
            .request(Method::GET, "events", token)
            .query(page)
            .send()
            .await?;
        ok_body(response).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server answered with a failure envelope or a non-2xx status.
    #[error("{message}")]
    Api {
        status: StatusCode,
        message: String,
        code: Option<String>,
    },
    #[error("Network error. Please check your connection.")]
    Network(#[from] reqwest::Error),
    /// Input rejected before any request was sent.
    #[error("{0}")]
    Validation(String),
    /// The response could not be understood.
    #[error("Unexpected response: {0}")]
    Unexpected(String),
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Network(e) => e.status(),
            Self::Validation(_) | Self::Unexpected(_) => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}

/// Build the error for a failed response, preferring the envelope's message.
async fn api_error(response: reqwest::Response) -> ClientError {
    let status = response.status();
    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => return e.into(),
    };
    match serde_json::from_str::<Envelope<serde_json::Value>>(&text) {
        Ok(envelope) => ClientError::Api {
            status,
            message: envelope.error.unwrap_or_else(|| fallback_message(status)),
            code: envelope.code,
        },
        Err(_) if text.trim().is_empty() => ClientError::Api {
            status,
            message: fallback_message(status),
            code: None,
        },
        Err(_) => ClientError::Api {
            status,
            message: text,
            code: None,
        },
    }
}

fn fallback_message(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("Request failed")
        .to_string()
}

/// Parse the envelope of a 2xx response, turning `success: false` into an
/// API error.
async fn ok_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<Envelope<T>, ClientError> {
    if !response.status().is_success() {
        return Err(api_error(response).await);
    }
    let status = response.status();
    let text = response.text().await?;
    let envelope: Envelope<T> = serde_json::from_str(&text)
        .map_err(|e| ClientError::Unexpected(e.to_string()))?;
    if !envelope.success {
        return Err(ClientError::Api {
            status,
            message: envelope
                .error
                .unwrap_or_else(|| "Request failed".to_string()),
            code: envelope.code,
        });
    }
    Ok(envelope)
}

/// Deserialize a successful request into the desired type, or return an
/// appropriate error.
pub async fn ok_body<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    ok_envelope::<T>(response).await?.data.ok_or_else(|| {
        ClientError::Unexpected("response envelope has no data".to_string())
    })
}

/// Check that an empty response is OK, returning a ClientError if not.
pub async fn ok_empty(response: reqwest::Response) -> Result<(), ClientError> {
    ok_envelope::<serde_json::Value>(response).await?;
    Ok(())
}
