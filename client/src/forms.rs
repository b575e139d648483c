use payloads::requests::{LoginCredentials, RegisterData};
use std::sync::Arc;

use crate::auth::{Session, SessionManager};
use crate::contexts::toast::ToastDispatcher;
use crate::error::ErrorInfo;
use crate::hooks::{RequestHook, RequestOptions};

pub const LOGIN_SUCCESS_MESSAGE: &str = "Connexion réussie";
pub const REGISTER_SUCCESS_MESSAGE: &str = "Account created";
pub const MISSING_FIELDS_MESSAGE: &str = "Please fill in all fields";
pub const VALIDATION_TOAST_TITLE: &str = "Validation";
pub const VALIDATION_ERROR_CODE: &str = "VALIDATION_ERROR";

/// Login and registration forms. Input is checked locally before anything
/// is sent; rejected input gets a warning toast and never reaches the API.
#[derive(Clone)]
pub struct AuthForm {
    toasts: ToastDispatcher,
    login: RequestHook<LoginCredentials, Session>,
    register: RequestHook<RegisterData, Session>,
}

impl AuthForm {
    pub fn new(session: Arc<SessionManager>, toasts: ToastDispatcher) -> Self {
        let login = RequestHook::new(
            toasts.clone(),
            RequestOptions::default().success_toast(LOGIN_SUCCESS_MESSAGE),
            {
                let session = session.clone();
                move |credentials: LoginCredentials| {
                    let session = session.clone();
                    async move { session.login(&credentials).await }
                }
            },
        );
        let register = RequestHook::new(
            toasts.clone(),
            RequestOptions::default().success_toast(REGISTER_SUCCESS_MESSAGE),
            move |details: RegisterData| {
                let session = session.clone();
                async move { session.register(&details).await }
            },
        );
        Self {
            toasts,
            login,
            register,
        }
    }

    pub async fn submit_login(
        &self,
        credentials: LoginCredentials,
    ) -> Result<Session, ErrorInfo> {
        if !credentials.is_complete() {
            return Err(self.reject(MISSING_FIELDS_MESSAGE));
        }
        self.login.execute(credentials).await
    }

    pub async fn submit_register(
        &self,
        details: RegisterData,
        confirm_password: &str,
    ) -> Result<Session, ErrorInfo> {
        if let Some(message) =
            details.validate(confirm_password).error_message()
        {
            return Err(self.reject(message));
        }
        self.register.execute(details).await
    }

    pub fn login_hook(&self) -> &RequestHook<LoginCredentials, Session> {
        &self.login
    }

    pub fn register_hook(&self) -> &RequestHook<RegisterData, Session> {
        &self.register
    }

    fn reject(&self, message: &str) -> ErrorInfo {
        tracing::debug!(reason = message, "form input rejected");
        self.toasts.warning(VALIDATION_TOAST_TITLE, message);
        ErrorInfo::new(message).with_code(VALIDATION_ERROR_CODE)
    }
}
