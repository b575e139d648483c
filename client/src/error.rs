use payloads::ClientError;
use serde::{Deserialize, Serialize};

use crate::auth::SessionError;
use crate::storage::StorageError;

pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Normalized failure stored by the request hooks and shown to users.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error,
)]
#[error("{message}")]
pub struct ErrorInfo {
    pub message: String,
    pub status: Option<u16>,
    pub code: Option<String>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            code: None,
        }
    }

    pub fn unexpected() -> Self {
        Self::new(UNEXPECTED_ERROR_MESSAGE)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl From<String> for ErrorInfo {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ErrorInfo {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<ClientError> for ErrorInfo {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Api {
                status,
                message,
                code,
            } => Self {
                message,
                status: Some(status.as_u16()),
                code,
            },
            ClientError::Network(ref inner) => {
                tracing::debug!("network failure: {inner}");
                Self::new(e.to_string())
            }
            ClientError::Validation(message) => {
                Self::new(message).with_code("VALIDATION_ERROR")
            }
            ClientError::Unexpected(detail) => {
                tracing::debug!("unexpected client failure: {detail}");
                Self::unexpected()
            }
        }
    }
}

impl From<StorageError> for ErrorInfo {
    fn from(e: StorageError) -> Self {
        tracing::debug!("storage failure: {e}");
        Self::unexpected()
    }
}

impl From<SessionError> for ErrorInfo {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Client(e) => e.into(),
            SessionError::NoRefreshToken => {
                Self::new(e.to_string()).with_code("NO_REFRESH_TOKEN")
            }
            SessionError::NotAuthenticated => Self::new(e.to_string())
                .with_status(401)
                .with_code("NOT_AUTHENTICATED"),
            SessionError::Storage(e) => e.into(),
        }
    }
}
