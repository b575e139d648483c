use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::Role;

pub const EMAIL_MAX_LEN: usize = 255;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const NAME_MAX_LEN: usize = 100;

/// Validation result for account registration details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationValidation {
    Valid,
    MissingEmail,
    InvalidEmail,
    MissingName,
    NameTooLong,
    PasswordTooShort,
    PasswordMismatch,
}

impl RegistrationValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn error_message(&self) -> Option<&'static str> {
        match self {
            Self::Valid => None,
            Self::MissingEmail => Some("Please enter your email"),
            Self::InvalidEmail => Some("Please enter a valid email address"),
            Self::MissingName => {
                Some("Please enter your first and last name")
            }
            Self::NameTooLong => Some("Names must be at most 100 characters"),
            Self::PasswordTooShort => {
                Some("Password must be at least 8 characters")
            }
            Self::PasswordMismatch => Some("Passwords do not match"),
        }
    }
}

/// Basic email shape check. The server does the real validation.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > EMAIL_MAX_LEN {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
        }
        None => false,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

impl LoginCredentials {
    /// Both fields are required before contacting the API.
    pub fn is_complete(&self) -> bool {
        !self.email.trim().is_empty() && !self.password.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterData {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    /// Accounts may ask to be organizers; the server decides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl RegisterData {
    /// Validate the details, comparing the password with its confirmation.
    pub fn validate(&self, confirm_password: &str) -> RegistrationValidation {
        let email = self.email.trim();
        if email.is_empty() {
            return RegistrationValidation::MissingEmail;
        }
        if !is_valid_email(email) {
            return RegistrationValidation::InvalidEmail;
        }
        if self.first_name.trim().is_empty()
            || self.last_name.trim().is_empty()
        {
            return RegistrationValidation::MissingName;
        }
        if self.first_name.len() > NAME_MAX_LEN
            || self.last_name.len() > NAME_MAX_LEN
        {
            return RegistrationValidation::NameTooLong;
        }
        if self.password.len() < PASSWORD_MIN_LEN {
            return RegistrationValidation::PasswordTooShort;
        }
        if self.password != confirm_password {
            return RegistrationValidation::PasswordMismatch;
        }
        RegistrationValidation::Valid
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePassword {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgotPassword {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPassword {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyEmail {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResendVerification {
    pub email: String,
}

/// Avatar image sent inline as base64.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadAvatar {
    pub file_name: String,
    pub content_type: String,
    pub data: String,
}

impl UploadAvatar {
    pub fn from_bytes(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: &[u8],
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

/// Point the avatar at an already-hosted image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAvatar {
    pub avatar_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteAccount {
    pub password: String,
}

/// Page selection for list endpoints. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self { page, limit }
    }
}
