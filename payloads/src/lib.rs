pub mod api_client;
pub mod requests;
pub mod responses;

pub use api_client::{APIClient, ClientError};

use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Id type wrapper helps ensure we don't mix up ids for different resources.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    Serialize,
    Deserialize,
)]
pub struct UserId(pub Uuid);

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    Serialize,
    Deserialize,
)]
pub struct EventId(pub Uuid);

/// Identifies one of the user's logged-in devices.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    Serialize,
    Deserialize,
)]
pub struct SessionId(pub Uuid);

/// Platform-wide role of a user account.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Organizer,
    Moderator,
    Admin,
}

impl Role {
    /// Moderators and admins can manage any event.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Moderator | Role::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Organizer => "organizer",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
