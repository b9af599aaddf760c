mod gatekeeper;
mod sessions;

use std::fmt;

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

pub use gatekeeper::Gatekeeper;
pub use sessions::{session_token, SqliteSessions};

/// Account kind, stored as `user.actor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Volunteer,
    Organizer,
    Admin,
}

impl Role {
    /// Unknown or missing actors fall back to a plain user.
    pub fn from_actor(actor: &str) -> Role {
        use Role::*;
        match actor {
            "volunteer" => Volunteer,
            "organizer" => Organizer,
            "admin" => Admin,
            _ => User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        use Role::*;
        match self {
            User => "user",
            Volunteer => "volunteer",
            Organizer => "organizer",
            Admin => "admin",
        }
    }

    pub fn can_chat(&self) -> bool {
        matches!(self, Role::Volunteer | Role::Organizer)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The account behind an authenticated connection or request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub activated: bool,
}

/// Resolves the identity a request carries, if any.
///
/// `Ok(None)` means no usable session; `Err` means the lookup itself failed.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> anyhow::Result<Option<Identity>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_actor_is_plain_user() {
        assert_eq!(Role::from_actor("organizer"), Role::Organizer);
        assert_eq!(Role::from_actor("volunteer"), Role::Volunteer);
        assert_eq!(Role::from_actor("admin"), Role::Admin);
        assert_eq!(Role::from_actor(""), Role::User);
        assert_eq!(Role::from_actor("superuser"), Role::User);
    }

    #[test]
    fn only_volunteers_and_organizers_chat() {
        assert!(Role::Volunteer.can_chat());
        assert!(Role::Organizer.can_chat());
        assert!(!Role::Admin.can_chat());
        assert!(!Role::User.can_chat());
    }
}
