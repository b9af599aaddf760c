use std::fmt;

use crate::identity::{Identity, Role};

/// Canonical key of the room shared by one organizer and one volunteer.
///
/// Built from the ordered pair, so either side derives the same key and two
/// different pairs never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId {
    organizer: String,
    volunteer: String,
}

impl RoomId {
    pub fn new(organizer: impl Into<String>, volunteer: impl Into<String>) -> Self {
        Self { organizer: organizer.into(), volunteer: volunteer.into() }
    }

    /// Room between `identity` and `contact`, from whichever side `identity` is on.
    /// `None` for roles that have no chat contacts.
    pub fn between(identity: &Identity, contact: &str) -> Option<RoomId> {
        match identity.role {
            Role::Organizer => Some(RoomId::new(&identity.id, contact)),
            Role::Volunteer => Some(RoomId::new(contact, &identity.id)),
            Role::User | Role::Admin => None,
        }
    }

    pub fn organizer(&self) -> &str {
        &self.organizer
    }

    pub fn volunteer(&self) -> &str {
        &self.volunteer
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}/{:?}", self.organizer, self.volunteer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: &str, role: Role) -> Identity {
        Identity { id: id.to_owned(), name: id.to_owned(), role, activated: true }
    }

    #[test]
    fn both_sides_derive_the_same_room() {
        let pairs = [("org1", "vol1"), ("a", "bc"), ("", "x"), ("o\0", "v"), ("same", "same")];
        for (org, vol) in pairs {
            let from_organizer = RoomId::between(&identity(org, Role::Organizer), vol).unwrap();
            let from_volunteer = RoomId::between(&identity(vol, Role::Volunteer), org).unwrap();
            assert_eq!(from_organizer, from_volunteer);
            assert_eq!(from_organizer.organizer(), org);
            assert_eq!(from_organizer.volunteer(), vol);
        }
    }

    #[test]
    fn pairs_that_concatenate_alike_stay_distinct() {
        assert_ne!(RoomId::new("ab", "c"), RoomId::new("a", "bc"));
        assert_ne!(RoomId::new("a\0", "b"), RoomId::new("a", "\0b"));
        assert_ne!(RoomId::new("org", "vol").to_string(), RoomId::new("vol", "org").to_string());
    }

    #[test]
    fn non_chat_roles_have_no_room() {
        assert_eq!(RoomId::between(&identity("root", Role::Admin), "vol1"), None);
        assert_eq!(RoomId::between(&identity("u", Role::User), "org1"), None);
    }
}
