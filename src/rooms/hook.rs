use std::{fmt, sync::atomic::{AtomicBool, Ordering}};

use tracing::{debug, warn};
use uuid::Uuid;

use super::{RoomId, RoomRegistry};

/// Membership cleanup for one admitted participant.
///
/// Whichever of close, error or drop happens first evicts the participant;
/// every later trigger is a no-op.
pub struct LifecycleHook {
    registry: RoomRegistry,
    room: RoomId,
    participant_id: String,
    connection_id: Uuid,
    fired: AtomicBool,
}

impl LifecycleHook {
    pub(crate) fn new(registry: RoomRegistry, room: RoomId, participant_id: String, connection_id: Uuid) -> Self {
        Self {
            registry,
            room,
            participant_id,
            connection_id,
            fired: AtomicBool::new(false),
        }
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    /// Returns whether this call evicted the participant.
    pub fn on_close(&self) -> bool {
        self.fire()
    }

    pub fn on_error(&self, error: &dyn fmt::Display) -> bool {
        warn!(room = %self.room, participant = %self.participant_id, %error, "connection error");
        self.fire()
    }

    /// Drops the hook without evicting anyone.
    pub fn disarm(self) {
        self.fired.store(true, Ordering::SeqCst);
    }

    fn fire(&self) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }

        let evicted = self.registry.evict_connection(&self.room, &self.participant_id, self.connection_id);
        debug!(room = %self.room, participant = %self.participant_id, evicted, "lifecycle hook fired");
        evicted
    }
}

impl Drop for LifecycleHook {
    fn drop(&mut self) {
        self.fire();
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        identity::{Identity, Role},
        rooms::msg::{Connection, Mailbox, Participant},
    };

    use super::*;

    fn join(registry: &RoomRegistry, id: &str) -> (LifecycleHook, Mailbox) {
        let (connection, rx) = Connection::channel(4);
        let identity = Identity { id: id.to_owned(), name: id.to_owned(), role: Role::Volunteer, activated: true };
        let hook = registry
            .ensure_room_and_join(&RoomId::new("org1", "vol1"), Participant::new(&identity, connection))
            .unwrap();
        (hook, rx)
    }

    #[test]
    fn error_then_close_evicts_once() {
        let registry = RoomRegistry::new(4);
        let (hook, _rx) = join(&registry, "vol1");
        let (_other, _other_rx) = join(&registry, "org1");

        assert!(hook.on_error(&"connection reset"));
        assert!(!hook.on_close());
        assert_eq!(registry.participants(hook.room()).len(), 1);
    }

    #[test]
    fn drop_evicts_when_nothing_else_fired() {
        let registry = RoomRegistry::new(4);
        let (hook, _rx) = join(&registry, "vol1");
        let room = hook.room().clone();

        drop(hook);
        assert!(!registry.contains(&room));
    }

    #[test]
    fn disarmed_hook_leaves_membership_alone() {
        let registry = RoomRegistry::new(4);
        let (hook, _rx) = join(&registry, "vol1");
        let room = hook.room().clone();

        hook.disarm();
        assert_eq!(registry.participants(&room).len(), 1);
    }
}
