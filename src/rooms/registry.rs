use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ChatError;

use super::{
    hook::LifecycleHook,
    msg::{ChatMessage, Outbound, Participant},
    room::Room,
    RoomId,
};

/// Every live room in this process, keyed by canonical room id.
///
/// All mutation happens under one lock and never awaits, so room operations
/// are serialized: a room is never observed empty, and teardown happens once.
#[derive(Clone)]
pub struct RoomRegistry {
    rooms: Arc<Mutex<HashMap<RoomId, Room>>>,
    buffer_capacity: usize,
}

impl RoomRegistry {
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            rooms: Arc::new(Mutex::new(HashMap::new())),
            buffer_capacity,
        }
    }

    /// No-op if the room already exists.
    pub fn create_room(&self, id: &RoomId) {
        let mut rooms = self.rooms.lock();
        if !rooms.contains_key(id) {
            debug!(room = %id, "room created");
            rooms.insert(id.clone(), Room::new(self.buffer_capacity));
        }
    }

    /// Admits `participant` into an existing room. A participant already
    /// present under the same id is replaced.
    pub fn join_user_to_room(&self, id: &RoomId, participant: Participant) -> Result<LifecycleHook, ChatError> {
        let mut rooms = self.rooms.lock();
        let room = rooms.get_mut(id).ok_or_else(|| ChatError::RoomNotFound(id.clone()))?;
        self.admit(room, id, participant)
    }

    /// Creates the room if needed and admits `participant`, in one step.
    pub fn ensure_room_and_join(&self, id: &RoomId, participant: Participant) -> Result<LifecycleHook, ChatError> {
        let mut rooms = self.rooms.lock();
        let room = rooms.entry(id.clone()).or_insert_with(|| {
            debug!(room = %id, "room created");
            Room::new(self.buffer_capacity)
        });

        let admitted = self.admit(room, id, participant);
        if admitted.is_err() && room.participants.is_empty() {
            rooms.remove(id);
        }
        admitted
    }

    fn admit(&self, room: &mut Room, id: &RoomId, participant: Participant) -> Result<LifecycleHook, ChatError> {
        if !participant.connection.is_open() {
            return Err(ChatError::ConnectionClosed);
        }

        let hook = LifecycleHook::new(self.clone(), id.clone(), participant.id.clone(), participant.connection.id());
        debug!(room = %id, participant = %participant.id, conn = %participant.connection.id(), "participant joined");
        room.participants.insert(participant.id.clone(), participant);
        Ok(hook)
    }

    /// Removes a participant; the room goes away with its last participant.
    /// Returns whether the participant was present.
    pub fn remove_user_from_room(&self, id: &RoomId, participant_id: &str) -> bool {
        self.remove_where(id, participant_id, |_| true)
    }

    /// Like [`Self::remove_user_from_room`], but only if the entry still
    /// belongs to `connection_id`; a newer connection for the same identity
    /// is left alone.
    pub(crate) fn evict_connection(&self, id: &RoomId, participant_id: &str, connection_id: Uuid) -> bool {
        self.remove_where(id, participant_id, |p| p.connection.id() == connection_id)
    }

    fn remove_where(&self, id: &RoomId, participant_id: &str, matches: impl Fn(&Participant) -> bool) -> bool {
        let mut rooms = self.rooms.lock();
        let Some(room) = rooms.get_mut(id) else {
            return false;
        };

        let owned = room.participants.get(participant_id).is_some_and(|p| matches(p));
        let removed = owned && room.participants.remove(participant_id).is_some();
        if removed {
            debug!(room = %id, participant = %participant_id, "participant left");
        }

        if room.participants.is_empty() {
            if let Some(room) = rooms.remove(id) {
                room.close_all();
            }
            debug!(room = %id, "room torn down");
        }
        removed
    }

    /// Closes any connection still open in the room, then forgets the room.
    /// Returns whether the room existed.
    pub fn remove_room(&self, id: &RoomId) -> bool {
        let Some(room) = self.rooms.lock().remove(id) else {
            return false;
        };
        room.close_all();
        debug!(room = %id, "room removed");
        true
    }

    /// Records `message` in the room and queues it for everyone but its sender.
    ///
    /// A participant whose queue is full or gone does not hold up the others;
    /// those failures are counted in [`ChatError::DeliveryFailed`].
    pub fn send_message(&self, id: &RoomId, message: &ChatMessage) -> Result<(), ChatError> {
        let mut rooms = self.rooms.lock();
        let room = rooms.get_mut(id).ok_or_else(|| ChatError::RoomNotFound(id.clone()))?;

        room.remember(message.clone());

        let mut failed = 0;
        for participant in room.participants.values() {
            if participant.id == message.sender_id || !participant.connection.is_open() {
                continue;
            }

            match participant.connection.try_deliver(Outbound::Message(message.clone())) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(room = %id, participant = %participant.id, "outbound queue full, message dropped");
                    failed += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    warn!(room = %id, participant = %participant.id, "connection closed during delivery");
                    failed += 1;
                }
            }
        }

        match failed {
            0 => Ok(()),
            failed => Err(ChatError::DeliveryFailed { failed }),
        }
    }

    pub fn contains(&self, id: &RoomId) -> bool {
        self.rooms.lock().contains_key(id)
    }

    pub fn participants(&self, id: &RoomId) -> Vec<Participant> {
        self.rooms
            .lock()
            .get(id)
            .map(|room| room.participants.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn recent_messages(&self, id: &RoomId) -> Vec<ChatMessage> {
        self.rooms
            .lock()
            .get(id)
            .map(|room| room.recent().cloned().collect())
            .unwrap_or_default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.lock().len()
    }
}
