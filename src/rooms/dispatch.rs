use std::{collections::HashMap, fmt};

use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::{
    error::ChatError,
    identity::Identity,
    now_millis,
    store::{NewMessage, SharedStore},
};

use super::{
    hook::LifecycleHook,
    msg::{ChatMessage, Connection, Notice, Outbound, Participant},
    RoomId, RoomRegistry,
};

/// Longest contact id or message body accepted, in characters.
const MAX_FIELD_CHARS: usize = 5000;

/// Inbound frame, tagged by `type`.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundEvent {
    Join { contact: String },
    Message { contact: String, message: String },
}

/// Per-connection event handling: turns inbound frames into registry and
/// store operations on behalf of one authenticated identity.
pub struct Dispatcher {
    identity: Identity,
    connection: Connection,
    registry: RoomRegistry,
    store: SharedStore,
    hooks: HashMap<RoomId, LifecycleHook>,
}

impl Dispatcher {
    pub fn new(identity: Identity, connection: Connection, registry: RoomRegistry, store: SharedStore) -> Self {
        Self {
            identity,
            connection,
            registry,
            store,
            hooks: HashMap::new(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Handles one raw frame. Every failure is logged here; the returned error
    /// is informational and never means the connection must close.
    pub async fn dispatch(&mut self, raw: &str) -> Result<(), ChatError> {
        let event = match serde_json::from_str::<InboundEvent>(raw) {
            Ok(event) => event,
            Err(error) => {
                warn!(user = %self.identity.id, %error, "ignoring malformed event");
                return Err(ChatError::MalformedEvent(error.to_string()));
            }
        };

        let handled = match event {
            InboundEvent::Join { contact } => self.join(&contact),
            InboundEvent::Message { contact, message } => self.message(&contact, &message).await,
        };

        if let Err(error) = &handled {
            match error {
                ChatError::PersistenceFailed(_) => {}
                ChatError::RoomNotFound(_) => info!(user = %self.identity.id, %error, "event on stale room"),
                _ => warn!(user = %self.identity.id, %error, "event not handled"),
            }
        }
        handled
    }

    fn join(&mut self, contact: &str) -> Result<(), ChatError> {
        let room = self.room_with(contact)?;
        let participant = Participant::new(&self.identity, self.connection.clone());
        let hook = self.registry.ensure_room_and_join(&room, participant)?;

        if let Some(previous) = self.hooks.insert(room.clone(), hook) {
            previous.disarm();
        }
        debug!(user = %self.identity.id, room = %room, "joined");
        Ok(())
    }

    async fn message(&mut self, contact: &str, body: &str) -> Result<(), ChatError> {
        let room = self.room_with(contact)?;
        let message = ChatMessage {
            message: clean(body, "message")?,
            sender_id: self.identity.id.clone(),
            timestamp: now_millis(),
        };

        let record = NewMessage {
            body: message.message.clone(),
            sender_id: message.sender_id.clone(),
            timestamp: message.timestamp,
            volunteer_id: room.volunteer().to_owned(),
            organizer_id: room.organizer().to_owned(),
        };
        let store = self.store.clone();
        let persist = tokio::spawn(async move { store.add_message(&record).await });

        let delivered = self.registry.send_message(&room, &message);
        if let Err(error @ ChatError::DeliveryFailed { .. }) = &delivered {
            warn!(user = %self.identity.id, room = %room, %error, "broadcast incomplete");
        }

        let persisted = match persist.await {
            Ok(result) => result,
            Err(join_error) => Err(anyhow::Error::from(join_error)),
        };
        if let Err(error) = persisted {
            error!(user = %self.identity.id, room = %room, error = %format!("{error:#}"), "message not persisted");
            let notice = Outbound::Notice(Notice::persistence_failed(message.timestamp));
            if let Err(send_error) = self.connection.try_deliver(notice) {
                warn!(user = %self.identity.id, room = %room, error = %send_error, "persistence notice not delivered");
            }
            return Err(ChatError::PersistenceFailed(error));
        }

        delivered
    }

    fn room_with(&self, contact: &str) -> Result<RoomId, ChatError> {
        let contact = clean(contact, "contact")?;
        RoomId::between(&self.identity, &contact).ok_or(ChatError::NotAChatRole(self.identity.role))
    }

    /// Logs the error once for the connection, then fires every room's hook.
    /// Returns how many rooms the connection was evicted from.
    pub fn on_error(&self, error: &dyn fmt::Display) -> usize {
        warn!(user = %self.identity.id, rooms = self.hooks.len(), %error, "connection error");
        self.hooks.values().filter(|hook| hook.on_error(error)).count()
    }

    pub fn on_close(&mut self) {
        for (_, hook) in self.hooks.drain() {
            hook.on_close();
        }
    }
}

/// Trims, rejects blanks, and caps length.
fn clean(input: &str, field: &str) -> Result<String, ChatError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ChatError::MalformedEvent(format!("{field} is empty")));
    }
    Ok(trimmed.chars().take(MAX_FIELD_CHARS).collect())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::{
        identity::Role,
        rooms::msg::Mailbox,
        store::{Contact, MessageStore, StoredMessage},
    };

    #[derive(Default)]
    struct MemoryStore {
        messages: Mutex<Vec<NewMessage>>,
        broken: bool,
    }

    #[async_trait]
    impl MessageStore for MemoryStore {
        async fn add_message(&self, message: &NewMessage) -> anyhow::Result<()> {
            if self.broken {
                anyhow::bail!("disk full");
            }
            self.messages.lock().push(message.clone());
            Ok(())
        }

        async fn get_messages(&self, _: &str, _: &str) -> anyhow::Result<Vec<StoredMessage>> {
            Ok(Vec::new())
        }

        async fn get_contacts(&self, _: &str, _: Role) -> anyhow::Result<Vec<Contact>> {
            Ok(Vec::new())
        }
    }

    fn identity(id: &str, role: Role) -> Identity {
        Identity { id: id.to_owned(), name: id.to_owned(), role, activated: true }
    }

    fn dispatcher(
        identity: Identity,
        registry: &RoomRegistry,
        store: &Arc<MemoryStore>,
    ) -> (Dispatcher, Mailbox) {
        let (connection, rx) = Connection::channel(8);
        let store: SharedStore = store.clone();
        (Dispatcher::new(identity, connection, registry.clone(), store), rx)
    }

    #[test]
    fn parses_both_event_kinds() {
        assert_eq!(
            serde_json::from_str::<InboundEvent>(r#"{"type":"join","contact":"org1"}"#).unwrap(),
            InboundEvent::Join { contact: "org1".to_owned() }
        );
        assert_eq!(
            serde_json::from_str::<InboundEvent>(r#"{"type":"message","contact":"org1","message":"hi"}"#).unwrap(),
            InboundEvent::Message { contact: "org1".to_owned(), message: "hi".to_owned() }
        );
    }

    #[test]
    fn clean_trims_and_caps() {
        assert_eq!(clean("  hi  ", "message").unwrap(), "hi");
        assert!(matches!(clean("   ", "message"), Err(ChatError::MalformedEvent(_))));
        assert_eq!(clean(&"x".repeat(6000), "message").unwrap().chars().count(), MAX_FIELD_CHARS);
    }

    #[tokio::test]
    async fn malformed_and_unknown_events_are_rejected() {
        let registry = RoomRegistry::new(8);
        let store = Arc::new(MemoryStore::default());
        let (mut vol, _rx) = dispatcher(identity("vol1", Role::Volunteer), &registry, &store);

        for raw in ["not json", r#"{"type":"typing","contact":"org1"}"#, r#"{"type":"join"}"#] {
            assert!(matches!(vol.dispatch(raw).await, Err(ChatError::MalformedEvent(_))));
        }
        assert_eq!(registry.room_count(), 0);
    }

    #[tokio::test]
    async fn organizer_and_volunteer_meet_in_one_room() {
        let registry = RoomRegistry::new(8);
        let store = Arc::new(MemoryStore::default());
        let (mut org, mut org_rx) = dispatcher(identity("org1", Role::Organizer), &registry, &store);
        let (mut vol, mut vol_rx) = dispatcher(identity("vol1", Role::Volunteer), &registry, &store);

        org.dispatch(r#"{"type":"join","contact":"vol1"}"#).await.unwrap();
        vol.dispatch(r#"{"type":"join","contact":"org1"}"#).await.unwrap();
        assert_eq!(registry.room_count(), 1);

        vol.dispatch(r#"{"type":"message","contact":"org1","message":"hi"}"#).await.unwrap();

        let Outbound::Message(received) = org_rx.try_recv().unwrap() else {
            panic!("expected a chat message");
        };
        assert_eq!(received.message, "hi");
        assert_eq!(received.sender_id, "vol1");
        assert!(vol_rx.try_recv().is_err());

        let persisted = store.messages.lock().clone();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].volunteer_id, "vol1");
        assert_eq!(persisted[0].organizer_id, "org1");
        assert_eq!(persisted[0].sender_id, "vol1");
        assert_eq!(persisted[0].timestamp, received.timestamp);
    }

    #[tokio::test]
    async fn message_to_unjoined_room_is_still_persisted() {
        let registry = RoomRegistry::new(8);
        let store = Arc::new(MemoryStore::default());
        let (mut vol, _rx) = dispatcher(identity("vol1", Role::Volunteer), &registry, &store);

        let result = vol.dispatch(r#"{"type":"message","contact":"org1","message":"anyone?"}"#).await;

        assert!(matches!(result, Err(ChatError::RoomNotFound(_))));
        assert_eq!(store.messages.lock().len(), 1);
    }

    #[tokio::test]
    async fn persistence_failure_is_surfaced_and_broadcast_still_happens() {
        let registry = RoomRegistry::new(8);
        let store = Arc::new(MemoryStore { broken: true, ..Default::default() });
        let (mut org, mut org_rx) = dispatcher(identity("org1", Role::Organizer), &registry, &store);
        let (mut vol, mut vol_rx) = dispatcher(identity("vol1", Role::Volunteer), &registry, &store);
        org.dispatch(r#"{"type":"join","contact":"vol1"}"#).await.unwrap();
        vol.dispatch(r#"{"type":"join","contact":"org1"}"#).await.unwrap();

        let result = vol.dispatch(r#"{"type":"message","contact":"org1","message":"hi"}"#).await;

        assert!(matches!(result, Err(ChatError::PersistenceFailed(_))));
        assert!(matches!(org_rx.try_recv().unwrap(), Outbound::Message(_)));
        assert!(matches!(
            vol_rx.try_recv().unwrap(),
            Outbound::Notice(Notice { error: "persistence-failed", .. })
        ));
    }

    #[tokio::test]
    async fn persistence_failure_with_a_full_queue_is_still_reported() {
        let registry = RoomRegistry::new(8);
        let store: SharedStore = Arc::new(MemoryStore { broken: true, ..Default::default() });
        let (connection, mut rx) = Connection::channel(1);
        connection.try_deliver(Outbound::Notice(Notice::persistence_failed(0))).unwrap();
        let mut vol = Dispatcher::new(identity("vol1", Role::Volunteer), connection, registry, store);

        let result = vol.dispatch(r#"{"type":"message","contact":"org1","message":"hi"}"#).await;

        assert!(matches!(result, Err(ChatError::PersistenceFailed(_))));
        assert_eq!(rx.try_recv().unwrap(), Outbound::Notice(Notice::persistence_failed(0)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn socket_error_before_any_join_evicts_nothing() {
        let registry = RoomRegistry::new(8);
        let store = Arc::new(MemoryStore::default());
        let (mut vol, _rx) = dispatcher(identity("vol1", Role::Volunteer), &registry, &store);

        assert_eq!(vol.on_error(&"connection reset"), 0);

        vol.dispatch(r#"{"type":"join","contact":"org1"}"#).await.unwrap();
        assert_eq!(vol.on_error(&"connection reset"), 1);
        assert_eq!(registry.room_count(), 0);
    }

    #[tokio::test]
    async fn non_chat_roles_cannot_join() {
        let registry = RoomRegistry::new(8);
        let store = Arc::new(MemoryStore::default());
        let (mut admin, _rx) = dispatcher(identity("root", Role::Admin), &registry, &store);

        let result = admin.dispatch(r#"{"type":"join","contact":"vol1"}"#).await;

        assert!(matches!(result, Err(ChatError::NotAChatRole(Role::Admin))));
        assert_eq!(registry.room_count(), 0);
    }

    #[tokio::test]
    async fn closing_leaves_every_joined_room() {
        let registry = RoomRegistry::new(8);
        let store = Arc::new(MemoryStore::default());
        let (mut org, _rx) = dispatcher(identity("org1", Role::Organizer), &registry, &store);

        org.dispatch(r#"{"type":"join","contact":"vol1"}"#).await.unwrap();
        org.dispatch(r#"{"type":"join","contact":"vol2"}"#).await.unwrap();
        org.dispatch(r#"{"type":"join","contact":"vol1"}"#).await.unwrap();
        assert_eq!(registry.room_count(), 2);
        assert_eq!(registry.participants(&RoomId::new("org1", "vol1")).len(), 1);

        org.on_error(&"broken pipe");
        org.on_close();
        assert_eq!(registry.room_count(), 0);
    }
}
