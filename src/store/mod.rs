mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::identity::Role;

pub use sqlite::{init_schema, SqliteStore};

/// A message on its way into durable storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub body: String,
    pub sender_id: String,
    pub timestamp: i64,
    pub volunteer_id: String,
    pub organizer_id: String,
}

/// A persisted message, as returned by the history read path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct StoredMessage {
    pub id: i64,
    pub message: String,
    pub time: i64,
    pub volunteer: String,
    pub organizer: String,
    pub sender: String,
}

/// Someone the caller may chat with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub contact_id: String,
    pub contact_name: String,
}

/// Durable message storage and contact resolution.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn add_message(&self, message: &NewMessage) -> anyhow::Result<()>;

    /// History between one volunteer and one organizer, oldest first.
    async fn get_messages(&self, volunteer_id: &str, organizer_id: &str) -> anyhow::Result<Vec<StoredMessage>>;

    /// Counterparts of confirmed volunteering on events that have not ended yet.
    async fn get_contacts(&self, identity_id: &str, role: Role) -> anyhow::Result<Vec<Contact>>;
}

pub type SharedStore = Arc<dyn MessageStore>;
