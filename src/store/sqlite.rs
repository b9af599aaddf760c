use anyhow::Context;
use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::{identity::Role, now_millis};

use super::{Contact, MessageStore, NewMessage, StoredMessage};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS user (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    actor TEXT NOT NULL DEFAULT 'user',
    activated BOOLEAN NOT NULL DEFAULT TRUE
);
CREATE TABLE IF NOT EXISTS session (
    token TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES user (id),
    expires_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    organizer TEXT NOT NULL REFERENCES user (id),
    created_at INTEGER NOT NULL,
    ends_at INTEGER NOT NULL,
    accept_volunteers BOOLEAN NOT NULL DEFAULT TRUE
);
CREATE TABLE IF NOT EXISTS volunteer_requests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event INTEGER NOT NULL REFERENCES events (id),
    volunteer TEXT NOT NULL REFERENCES user (id),
    date INTEGER NOT NULL,
    verified BOOLEAN NOT NULL DEFAULT FALSE,
    description TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    message TEXT NOT NULL,
    time INTEGER NOT NULL,
    volunteer TEXT NOT NULL,
    organizer TEXT NOT NULL,
    sender TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS messages_by_pair ON messages (organizer, volunteer, time);
"#;

/// Creates any missing table. Safe to run on every start.
pub async fn init_schema(db_pool: &SqlitePool) -> anyhow::Result<()> {
    for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query(statement)
            .execute(db_pool)
            .await
            .with_context(|| format!("schema statement failed: {statement}"))?;
    }
    Ok(())
}

#[derive(Clone)]
pub struct SqliteStore {
    db_pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn add_message(&self, message: &NewMessage) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO messages (message,time,volunteer,organizer,sender) VALUES (?,?,?,?,?)")
            .bind(&message.body)
            .bind(message.timestamp)
            .bind(&message.volunteer_id)
            .bind(&message.organizer_id)
            .bind(&message.sender_id)
            .execute(&self.db_pool)
            .await?;
        Ok(())
    }

    async fn get_messages(&self, volunteer_id: &str, organizer_id: &str) -> anyhow::Result<Vec<StoredMessage>> {
        Ok(
            sqlx::query_as("SELECT id,message,time,volunteer,organizer,sender FROM messages WHERE organizer=? AND volunteer=? ORDER BY time, id")
                .bind(organizer_id)
                .bind(volunteer_id)
                .fetch_all(&self.db_pool)
                .await?
        )
    }

    async fn get_contacts(&self, identity_id: &str, role: Role) -> anyhow::Result<Vec<Contact>> {
        let query = match role {
            Role::Volunteer => {
                "SELECT DISTINCT user.id AS contact_id, user.name AS contact_name
                FROM volunteer_requests vr
                INNER JOIN events ON vr.event = events.id
                INNER JOIN user ON events.organizer = user.id
                WHERE vr.volunteer = ? AND vr.verified = TRUE AND user.actor = 'organizer' AND events.ends_at > ?
                ORDER BY user.name"
            }
            Role::Organizer => {
                "SELECT DISTINCT user.id AS contact_id, user.name AS contact_name
                FROM volunteer_requests vr
                INNER JOIN events ON vr.event = events.id
                INNER JOIN user ON vr.volunteer = user.id
                WHERE events.organizer = ? AND vr.verified = TRUE AND user.actor = 'volunteer' AND events.ends_at > ?
                ORDER BY user.name"
            }
            Role::User | Role::Admin => return Ok(Vec::new()),
        };

        Ok(
            sqlx::query_as(query)
                .bind(identity_id)
                .bind(now_millis())
                .fetch_all(&self.db_pool)
                .await?
        )
    }
}
