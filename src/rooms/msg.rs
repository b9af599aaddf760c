use serde::{Deserialize, Serialize};
use std::sync::Arc;

use tokio::sync::{
    mpsc::{self, error::{TryRecvError, TrySendError}},
    watch,
};
use uuid::Uuid;

use crate::identity::{Identity, Role};

/// A chat message as broadcast to the other side of a room.
///
/// `timestamp` is stamped once, when the message event is received, and is
/// the same value that gets persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub message: String,
    pub sender_id: String,
    pub timestamp: i64,
}

/// Side-channel notice for the connection's own user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub error: &'static str,
    pub timestamp: i64,
}

impl Notice {
    pub fn persistence_failed(timestamp: i64) -> Self {
        Self { error: "persistence-failed", timestamp }
    }
}

/// Items queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Message(ChatMessage),
    Notice(Notice),
    Close,
}

impl Outbound {
    /// JSON text frame for this item, `None` for [`Outbound::Close`].
    pub fn to_frame(&self) -> Option<String> {
        let encoded = match self {
            Outbound::Message(message) => serde_json::to_string(message),
            Outbound::Notice(notice) => serde_json::to_string(notice),
            Outbound::Close => return None,
        };

        match encoded {
            Ok(text) => Some(text),
            Err(error) => {
                tracing::error!(%error, "failed to encode outbound frame");
                None
            }
        }
    }
}

/// Sending half of a live connection. Cheap to clone; the socket itself is
/// owned by the connection's writer task.
///
/// Closing goes through its own signal, so a peer whose queue is full can
/// still be closed.
#[derive(Debug, Clone)]
pub struct Connection {
    id: Uuid,
    tx: mpsc::Sender<Outbound>,
    closed: Arc<watch::Sender<bool>>,
}

impl Connection {
    pub fn channel(capacity: usize) -> (Connection, Mailbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (closed, closed_rx) = watch::channel(false);
        let connection = Connection { id: Uuid::now_v7(), tx, closed: Arc::new(closed) };
        (connection, Mailbox { rx, closed: closed_rx })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_open(&self) -> bool {
        !self.tx.is_closed() && !*self.closed.borrow()
    }

    /// Queues without waiting; a full queue is the peer's problem, not the caller's.
    pub fn try_deliver(&self, item: Outbound) -> Result<(), TrySendError<Outbound>> {
        self.tx.try_send(item)
    }

    pub fn close(&self) {
        self.closed.send_replace(true);
    }
}

/// Receiving half, drained by the connection's writer task.
#[derive(Debug)]
pub struct Mailbox {
    rx: mpsc::Receiver<Outbound>,
    closed: watch::Receiver<bool>,
}

impl Mailbox {
    /// Next item to write. A close request wins over anything still queued.
    pub async fn recv(&mut self) -> Option<Outbound> {
        tokio::select! {
            biased;
            Ok(_) = self.closed.wait_for(|closed| *closed) => Some(Outbound::Close),
            item = self.rx.recv() => item,
        }
    }

    pub fn try_recv(&mut self) -> Result<Outbound, TryRecvError> {
        self.rx.try_recv()
    }

    pub fn close_requested(&self) -> bool {
        *self.closed.borrow()
    }
}

/// One connected identity inside a room.
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub connection: Connection,
}

impl Participant {
    pub fn new(identity: &Identity, connection: Connection) -> Self {
        Self {
            id: identity.id.clone(),
            name: identity.name.clone(),
            role: identity.role,
            connection,
        }
    }
}
