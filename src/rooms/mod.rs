mod dispatch;
mod hook;
mod key;
mod msg;
mod registry;
mod room;
mod ws;

use axum::{routing::get, Router};

use crate::AppState;

pub use dispatch::{Dispatcher, InboundEvent};
pub use hook::LifecycleHook;
pub use key::RoomId;
pub use msg::{ChatMessage, Connection, Mailbox, Notice, Outbound, Participant};
pub use registry::RoomRegistry;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::room_ws))
}
