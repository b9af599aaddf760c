use axum::{
    debug_handler,
    extract::{ws::{Message, WebSocket}, State, WebSocketUpgrade},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::{
    config::ConnectionSettings,
    identity::{Gatekeeper, Identity},
    store::SharedStore,
};

use super::{dispatch::Dispatcher, msg::{Connection, Outbound}, RoomRegistry};

#[debug_handler(state = crate::AppState)]
pub async fn room_ws(
    State(gatekeeper): State<Gatekeeper>,
    State(registry): State<RoomRegistry>,
    State(store): State<SharedStore>,
    State(settings): State<ConnectionSettings>,
    headers: HeaderMap,

    ws: WebSocketUpgrade,
) -> Response {
    let identity = match gatekeeper.admit(&headers).await {
        Ok(identity) => identity,
        Err(reason) => return reason.into_response(),
    };

    info!(user = %identity.id, name = %identity.name, role = %identity.role, "connection accepted");
    ws.on_upgrade(move |socket| serve(socket, identity, registry, store, settings))
}

async fn serve(
    socket: WebSocket,
    identity: Identity,
    registry: RoomRegistry,
    store: SharedStore,
    settings: ConnectionSettings,
) {
    let (connection, mut outbound) = Connection::channel(settings.outbound_queue_capacity);
    let conn_id = connection.id();
    let (mut sender, mut receiver) = socket.split();
    let mut dispatcher = Dispatcher::new(identity, connection, registry, store);

    let send_timeout = settings.send_timeout;
    let mut writer = tokio::spawn(async move {
        while let Some(item) = outbound.recv().await {
            let Some(text) = item.to_frame() else {
                if item == Outbound::Close {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
                continue;
            };

            match tokio::time::timeout(send_timeout, sender.send(Message::Text(text.into()))).await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    debug!(conn = %conn_id, %error, "socket write failed");
                    break;
                }
                Err(_) => {
                    warn!(conn = %conn_id, "socket write timed out");
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let _ = dispatcher.dispatch(text.as_str()).await;
                }
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => {
                        let _ = dispatcher.dispatch(text).await;
                    }
                    Err(error) => warn!(conn = %conn_id, %error, "ignoring non-utf8 frame"),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    dispatcher.on_error(&error);
                    break;
                }
            },
            _ = &mut writer => break,
        }
    }

    dispatcher.on_close();
    writer.abort();
    info!(conn = %conn_id, user = %dispatcher.identity().id, "connection closed");
}
