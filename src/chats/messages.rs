use axum::{debug_handler, extract::{Path, State}, http::HeaderMap};

use crate::{
    appresult::Success,
    identity::Gatekeeper,
    rooms::RoomId,
    store::{SharedStore, StoredMessage},
    AppError, AppResult,
};

use super::authorize;

#[debug_handler(state = crate::AppState)]
pub(crate) async fn messages(
    State(gatekeeper): State<Gatekeeper>,
    State(store): State<SharedStore>,
    headers: HeaderMap,
    Path(contact_id): Path<String>,
) -> AppResult<Success<Vec<StoredMessage>>> {
    let identity = authorize(&gatekeeper, &headers).await?;

    let contact_id = contact_id.trim();
    if contact_id.is_empty() {
        return Err(AppError::from("Contact ID is required"));
    }

    let Some(room) = RoomId::between(&identity, contact_id) else {
        return Ok(Success(Vec::new()));
    };

    let messages = store.get_messages(room.volunteer(), room.organizer()).await?;
    Ok(Success(messages))
}
