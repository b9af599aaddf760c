mod contacts;
mod messages;

use axum::{http::{HeaderMap, StatusCode}, routing::get, Router};

use crate::{
    error::RejectReason,
    identity::{Gatekeeper, Identity, Role},
    AppError, AppResult, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/contacts", get(contacts::contacts))
        .route("/messages/{contact_id}", get(messages::messages))
}

/// Same session checks as the websocket handshake, plus a role gate.
pub(crate) async fn authorize(gatekeeper: &Gatekeeper, headers: &HeaderMap) -> AppResult<Identity> {
    let identity = gatekeeper.admit(headers).await.map_err(|reason| match reason {
        RejectReason::Unauthorized => AppError::new(StatusCode::FORBIDDEN, reason.reason()),
        reason => AppError::from(reason),
    })?;

    if !(identity.role.can_chat() || identity.role == Role::Admin) {
        return Err(AppError::new(StatusCode::UNAUTHORIZED, "Unauthorized"));
    }

    Ok(identity)
}
