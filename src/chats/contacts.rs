use axum::{debug_handler, extract::State, http::HeaderMap};

use crate::{appresult::Success, identity::Gatekeeper, store::{Contact, SharedStore}, AppResult};

use super::authorize;

#[debug_handler(state = crate::AppState)]
pub(crate) async fn contacts(
    State(gatekeeper): State<Gatekeeper>,
    State(store): State<SharedStore>,
    headers: HeaderMap,
) -> AppResult<Success<Vec<Contact>>> {
    let identity = authorize(&gatekeeper, &headers).await?;
    let contacts = store.get_contacts(&identity.id, identity.role).await?;

    Ok(Success(contacts))
}
