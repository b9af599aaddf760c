use std::sync::Arc;

use axum::http::HeaderMap;
use tracing::{info, warn};

use crate::error::RejectReason;

use super::{Identity, SessionResolver};

/// Decides whether a request may open a chat connection. Runs before the
/// websocket upgrade completes; a rejection means no frame is ever exchanged.
#[derive(Clone)]
pub struct Gatekeeper {
    resolver: Arc<dyn SessionResolver>,
}

impl Gatekeeper {
    pub fn new(resolver: impl SessionResolver + 'static) -> Self {
        Self { resolver: Arc::new(resolver) }
    }

    pub async fn admit(&self, headers: &HeaderMap) -> Result<Identity, RejectReason> {
        let identity = match self.resolver.resolve(headers).await {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                info!("connection rejected at handshake: no session");
                return Err(RejectReason::Unauthorized);
            }
            Err(error) => {
                warn!(error = %format!("{error:#}"), "session lookup failed");
                return Err(RejectReason::AuthError);
            }
        };

        if !identity.activated {
            info!(user = %identity.id, "connection rejected at handshake: deactivated");
            return Err(RejectReason::Deactivated);
        }

        Ok(identity)
    }
}
