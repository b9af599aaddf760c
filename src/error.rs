use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

use crate::{identity::Role, rooms::RoomId};

/// Failures of the realtime chat core. None of them are fatal to the process;
/// each one is scoped to a single connection or a single operation.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("handshake rejected: {}", .0.reason())]
    AuthRejected(RejectReason),

    #[error("room {0} does not exist")]
    RoomNotFound(RoomId),

    #[error("connection is not open")]
    ConnectionClosed,

    #[error("delivery failed for {failed} participant(s)")]
    DeliveryFailed { failed: usize },

    #[error("failed to persist message: {0:#}")]
    PersistenceFailed(anyhow::Error),

    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("role {0} cannot take part in chats")]
    NotAChatRole(Role),
}

/// Why an upgrade request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Unauthorized,
    Deactivated,
    AuthError,
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        use RejectReason::*;
        match self {
            Unauthorized => "unauthorized",
            Deactivated => "deactivated",
            AuthError => "auth-error",
        }
    }

    pub fn reason(&self) -> &'static str {
        use RejectReason::*;
        match self {
            Unauthorized => "Unauthorized",
            Deactivated => "Your account got deactivated by admins",
            AuthError => "Authentication failed",
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }
}

impl IntoResponse for RejectReason {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(json!({ "code": self.code(), "reason": self.reason() })),
        )
            .into_response()
    }
}
