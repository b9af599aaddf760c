use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use serde_json::json;

use crate::error::RejectReason;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub error: anyhow::Error,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, error: anyhow::Error::msg(message.into()) }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = if self.status.is_server_error() {
            tracing::error!(error = ?self.error, "request failed");
            "Internal server error".to_owned()
        } else {
            self.error.to_string()
        };

        (
            self.status,
            Json(json!({
                "error": true,
                "data": { "status": self.status.as_u16(), "message": message },
            })),
        )
            .into_response()
    }
}

impl From<RejectReason> for AppError {
    fn from(reason: RejectReason) -> Self {
        let status = match reason {
            RejectReason::AuthError => StatusCode::INTERNAL_SERVER_ERROR,
            _ => reason.status(),
        };
        AppError::new(status, reason.reason())
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::new(StatusCode::BAD_REQUEST, err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::new(StatusCode::BAD_REQUEST, err)
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self { status: StatusCode::INTERNAL_SERVER_ERROR, error: anyhow::Error::from(err) }
            }
        }
    };
}

apperr_impl!(anyhow::Error);
apperr_impl!(sqlx::Error);
apperr_impl!(serde_json::Error);

/// Successful payload wrapper, `{ "error": false, "data": ... }`.
pub struct Success<T>(pub T);

#[derive(Serialize)]
struct Envelope<T> {
    error: bool,
    data: T,
}

impl<T: Serialize> IntoResponse for Success<T> {
    fn into_response(self) -> Response {
        Json(Envelope { error: false, data: self.0 }).into_response()
    }
}
