pub mod appresult;
pub mod chats;
pub mod config;
pub mod error;
pub mod identity;
pub mod rooms;
pub mod store;

use std::sync::Arc;

use axum::{extract::FromRef, http::Method, routing::get, Json, Router};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower_http::{cors::{AllowOrigin, CorsLayer}, trace::TraceLayer};

pub use appresult::{AppError, AppResult};
use config::{Config, ConnectionSettings};
use identity::{Gatekeeper, SqliteSessions};
use rooms::RoomRegistry;
use store::{SharedStore, SqliteStore};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub gatekeeper: Gatekeeper,
    pub registry: RoomRegistry,
    pub store: SharedStore,
    pub settings: ConnectionSettings,
}

impl AppState {
    /// Wires the SQLite-backed collaborators around a fresh, empty registry.
    pub fn from_pool(db_pool: SqlitePool, config: &Config) -> AppState {
        AppState {
            gatekeeper: Gatekeeper::new(SqliteSessions::new(db_pool.clone(), config.session_cookie.clone())),
            registry: RoomRegistry::new(config.connection.room_buffer_capacity),
            store: Arc::new(SqliteStore::new(db_pool)),
            settings: config.connection.clone(),
        }
    }
}

pub fn router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_origin(AllowOrigin::mirror_request());

    Router::new()
        .route("/", get(hello))
        .merge(rooms::router())
        .nest("/chats", chats::router())

        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn hello() -> Json<Value> {
    Json(json!({ "error": false, "data": "volunchat" }))
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
