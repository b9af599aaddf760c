use async_trait::async_trait;
use axum::http::{header::{AUTHORIZATION, COOKIE}, HeaderMap};
use sqlx::SqlitePool;
use tower_sessions::cookie::Cookie;

use crate::now_millis;

use super::{Identity, Role, SessionResolver};

/// Looks sessions up in the `session` table written by the sign-in service.
#[derive(Clone)]
pub struct SqliteSessions {
    db_pool: SqlitePool,
    cookie_name: String,
}

impl SqliteSessions {
    pub fn new(db_pool: SqlitePool, cookie_name: impl Into<String>) -> Self {
        Self { db_pool, cookie_name: cookie_name.into() }
    }
}

#[async_trait]
impl SessionResolver for SqliteSessions {
    async fn resolve(&self, headers: &HeaderMap) -> anyhow::Result<Option<Identity>> {
        let Some(token) = session_token(headers, &self.cookie_name) else {
            return Ok(None);
        };

        let row: Option<(String, String, String, bool)> = sqlx::query_as(
            "SELECT user.id, user.name, user.actor, user.activated
            FROM session INNER JOIN user ON session.user_id = user.id
            WHERE session.token = ? AND session.expires_at > ?",
        )
        .bind(token)
        .bind(now_millis())
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(row.map(|(id, name, actor, activated)| Identity {
            id,
            name,
            role: Role::from_actor(&actor),
            activated,
        }))
    }
}

/// Session token from `Authorization: Bearer ...`, else from the named cookie.
pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_owned());
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| Cookie::split_parse(raw))
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == cookie_name)
        .map(|cookie| cookie.value().to_owned())
        .filter(|token| !token.is_empty())
}
