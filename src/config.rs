use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::Context;

/// Runtime settings, read from the process environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub session_cookie: String,
    pub connection: ConnectionSettings,
}

/// Per-connection and per-room limits handed to the websocket layer.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub room_buffer_capacity: usize,
    pub outbound_queue_capacity: usize,
    pub send_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            room_buffer_capacity: 100,
            outbound_queue_capacity: 64,
            send_timeout: Duration::from_millis(5000),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Config> {
        let defaults = ConnectionSettings::default();

        Ok(Config {
            host: var_or("HOST", "0.0.0.0"),
            port: parse_var("PORT", 6969)?,
            database_url: var_or("DATABASE_URL", "sqlite://volunchat.db?mode=rwc"),
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 16)?,
            session_cookie: var_or("SESSION_COOKIE", "session_token"),
            connection: ConnectionSettings {
                room_buffer_capacity: parse_var("ROOM_BUFFER_CAPACITY", defaults.room_buffer_capacity)?,
                outbound_queue_capacity: parse_var("OUTBOUND_QUEUE_CAPACITY", defaults.outbound_queue_capacity)?.max(1),
                send_timeout: Duration::from_millis(
                    parse_var("SEND_TIMEOUT_MS", defaults.send_timeout.as_millis() as u64)?
                ),
            },
        })
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }
}

fn var_or(key: &str, default: &str) -> String {
    dotenv::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_var<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match dotenv::var(key) {
        Ok(raw) => raw.trim().parse().with_context(|| format!("{key}={raw:?} is not valid")),
        Err(_) => Ok(default),
    }
}
