use anyhow::Context;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;
use volunchat::{config::Config, store, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).init();

    let config = Config::from_env()?;

    let db_pool = SqlitePoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .with_context(|| format!("cannot open {}", config.database_url))?;
    store::init_schema(&db_pool).await?;

    let app = volunchat::router(AppState::from_pool(db_pool, &config));

    let listener = tokio::net::TcpListener::bind(config.bind_addr()?).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
