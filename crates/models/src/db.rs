use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tracing::info;

/// Open a pooled Postgres connection.
pub async fn connect(url: &str, max_connections: u32, sqlx_logging: bool) -> anyhow::Result<DatabaseConnection> {
    let mut opts = ConnectOptions::new(url.to_string());
    opts.max_connections(max_connections)
        .connect_timeout(Duration::from_secs(30))
        .sqlx_logging(sqlx_logging);
    let db = Database::connect(opts).await?;
    info!(max_connections, "database connected");
    Ok(db)
}

/// Connect using `DATABASE_URL`, used by tests that exercise the Postgres directory.
pub async fn connect_from_env() -> anyhow::Result<DatabaseConnection> {
    let url = std::env::var("DATABASE_URL")?;
    connect(&url, 5, false).await
}
