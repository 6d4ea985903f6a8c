use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::Router;
use configs::AppConfig;
use migration::{Migrator, MigratorTrait};
use service::auth::hasher::Argon2Hasher;
use service::auth::repo::seaorm::SeaOrmUserDirectory;
use service::auth::repository::memory::MemoryUserDirectory;
use service::auth::repository::UserDirectory;
use service::auth::{TokenCodec, TokenConfig};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::cookies::CookieSettings;
use crate::routes;
use crate::state::ServerState;
use crate::throttle::RateLimiter;

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

pub fn token_config(cfg: &configs::AuthConfig) -> TokenConfig {
    TokenConfig {
        access_secret: cfg.access_secret.clone(),
        refresh_secret: cfg.refresh_secret.clone(),
        access_ttl: Duration::from_secs(cfg.access_ttl_secs),
        refresh_ttl: Duration::from_secs(cfg.refresh_ttl_secs),
    }
}

async fn build_directory(cfg: &configs::DatabaseConfig) -> anyhow::Result<Arc<dyn UserDirectory>> {
    if !cfg.is_configured() {
        warn!("no database configured; users are kept in memory and lost on restart");
        return Ok(Arc::new(MemoryUserDirectory::new()));
    }
    let db = models::db::connect(&cfg.url, cfg.max_connections, cfg.sqlx_logging).await?;
    Migrator::up(&db, None).await.context("apply migrations")?;
    info!(max_connections = cfg.max_connections, "database ready");
    Ok(Arc::new(SeaOrmUserDirectory::new(db)))
}

/// Wire the user directory, hasher, token codec and cookie settings from config.
pub async fn build_state(cfg: &AppConfig) -> anyhow::Result<ServerState> {
    let directory = build_directory(&cfg.database).await?;
    let codec = TokenCodec::new(token_config(&cfg.auth)).context("token codec")?;
    Ok(ServerState::new(
        directory,
        Arc::new(Argon2Hasher::default()),
        Arc::new(codec),
        CookieSettings::from_config(&cfg.auth),
    ))
}

pub fn build_app(state: ServerState, cfg: &AppConfig) -> Router {
    routes::build_router(state, RateLimiter::from_config(&cfg.throttle), build_cors())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// Public entry: build the app and run the HTTP server until Ctrl+C.
pub async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let state = build_state(&cfg).await?;
    let app = build_app(state, &cfg);

    let addr: SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .context("server bind address")?;
    info!(%addr, throttle_limit = cfg.throttle.limit, throttle_window_secs = cfg.throttle.window_secs, "starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
