use anyhow::Result;
use axum::Router;
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
#[cfg(test)]
mod test_support;

use auth::TokenVerifier;
use config::AppConfig;
use services::{
    catalog::SqliteCatalog, chunk_store::SqliteChunkStore, storage_service::StorageService,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let (cfg, migrate) = AppConfig::from_env_and_args()?;
    tracing::info!("Starting audio-store with config: {:?}", cfg);

    let db = Arc::new(db::connect(&cfg.database_url, 5).await?);
    db::run_migrations(&db).await?;
    if migrate {
        tracing::info!("Database migration complete.");
        return Ok(());
    }

    // Catalog and chunk store share one pool but stay behind separate traits.
    let storage = StorageService::new(
        Arc::new(SqliteCatalog::new(db.clone())),
        Arc::new(SqliteChunkStore::new(db)),
        cfg.chunk_size,
    );
    let verifier = Arc::new(TokenVerifier::new(cfg.jwt_secret.as_bytes()));
    tracing::info!(
        chunk_size = storage.chunk_size(),
        max_upload_bytes = cfg.max_upload_bytes,
        "storage ready"
    );

    let app: Router = routes::routes::routes(verifier, cfg.max_upload_bytes)
        .with_state(storage)
        .layer(TimeoutLayer::new(cfg.request_timeout))
        .layer(TraceLayer::new_for_http());

    let listener = bind_listener(&cfg).await?;
    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Bind the configured address. A wildcard bind that is refused for lack of
/// privileges retries on loopback.
async fn bind_listener(cfg: &AppConfig) -> Result<TcpListener> {
    let addr = cfg.addr();
    match TcpListener::bind(&addr).await {
        Ok(listener) => Ok(listener),
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback
            );
            Ok(TcpListener::bind(&fallback).await?)
        }
        Err(err) => Err(err.into()),
    }
}
