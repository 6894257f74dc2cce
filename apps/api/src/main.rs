mod auth;
mod config;
mod db;
mod errors;
mod models;
mod routes;
mod state;
mod storage;
mod wizard;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, StorageBackend};
use crate::db::create_pool;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::{FileStore, LocalDiskStore, S3Store};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Profile Builder API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (runs migrations)
    let db = create_pool(&config.database_url).await?;

    // Initialize file storage
    let (storage, public_root): (Arc<dyn FileStore>, Option<String>) = match &config.storage {
        StorageBackend::Local { root } => {
            tokio::fs::create_dir_all(root).await?;
            info!("Local file storage at {root}");
            let store: Arc<dyn FileStore> =
                Arc::new(LocalDiskStore::new(root, config.public_url_base.clone()));
            (store, Some(root.clone()))
        }
        StorageBackend::S3 {
            bucket,
            endpoint,
            access_key_id,
            secret_access_key,
        } => {
            let s3 = S3Store::connect(
                endpoint,
                access_key_id,
                secret_access_key,
                bucket.clone(),
                config.public_url_base.clone(),
            )
            .await;
            info!("S3 file storage in bucket {bucket}");
            let store: Arc<dyn FileStore> = Arc::new(s3);
            (store, None)
        }
    };

    let state = AppState {
        db,
        storage,
        config: config.clone(),
    };

    let mut app = build_router(state);
    if let Some(root) = public_root {
        // Local uploads are served like a public disk.
        app = app.nest_service("/storage", ServeDir::new(root));
    }
    let app = app
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to the wizard frontend once its host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
