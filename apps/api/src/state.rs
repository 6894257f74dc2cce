use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::storage::FileStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Public disk for pictures, CVs and certificates. Local or S3, chosen at startup.
    pub storage: Arc<dyn FileStore>,
    pub config: Config,
}
