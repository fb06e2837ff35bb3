//! Shared runtime state for larder-daemon.

use larder_config::CredentialStore;
use larder_pos::PosApi;
use larder_sync::SyncEngine;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Static build metadata included in the health response.
#[derive(Clone, Debug, serde::Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    /// Upstream POS backend; also held by the sync engine.
    pub pos: Arc<dyn PosApi>,
    pub sync: Arc<SyncEngine>,
    pub build: BuildInfo,
}

impl AppState {
    pub fn new(pool: SqlitePool, pos: Arc<dyn PosApi>, credentials: CredentialStore) -> Self {
        let sync = Arc::new(SyncEngine::new(pool.clone(), Arc::clone(&pos), credentials));
        Self {
            pool,
            pos,
            sync,
            build: BuildInfo {
                service: "larder-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
        }
    }
}
