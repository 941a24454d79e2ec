//! Shared application state, handed to every axum handler via `State<AppState>`.

use std::sync::Arc;

use braid_core::coordinator::Coordinator;

use crate::activity::TracingActivityLog;
use crate::authz::DefaultAuthz;
use crate::config::ServerConfig;
use crate::db::Db;
use crate::registry::CrdtRegistry;

#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub db: Arc<Db>,
    pub coordinator: Arc<Coordinator<DefaultAuthz>>,
    pub crdt: Arc<CrdtRegistry>,
    pub activity: Arc<TracingActivityLog>,
    /// Shared with the coordinator's own copy, exposed directly for the CRDT adapter, which has
    /// no coordinator of its own to route authorization checks through.
    pub authz: Arc<DefaultAuthz>,
}

impl AppState {
    pub async fn new(config: ServerConfig) -> anyhow::Result<Self> {
        config.ensure_dirs().await?;
        let db = Arc::new(Db::connect(&config.database_path).await?);
        let authz = Arc::new(DefaultAuthz);
        let coordinator = Arc::new(Coordinator::new(authz.clone(), config.collab.clone()));
        Ok(Self { config, db, coordinator, crdt: Arc::new(CrdtRegistry::new()), activity: Arc::new(TracingActivityLog), authz })
    }
}
