//! Braid wiki server: real-time collaborative editing over an operational-transform pipeline and
//! a CRDT-style opaque-update pipeline, committing to versioned page revisions.

pub mod activity;
pub mod adapter;
pub mod authz;
pub mod background;
pub mod config;
pub mod ctx;
pub mod db;
pub mod error;
pub mod registry;
pub mod router;
pub mod state;

pub use config::ServerConfig;
pub use error::{Error, Result};
pub use state::AppState;

use tracing::info;
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).try_init().ok();

    let config = ServerConfig::default();
    info!(storage_dir = ?config.storage_dir, bind_port = config.bind_port, "starting braid server");

    let state = AppState::new(config.clone()).await?;
    background::spawn(state.clone());

    let app = router::build(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.bind_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
