//! Background sweeps: CRDT checkpoint folding and idle OT session reclaim.

use std::time::Duration;

use tracing::{info, warn};

use crate::state::AppState;

pub fn spawn(state: AppState) {
    tokio::spawn(checkpoint_sweep(state.clone()));
    tokio::spawn(idle_reclaim(state));
}

async fn checkpoint_sweep(state: AppState) {
    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    loop {
        ticker.tick().await;
        let config = &state.config.collab;
        let due = state.crdt.due_for_checkpoint(config.checkpoint_max_updates, config.checkpoint_max_seconds);
        for (session_id, handle) in due {
            let folded = {
                let log = handle.log.lock();
                braid_core::checkpoint::fold(&session_id, &log, 0)
            };
            let Some(checkpoint) = folded else { continue };
            if let Err(err) = state.db.store_checkpoint(&session_id, checkpoint.version, &checkpoint.snapshot_bytes, checkpoint.created_at_ms).await {
                warn!(session_id, error = %err, "checkpoint persistence failed");
                continue;
            }
            handle.meta.lock().checkpoint_version = checkpoint.version;
            *handle.last_checkpoint_at_ms.lock() = chrono::Utc::now().timestamp_millis();
            info!(session_id, version = checkpoint.version, "checkpoint folded");
        }
    }
}

async fn idle_reclaim(state: AppState) {
    let mut ticker = tokio::time::interval(state.config.collab.auto_cleanup_interval());
    loop {
        ticker.tick().await;
        let reclaimed = state.coordinator.reclaim_idle_sessions().await;
        if !reclaimed.is_empty() {
            info!(count = reclaimed.len(), "reclaimed idle collaborative sessions");
        }
    }
}
