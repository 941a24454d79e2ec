//! CRDT session registry: live update logs and their broadcast fan-out (wiring for C5/C6).
//!
//! Mirrors `braid_core::coordinator::Coordinator`'s handle-per-key shape, but for the opaque-blob
//! pipeline: each session owns an `UpdateLog` plus a broadcast channel, and the registry tracks
//! enough bookkeeping (last checkpoint version/time) to decide when a sweep is due.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use braid_core::checkpoint::checkpoint_due;
use braid_core::crdt::{CrdtSession, UpdateLog, UpdatePayload};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrdtEvent {
    Update { id: u64, client_id: String, payload: UpdatePayload },
    Checkpoint { version: u64 },
    Presence { presence_json: serde_json::Value },
}

pub struct CrdtSessionHandle {
    pub meta: Mutex<CrdtSession>,
    pub log: Mutex<UpdateLog>,
    pub last_checkpoint_at_ms: Mutex<i64>,
    pub tx: broadcast::Sender<CrdtEvent>,
    _keepalive: broadcast::Receiver<CrdtEvent>,
}

#[derive(Default)]
pub struct CrdtRegistry {
    sessions: Mutex<HashMap<String, Arc<CrdtSessionHandle>>>,
}

impl CrdtRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, session_id: &str, page_id: &str) -> Arc<CrdtSessionHandle> {
        let mut sessions = self.sessions.lock();
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                let (tx, keepalive) = broadcast::channel(1024);
                Arc::new(CrdtSessionHandle {
                    meta: Mutex::new(CrdtSession::new(session_id, page_id)),
                    log: Mutex::new(UpdateLog::new()),
                    last_checkpoint_at_ms: Mutex::new(now_ms()),
                    tx,
                    _keepalive: keepalive,
                })
            })
            .clone()
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<CrdtSessionHandle>> {
        self.sessions.lock().get(session_id).cloned()
    }

    pub fn subscribe(&self, session_id: &str, page_id: &str) -> broadcast::Receiver<CrdtEvent> {
        self.get_or_create(session_id, page_id).tx.subscribe()
    }

    /// Sessions whose log has grown or aged enough since their last fold to warrant a checkpoint.
    pub fn due_for_checkpoint(&self, max_updates: u64, max_seconds: u64) -> Vec<(String, Arc<CrdtSessionHandle>)> {
        self.sessions
            .lock()
            .iter()
            .filter(|(_, handle)| {
                let meta = handle.meta.lock();
                let log = handle.log.lock();
                let since = log.updates_since(meta.checkpoint_version).len() as u64;
                let age_secs = ((now_ms() - *handle.last_checkpoint_at_ms.lock()).max(0) / 1000) as u64;
                since > 0 && checkpoint_due(since, age_secs, max_updates, max_seconds)
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_returns_same_handle_for_same_id() {
        let registry = CrdtRegistry::new();
        let a = registry.get_or_create("s1", "page-1");
        let b = registry.get_or_create("s1", "page-1");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn unknown_session_due_list_is_empty() {
        let registry = CrdtRegistry::new();
        assert!(registry.due_for_checkpoint(500, 20).is_empty());
    }
}
