//! CRDT-style pipeline value types and append-only update log (C5).
//!
//! Today's `UpdatePayload::FullContentSnapshot` is not a true CRDT delta — it is a full-content
//! replacement, matching the only shape actually observed for this pipeline. A genuine delta
//! variant exists behind [`crate::config::CollabConfig::accept_crdt_deltas`] so the wire contract
//! can grow into real CRDT deltas without breaking existing clients.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{CollabError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UpdatePayload {
    FullContentSnapshot(serde_json::Value),
    CrdtDelta(Bytes),
}

impl UpdatePayload {
    pub fn byte_len(&self) -> usize {
        match self {
            UpdatePayload::FullContentSnapshot(v) => v.to_string().len(),
            UpdatePayload::CrdtDelta(b) => b.len(),
        }
    }

    /// Extract the full-content string this payload represents, if it is a
    /// `{"type": "content_update", "content": ...}` record.
    pub fn as_content_update(&self) -> Option<&str> {
        match self {
            UpdatePayload::FullContentSnapshot(v) => {
                if v.get("type").and_then(|t| t.as_str()) == Some("content_update") {
                    v.get("content").and_then(|c| c.as_str())
                } else {
                    None
                }
            }
            UpdatePayload::CrdtDelta(_) => None,
        }
    }
}

/// One CRDT session: a live collaboration stream for a page, independent of the OT session.
#[derive(Debug, Clone)]
pub struct CrdtSession {
    pub id: String,
    pub page_id: String,
    pub created_at_ms: i64,
    pub closed_at_ms: Option<i64>,
    pub checkpoint_version: u64,
    pub checkpoint_bytes: Vec<u8>,
    pub awareness_json: Option<serde_json::Value>,
}

impl CrdtSession {
    pub fn new(id: impl Into<String>, page_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            page_id: page_id.into(),
            created_at_ms: now_ms(),
            closed_at_ms: None,
            checkpoint_version: 0,
            checkpoint_bytes: Vec::new(),
            awareness_json: None,
        }
    }
}

/// One append-only update within a `CrdtSession`.
#[derive(Debug, Clone)]
pub struct CrdtUpdate {
    pub id: u64,
    pub session_id: String,
    pub client_id: String,
    pub vector_clock_json: Option<serde_json::Value>,
    pub payload: UpdatePayload,
    pub created_at_ms: i64,
}

/// A fold of the log up to (and including) some update id.
#[derive(Debug, Clone)]
pub struct CrdtCheckpoint {
    pub id: u64,
    pub session_id: String,
    pub version: u64,
    pub snapshot_bytes: Vec<u8>,
    pub created_at_ms: i64,
}

/// An in-memory append-only log of updates for one CRDT session. `crates/server` persists each
/// push as it is appended; this type owns only ordering and validation.
#[derive(Debug, Default)]
pub struct UpdateLog {
    next_id: u64,
    pub updates: Vec<CrdtUpdate>,
}

impl UpdateLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and assign the next monotonic id to a push. Rejects oversize updates and, unless
    /// `accept_crdt_deltas` is set, rejects delta-tagged payloads outright rather than guessing.
    pub fn push(
        &mut self,
        session_id: &str,
        client_id: &str,
        payload: UpdatePayload,
        vector_clock_json: Option<serde_json::Value>,
        max_update_bytes: usize,
        accept_crdt_deltas: bool,
    ) -> Result<CrdtUpdate> {
        if payload.byte_len() > max_update_bytes {
            return Err(CollabError::Oversize(payload.byte_len()));
        }
        if matches!(payload, UpdatePayload::CrdtDelta(_)) && !accept_crdt_deltas {
            return Err(CollabError::BadOperation("CRDT delta updates are not enabled for this session".into()));
        }
        self.next_id += 1;
        let update = CrdtUpdate {
            id: self.next_id,
            session_id: session_id.to_string(),
            client_id: client_id.to_string(),
            vector_clock_json,
            payload,
            created_at_ms: now_ms(),
        };
        self.updates.push(update.clone());
        Ok(update)
    }

    pub fn updates_since(&self, version: u64) -> Vec<&CrdtUpdate> {
        self.updates.iter().filter(|u| u.id > version).collect()
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(content: &str) -> UpdatePayload {
        UpdatePayload::FullContentSnapshot(serde_json::json!({ "type": "content_update", "content": content }))
    }

    #[test]
    fn push_assigns_monotonic_ids() {
        let mut log = UpdateLog::new();
        let u1 = log.push("s1", "c1", snapshot("a"), None, 1024, false).unwrap();
        let u2 = log.push("s1", "c1", snapshot("ab"), None, 1024, false).unwrap();
        assert_eq!(u1.id, 1);
        assert_eq!(u2.id, 2);
    }

    #[test]
    fn oversize_update_is_rejected() {
        let mut log = UpdateLog::new();
        let big = "x".repeat(100);
        let result = log.push("s1", "c1", snapshot(&big), None, 10, false);
        assert!(matches!(result, Err(CollabError::Oversize(_))));
    }

    #[test]
    fn delta_rejected_unless_flag_enabled() {
        let mut log = UpdateLog::new();
        let payload = UpdatePayload::CrdtDelta(Bytes::from_static(b"delta"));
        assert!(log.push("s1", "c1", payload.clone(), None, 1024, false).is_err());
        assert!(log.push("s1", "c1", payload, None, 1024, true).is_ok());
    }

    #[test]
    fn updates_since_filters_by_id() {
        let mut log = UpdateLog::new();
        log.push("s1", "c1", snapshot("a"), None, 1024, false).unwrap();
        log.push("s1", "c1", snapshot("ab"), None, 1024, false).unwrap();
        log.push("s1", "c1", snapshot("abc"), None, 1024, false).unwrap();
        let since = log.updates_since(1);
        assert_eq!(since.len(), 2);
        assert!(since.iter().all(|u| u.id > 1));
    }
}
