//! Checkpointer (C6): folds a CRDT session's update log into a checkpoint on a policy.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::warn;

use crate::crdt::{CrdtCheckpoint, UpdateLog};

/// Whether a session is due for a checkpoint fold.
pub fn checkpoint_due(updates_since_checkpoint: u64, last_checkpoint_age_secs: u64, max_updates: u64, max_seconds: u64) -> bool {
    updates_since_checkpoint >= max_updates || last_checkpoint_age_secs >= max_seconds
}

/// Fold the latest valid full-content update in `log` into a new checkpoint, if any exists.
///
/// Only a `{"type": "content_update", "content": ...}` record can be folded; if the latest
/// update is not a full-state record, the fold is skipped and logged rather than producing a
/// checkpoint from a payload the checkpointer cannot interpret. Idempotent: calling this again
/// with no new updates since the last fold returns an equivalent checkpoint.
pub fn fold(session_id: &str, log: &UpdateLog, since_version: u64) -> Option<CrdtCheckpoint> {
    let candidates = log.updates_since(since_version);
    let latest_content_update = candidates.iter().rev().find_map(|u| u.payload.as_content_update().map(|c| (u.id, c)));

    match latest_content_update {
        Some((version, content)) => Some(CrdtCheckpoint {
            id: 0,
            session_id: session_id.to_string(),
            version,
            snapshot_bytes: content.as_bytes().to_vec(),
            created_at_ms: now_ms(),
        }),
        None => {
            if !candidates.is_empty() {
                warn!(session_id, "checkpoint skipped: no full-content update since last fold");
            }
            None
        }
    }
}

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::UpdatePayload;

    fn snapshot(content: &str) -> UpdatePayload {
        UpdatePayload::FullContentSnapshot(serde_json::json!({ "type": "content_update", "content": content }))
    }

    #[test]
    fn due_by_update_count() {
        assert!(checkpoint_due(500, 0, 500, 20));
        assert!(!checkpoint_due(499, 0, 500, 20));
    }

    #[test]
    fn due_by_age() {
        assert!(checkpoint_due(0, 20, 500, 20));
        assert!(!checkpoint_due(0, 19, 500, 20));
    }

    #[test]
    fn fold_adopts_latest_content_update() {
        let mut log = UpdateLog::new();
        log.push("s1", "c1", snapshot("first"), None, 1 << 20, false).unwrap();
        log.push("s1", "c1", snapshot("second"), None, 1 << 20, false).unwrap();
        let checkpoint = fold("s1", &log, 0).unwrap();
        assert_eq!(checkpoint.snapshot_bytes, b"second");
        assert_eq!(checkpoint.version, 2);
    }

    #[test]
    fn fold_is_idempotent_with_no_new_updates() {
        let mut log = UpdateLog::new();
        log.push("s1", "c1", snapshot("only"), None, 1 << 20, false).unwrap();
        let first = fold("s1", &log, 0).unwrap();
        let second = fold("s1", &log, 0).unwrap();
        assert_eq!(first.snapshot_bytes, second.snapshot_bytes);
        assert_eq!(first.version, second.version);
    }

    #[test]
    fn fold_skips_when_no_content_update_present() {
        let mut log = UpdateLog::new();
        log.push("s1", "c1", UpdatePayload::FullContentSnapshot(serde_json::json!({"type": "other"})), None, 1 << 20, false).unwrap();
        assert!(fold("s1", &log, 0).is_none());
    }
}
