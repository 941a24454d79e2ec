//! Session state (C3): the in-memory record for one page's live collaborative edit.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::operation::Operation;

/// A connected user's presence in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPresence {
    pub user_id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub color: String,
    pub joined_at_ms: i64,
    pub last_seen_ms: i64,
    pub last_cursor: Option<Cursor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cursor {
    pub start: usize,
    pub end: usize,
    pub timestamp_ms: i64,
}

const COLOR_PALETTE: &[&str] = &[
    "#e6194b", "#3cb44b", "#ffe119", "#4363d8", "#f58231", "#911eb4", "#46f0f0", "#f032e6", "#bcf60c", "#fabebe",
];

/// Stable per-user color, derived from a hash of `user_id` so it survives reconnects.
pub fn deterministic_color(user_id: &str) -> &'static str {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    let digest = hasher.finalize();
    let idx = digest[0] as usize % COLOR_PALETTE.len();
    COLOR_PALETTE[idx]
}

/// A snapshot of a session suitable for sending to a newly joined client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentState {
    pub content: String,
    pub global_sequence_number: u64,
    pub content_hash: String,
}

/// The per-page in-memory collaborative session.
pub struct Session {
    pub page_id: String,
    pub current_content: String,
    pub global_sequence_number: u64,
    pub created_at_ms: i64,
    pub last_activity_ms: i64,
    pub connected_users: HashMap<String, UserPresence>,
    pub operation_history: Vec<Operation>,
    pub per_client_last_seen_seq: HashMap<String, u64>,
    max_history: usize,
}

impl Session {
    pub fn new(page_id: impl Into<String>, initial_content: String, max_history: usize) -> Self {
        let now = now_ms();
        Self {
            page_id: page_id.into(),
            current_content: initial_content,
            global_sequence_number: 0,
            created_at_ms: now,
            last_activity_ms: now,
            connected_users: HashMap::new(),
            operation_history: Vec::new(),
            per_client_last_seen_seq: HashMap::new(),
            max_history,
        }
    }

    pub fn content_hash(&self) -> String {
        content_hash(&self.current_content)
    }

    pub fn document_state(&self) -> DocumentState {
        DocumentState {
            content: self.current_content.clone(),
            global_sequence_number: self.global_sequence_number,
            content_hash: self.content_hash(),
        }
    }

    /// Append an already-sequenced, already-applied operation to history, then evict any
    /// history prefix that every connected client has already acknowledged.
    pub fn append(&mut self, op: Operation) {
        self.global_sequence_number = op.server_sequence_number;
        self.last_activity_ms = now_ms();
        self.operation_history.push(op);
        self.evict_acknowledged_prefix();
    }

    /// Every operation with `server_sequence_number > since` still held in history.
    pub fn operations_since(&self, since: u64) -> Vec<Operation> {
        self.operation_history.iter().filter(|o| o.server_sequence_number > since).cloned().collect()
    }

    /// Whether `since` can be served from retained history (false implies a full resync).
    pub fn has_history_since(&self, since: u64) -> bool {
        if since >= self.global_sequence_number {
            return true;
        }
        self.operation_history.first().map(|o| o.server_sequence_number <= since + 1).unwrap_or(since == 0)
    }

    pub fn add_user(&mut self, user_id: impl Into<String>, display_name: impl Into<String>, email: Option<String>) -> UserPresence {
        let user_id = user_id.into();
        let now = now_ms();
        let presence = UserPresence {
            color: deterministic_color(&user_id).to_string(),
            user_id: user_id.clone(),
            display_name: display_name.into(),
            email,
            joined_at_ms: now,
            last_seen_ms: now,
            last_cursor: None,
        };
        self.connected_users.insert(user_id.clone(), presence.clone());
        self.per_client_last_seen_seq.entry(user_id).or_insert(self.global_sequence_number);
        presence
    }

    pub fn remove_user(&mut self, user_id: &str) {
        self.connected_users.remove(user_id);
        self.evict_acknowledged_prefix();
    }

    pub fn update_cursor(&mut self, user_id: &str, cursor: Cursor) {
        if let Some(presence) = self.connected_users.get_mut(user_id) {
            presence.last_seen_ms = cursor.timestamp_ms;
            presence.last_cursor = Some(cursor);
        }
    }

    pub fn mark_client_seen(&mut self, user_id: &str, seq: u64) {
        self.per_client_last_seen_seq.insert(user_id.to_string(), seq);
        self.evict_acknowledged_prefix();
    }

    pub fn is_idle(&self, idle_timeout_ms: i64) -> bool {
        self.connected_users.is_empty() && now_ms() - self.last_activity_ms >= idle_timeout_ms
    }

    /// Evict the oldest history entries once we exceed `max_history`, but never past the
    /// minimum acknowledged sequence among currently connected users.
    fn evict_acknowledged_prefix(&mut self) {
        if self.operation_history.len() <= self.max_history {
            return;
        }
        let floor = self
            .connected_users
            .keys()
            .filter_map(|u| self.per_client_last_seen_seq.get(u))
            .copied()
            .min()
            .unwrap_or(u64::MAX);

        let excess = self.operation_history.len() - self.max_history;
        let mut evict_count = 0;
        for op in self.operation_history.iter().take(excess) {
            if op.server_sequence_number > floor {
                break;
            }
            evict_count += 1;
        }
        if evict_count > 0 {
            self.operation_history.drain(..evict_count);
        }
    }
}

pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as i64
}
