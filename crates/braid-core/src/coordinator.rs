//! Session coordinator (C4): the single writer per page, fan-out to peers, join/resync protocol.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex as SyncMutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tracing::{info, warn};

use crate::config::CollabConfig;
use crate::contracts::AuthzProvider;
use crate::error::{CollabError, Result};
use crate::operation::Operation;
use crate::session::{Cursor, DocumentState, Session, UserPresence};
use crate::transform::transform_against_history;

/// Messages fanned out to every connected peer of a session (outbound half of C8's catalog).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OutboundEvent {
    DocumentState(DocumentState),
    UserList(Vec<UserPresence>),
    UserJoined(UserPresence),
    UserLeft(String),
    ReceiveOperation(Operation),
    OperationConfirmed { operation_id: String, server_sequence_number: u64 },
    OperationRejected { operation_id: String, reason: String },
    ReceiveCursor { user_id: String, cursor: Cursor },
    OperationsSinceState(Vec<Operation>),
    StateVerified(u64),
    RequiredResync(DocumentState),
    Error(String),
}

struct SessionHandle {
    session: AsyncMutex<Session>,
    tx: broadcast::Sender<OutboundEvent>,
    _keepalive: broadcast::Receiver<OutboundEvent>,
}

/// Registry of live sessions, keyed by page id, plus the single-writer coordination logic.
pub struct Coordinator<A: AuthzProvider> {
    sessions: SyncMutex<HashMap<String, Arc<SessionHandle>>>,
    authz: Arc<A>,
    config: CollabConfig,
}

impl<A: AuthzProvider> Coordinator<A> {
    pub fn new(authz: Arc<A>, config: CollabConfig) -> Self {
        Self { sessions: SyncMutex::new(HashMap::new()), authz, config }
    }

    fn get_or_create(&self, page_id: &str, initial_content: String) -> Arc<SessionHandle> {
        let mut sessions = self.sessions.lock();
        sessions
            .entry(page_id.to_string())
            .or_insert_with(|| {
                let (tx, keepalive) = broadcast::channel(1024);
                Arc::new(SessionHandle {
                    session: AsyncMutex::new(Session::new(page_id, initial_content, self.config.max_operation_history_size)),
                    tx,
                    _keepalive: keepalive,
                })
            })
            .clone()
    }

    pub fn subscribe(&self, page_id: &str, initial_content: String) -> broadcast::Receiver<OutboundEvent> {
        self.get_or_create(page_id, initial_content).tx.subscribe()
    }

    /// Join protocol: register presence, return the document state and current user list, and
    /// announce the join to existing peers.
    pub async fn join(
        &self,
        page_id: &str,
        initial_content: String,
        user_id: &str,
        display_name: &str,
        email: Option<String>,
    ) -> Result<(DocumentState, Vec<UserPresence>)> {
        self.authz.ensure_can_edit(user_id, page_id).await?;
        let handle = self.get_or_create(page_id, initial_content);
        let mut session = handle.session.lock().await;
        if session.connected_users.len() >= self.config.max_concurrent_users_per_session {
            return Err(CollabError::Conflict("session is at capacity".into()));
        }
        let presence = session.add_user(user_id, display_name, email);
        let state = session.document_state();
        let users = session.connected_users.values().cloned().collect();
        let _ = handle.tx.send(OutboundEvent::UserJoined(presence));
        info!(page_id, user_id, "joined collaborative session");
        Ok((state, users))
    }

    pub async fn leave(&self, page_id: &str, user_id: &str) {
        let Some(handle) = self.sessions.lock().get(page_id).cloned() else { return };
        let mut session = handle.session.lock().await;
        session.remove_user(user_id);
        let _ = handle.tx.send(OutboundEvent::UserLeft(user_id.to_string()));
    }

    /// Single-writer drain step (§4.4 steps 1-8): validate, transform against history, apply,
    /// assign sequence, broadcast, acknowledge.
    pub async fn submit_operation(&self, page_id: &str, op: Operation) -> Result<()> {
        self.authz.ensure_can_edit(&op.user_id, page_id).await?;
        let handle = self.sessions.lock().get(page_id).cloned().ok_or_else(|| CollabError::NotFound(page_id.to_string()))?;

        if !op.is_well_formed() {
            let _ = handle.tx.send(OutboundEvent::OperationRejected { operation_id: op.operation_id.clone(), reason: "malformed operation".into() });
            return Err(CollabError::BadOperation(op.operation_id));
        }

        let mut session = handle.session.lock().await;

        let transformed = transform_against_history(&op, session.operation_history.iter());
        let Some(mut transformed) = transformed else {
            let _ = handle.tx.send(OutboundEvent::OperationRejected { operation_id: op.operation_id.clone(), reason: "conflict".into() });
            return Err(CollabError::Conflict(op.operation_id));
        };

        if transformed.is_noop() {
            let _ = handle.tx.send(OutboundEvent::OperationConfirmed {
                operation_id: transformed.operation_id.clone(),
                server_sequence_number: session.global_sequence_number,
            });
            return Ok(());
        }

        if !transformed.can_apply_to(&session.current_content) {
            let _ = handle.tx.send(OutboundEvent::OperationRejected { operation_id: transformed.operation_id.clone(), reason: "conflict".into() });
            return Err(CollabError::Conflict(transformed.operation_id));
        }

        let new_content = transformed.apply(&session.current_content)?;
        transformed.server_sequence_number = session.global_sequence_number + 1;
        transformed.server_timestamp_ms = Some(now_ms());
        session.current_content = new_content;
        session.append(transformed.clone());
        session.mark_client_seen(&op.user_id, transformed.server_sequence_number);

        if handle.tx.send(OutboundEvent::ReceiveOperation(transformed.clone())).is_err() {
            warn!(page_id, "no subscribers to receive broadcast operation");
        }
        let _ = handle.tx.send(OutboundEvent::OperationConfirmed {
            operation_id: op.operation_id.clone(),
            server_sequence_number: transformed.server_sequence_number,
        });

        Ok(())
    }

    pub async fn update_cursor(&self, page_id: &str, user_id: &str, cursor: Cursor) {
        let Some(handle) = self.sessions.lock().get(page_id).cloned() else { return };
        let mut session = handle.session.lock().await;
        session.update_cursor(user_id, cursor.clone());
        let _ = handle.tx.send(OutboundEvent::ReceiveCursor { user_id: user_id.to_string(), cursor });
    }

    /// Resync protocol: compare the client's last-seen sequence and content hash against the
    /// session's actual state and reply with the cheapest sufficient correction.
    pub async fn request_state_sync(&self, page_id: &str, user_id: &str, client_seq: u64, client_hash: &str) -> Result<OutboundEvent> {
        let handle = self.sessions.lock().get(page_id).cloned().ok_or_else(|| CollabError::NotFound(page_id.to_string()))?;
        let mut session = handle.session.lock().await;

        let event = if client_seq == session.global_sequence_number && client_hash == session.content_hash() {
            OutboundEvent::StateVerified(session.global_sequence_number)
        } else if client_seq < session.global_sequence_number && session.has_history_since(client_seq) {
            OutboundEvent::OperationsSinceState(session.operations_since(client_seq))
        } else {
            OutboundEvent::RequiredResync(session.document_state())
        };

        session.mark_client_seen(user_id, session.global_sequence_number);
        Ok(event)
    }

    pub async fn is_idle(&self, page_id: &str, idle_timeout_ms: i64) -> bool {
        let Some(handle) = self.sessions.lock().get(page_id).cloned() else { return false };
        handle.session.lock().await.is_idle(idle_timeout_ms)
    }

    /// Reclaim sessions with no connected users that have been idle past the configured timeout.
    pub async fn reclaim_idle_sessions(&self) -> Vec<String> {
        let idle_timeout_ms = self.config.session_timeout().as_millis() as i64;
        let candidates: Vec<(String, Arc<SessionHandle>)> = self.sessions.lock().iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let mut reclaimed = Vec::new();
        for (page_id, handle) in candidates {
            if handle.session.lock().await.is_idle(idle_timeout_ms) {
                reclaimed.push(page_id);
            }
        }
        if !reclaimed.is_empty() {
            let mut sessions = self.sessions.lock();
            for page_id in &reclaimed {
                sessions.remove(page_id);
            }
        }
        reclaimed
    }
}

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::AllowAllAuthz;
    use crate::operation::OperationKind;

    fn coordinator() -> Coordinator<AllowAllAuthz> {
        Coordinator::new(Arc::new(AllowAllAuthz), CollabConfig::default())
    }

    #[tokio::test]
    async fn join_then_sequential_insert() {
        let coord = coordinator();
        let mut rx = coord.subscribe("page-1", String::new());
        coord.join("page-1", String::new(), "alice", "Alice", None).await.unwrap();
        let _ = rx.recv().await; // UserJoined

        let op = Operation::new("alice", OperationKind::Insert { position: 0, content: "Hello".into() }, 0, 0);
        coord.submit_operation("page-1", op).await.unwrap();

        let event = rx.recv().await.unwrap();
        match event {
            OutboundEvent::ReceiveOperation(op) => assert_eq!(op.server_sequence_number, 1),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn concurrent_inserts_converge_via_transform() {
        let coord = coordinator();
        coord.join("page-1", "AB".to_string(), "alice", "Alice", None).await.unwrap();
        let mut rx = coord.subscribe("page-1", "AB".to_string());

        let a = Operation::new("alice", OperationKind::Insert { position: 1, content: "X".into() }, 0, 0);
        coord.submit_operation("page-1", a).await.unwrap();
        let b = Operation::new("bob", OperationKind::Insert { position: 1, content: "Y".into() }, 0, 0);
        coord.submit_operation("page-1", b).await.unwrap();

        // Drain events until we've seen two ReceiveOperation broadcasts, then check final content.
        let mut seen = 0;
        while seen < 2 {
            if let OutboundEvent::ReceiveOperation(_) = rx.recv().await.unwrap() {
                seen += 1;
            }
        }
        let handle = coord.sessions.lock().get("page-1").cloned().unwrap();
        let session = handle.session.lock().await;
        assert_eq!(session.current_content, "AXYB");
    }

    #[tokio::test]
    async fn resync_reports_state_verified_when_in_sync() {
        let coord = coordinator();
        coord.join("page-1", "hello".to_string(), "alice", "Alice", None).await.unwrap();
        let hash = crate::session::content_hash("hello");
        let event = coord.request_state_sync("page-1", "alice", 0, &hash).await.unwrap();
        assert!(matches!(event, OutboundEvent::StateVerified(0)));
    }

    #[tokio::test]
    async fn resync_requires_full_resync_when_hash_diverges() {
        let coord = coordinator();
        coord.join("page-1", "hello".to_string(), "alice", "Alice", None).await.unwrap();
        let event = coord.request_state_sync("page-1", "alice", 0, "wrong-hash").await.unwrap();
        assert!(matches!(event, OutboundEvent::RequiredResync(_)));
    }

    #[tokio::test]
    async fn malformed_operation_is_rejected_without_mutating_state() {
        let coord = coordinator();
        coord.join("page-1", "abc".to_string(), "alice", "Alice", None).await.unwrap();
        let bad = Operation::new("alice", OperationKind::Insert { position: 0, content: String::new() }, 0, 0);
        let result = coord.submit_operation("page-1", bad).await;
        assert!(result.is_err());
        let handle = coord.sessions.lock().get("page-1").cloned().unwrap();
        assert_eq!(handle.session.lock().await.current_content, "abc");
    }
}
