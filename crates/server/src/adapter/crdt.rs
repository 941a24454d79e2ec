//! CRDT-style pipeline surface: opaque update blobs, presence, and explicit commit.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use base64::Engine;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;

use braid_core::checkpoint::fold;
use braid_core::contracts::AuthzProvider;
use braid_core::crdt::UpdatePayload;
use braid_core::heartbeat::HeartbeatStream;
use braid_core::materialize;

use crate::adapter::{frame, subscription_response};
use crate::error::Result;
use crate::registry::CrdtEvent;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CrdtJoinQuery {
    pub client_id: String,
}

/// `Init` plus the long-lived outbound stream: the first frame carries the session's latest
/// stored checkpoint so a joining client can seed its local state before replaying live updates.
pub async fn subscribe(
    Path((page_id, session_id)): Path<(String, String)>,
    Query(_query): Query<CrdtJoinQuery>,
    State(state): State<AppState>,
) -> Result<Response> {
    state.db.ensure_collab_session(&session_id, &page_id, now_ms()).await?;
    let checkpoint_bytes = state.db.latest_checkpoint_bytes(&session_id).await?.unwrap_or_default();
    let mut rx = state.crdt.subscribe(&session_id, &page_id);

    let stream = async_stream::stream! {
        yield Ok::<Bytes, std::io::Error>(frame(&json!({
            "type": "Init",
            "data": { "checkpoint_bytes": base64::engine::general_purpose::STANDARD.encode(&checkpoint_bytes) },
        })));
        loop {
            match rx.recv().await {
                Ok(event) => yield Ok(frame(&event)),
                Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(_)) => yield Ok(frame(&json!({ "type": "Error", "data": "stream lagged, resync required" }))),
            }
        }
    };
    let stream = HeartbeatStream::new(Box::pin(stream), Duration::from_secs(15));
    Ok(subscription_response(stream))
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "PascalCase")]
pub enum Inbound {
    Init { client_id: String, client_vector_json: Option<serde_json::Value> },
    Push { client_id: String, payload: UpdatePayload, vector_clock_json: Option<serde_json::Value> },
    Presence { presence_json: serde_json::Value },
    Commit { author: String, message: String },
}

pub async fn push(Path((page_id, session_id)): Path<(String, String)>, State(state): State<AppState>, Json(body): Json<Inbound>) -> Result<Json<serde_json::Value>> {
    let handle = state.crdt.get_or_create(&session_id, &page_id);

    let reply = match body {
        Inbound::Init { client_id, .. } => {
            state.db.ensure_collab_session(&session_id, &page_id, now_ms()).await?;
            json!({ "ok": true, "client_id": client_id })
        }
        Inbound::Push { client_id, payload, vector_clock_json } => {
            state.authz.ensure_can_edit(&client_id, &page_id).await?;
            let config = &state.config.collab;
            let update = {
                let mut log = handle.log.lock();
                log.push(&session_id, &client_id, payload.clone(), vector_clock_json.clone(), config.max_update_bytes, config.accept_crdt_deltas)?
            };
            let payload_bytes = serde_json::to_vec(&payload).unwrap_or_default();
            let vector_json = vector_clock_json.as_ref().map(|v| v.to_string());
            state.db.append_update(&session_id, update.id, &client_id, vector_json.as_deref(), &payload_bytes, update.created_at_ms).await?;
            let _ = handle.tx.send(CrdtEvent::Update { id: update.id, client_id, payload });
            json!({ "ok": true, "id": update.id })
        }
        Inbound::Presence { presence_json } => {
            handle.meta.lock().awareness_json = Some(presence_json.clone());
            let _ = handle.tx.send(CrdtEvent::Presence { presence_json });
            json!({ "ok": true })
        }
        Inbound::Commit { author, message } => {
            state.authz.ensure_can_edit(&author, &page_id).await?;
            let folded = {
                let log = handle.log.lock();
                fold(&session_id, &log, 0)
            };
            let snapshot_bytes = match &folded {
                Some(checkpoint) => checkpoint.snapshot_bytes.clone(),
                None => state.db.latest_checkpoint_bytes(&session_id).await?.unwrap_or_default(),
            };
            if let Some(checkpoint) = &folded {
                state.db.store_checkpoint(&session_id, checkpoint.version, &checkpoint.snapshot_bytes, checkpoint.created_at_ms).await?;
                handle.meta.lock().checkpoint_version = checkpoint.version;
                *handle.last_checkpoint_at_ms.lock() = now_ms();
            }

            let fields = materialize::materialize(&snapshot_bytes);
            let revision_id = materialize::commit(state.db.as_ref(), state.db.as_ref(), &page_id, &author, &message, &snapshot_bytes).await?;
            state.activity.log_commit(&author, &page_id, &page_id, &fields.title, &message).await;
            let _ = handle.tx.send(CrdtEvent::Checkpoint { version: handle.meta.lock().checkpoint_version });
            json!({ "ok": true, "revision_id": revision_id })
        }
    };
    Ok(Json(reply))
}

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as i64
}
