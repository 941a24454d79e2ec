//! Operational-transform pipeline surface: `GET .../edit` subscribes, `PUT .../edit` pushes one
//! of the inbound messages from the OT half of the wire catalog.

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use bytes::Bytes;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;

use braid_core::coordinator::OutboundEvent;
use braid_core::heartbeat::HeartbeatStream;
use braid_core::session::Cursor;
use braid_core::Operation;

use crate::adapter::{frame, subscription_response};
use crate::ctx::Ctx;
use crate::error::Result;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct JoinQuery {
    pub display_name: String,
    pub email: Option<String>,
}

/// `JoinEditRoom` plus the long-lived outbound stream for this user's session.
pub async fn subscribe(Path(page_id): Path<String>, Query(query): Query<JoinQuery>, ctx: Ctx, State(state): State<AppState>) -> Result<Response> {
    let initial_content = state.db.load_committed_content(&page_id).await?.unwrap_or_default();
    let mut rx = state.coordinator.subscribe(&page_id, initial_content.clone());
    let (doc_state, users) = state
        .coordinator
        .join(&page_id, initial_content, ctx.user_id(), &query.display_name, query.email)
        .await?;

    let stream = async_stream::stream! {
        yield Ok::<Bytes, std::io::Error>(frame(&OutboundEvent::DocumentState(doc_state)));
        yield Ok(frame(&OutboundEvent::UserList(users)));
        loop {
            match rx.recv().await {
                Ok(event) => yield Ok(frame(&event)),
                Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(_)) => yield Ok(frame(&OutboundEvent::Error("stream lagged, resync required".into()))),
            }
        }
    };
    let stream = HeartbeatStream::new(Box::pin(stream), Duration::from_secs(15));
    Ok(subscription_response(stream))
}

/// The remaining OT inbound messages, dispatched by tag. `RequestDocumentSync`,
/// `RequestOperationsSince`, and `UpdateClientState` are all sub-cases of the one
/// `RequestStateSync` call — the coordinator already picks the cheapest sufficient reply
/// (`StateVerified` / `OperationsSinceState` / `RequiredResync`) from a single (seq, hash) pair.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "PascalCase")]
pub enum Inbound {
    LeaveEditRoom,
    SendTextOperation { operation: Operation },
    SendCursorUpdate { cursor: Cursor },
    RequestStateSync { client_seq: u64, client_content_hash: String },
}

pub async fn push(Path(page_id): Path<String>, ctx: Ctx, State(state): State<AppState>, Json(body): Json<Inbound>) -> Result<Json<serde_json::Value>> {
    let reply = match body {
        Inbound::LeaveEditRoom => {
            state.coordinator.leave(&page_id, ctx.user_id()).await;
            serde_json::json!({ "ok": true })
        }
        Inbound::SendTextOperation { operation } => {
            state.coordinator.submit_operation(&page_id, operation).await?;
            serde_json::json!({ "ok": true })
        }
        Inbound::SendCursorUpdate { cursor } => {
            state.coordinator.update_cursor(&page_id, ctx.user_id(), cursor).await;
            serde_json::json!({ "ok": true })
        }
        Inbound::RequestStateSync { client_seq, client_content_hash } => {
            let event = state.coordinator.request_state_sync(&page_id, ctx.user_id(), client_seq, &client_content_hash).await?;
            serde_json::to_value(event).unwrap_or(serde_json::Value::Null)
        }
    };
    Ok(Json(reply))
}
