use std::time::Duration;

use axum::extract::{Path, Query, State};
use futures::StreamExt;
use server::adapter::ot::{subscribe, JoinQuery};
use server::config::ServerConfig;
use server::db::Db;
use server::state::AppState;

use braid_core::contracts::{NewRevision, PageFields, PageStore, RevisionStore};
use braid_core::materialize::commit;

async fn test_state() -> (AppState, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig::with_base_dir(dir.path());
    let state = AppState::new(config).await.unwrap();
    (state, dir)
}

#[tokio::test]
async fn commit_round_trip_is_idempotent_with_no_intervening_updates() {
    let dir = tempfile::tempdir().unwrap();
    let db = Db::connect(&dir.path().join("wiki.sqlite")).await.unwrap();

    let snapshot = serde_json::json!({
        "blocks": [
            { "type": "heading", "text": "Design Notes" },
            { "type": "paragraph", "text": "First revision body." },
        ]
    })
    .to_string();

    let id1 = commit(&db, &db, "page-1", "alice", "v1", snapshot.as_bytes()).await.unwrap();
    let id2 = commit(&db, &db, "page-1", "alice", "v2", snapshot.as_bytes()).await.unwrap();
    assert!(id2 > id1);

    let content = db.load_committed_content("page-1").await.unwrap().unwrap();
    assert!(content.contains("First revision body."));
}

#[tokio::test]
async fn revision_store_insert_assigns_increasing_ids() {
    let dir = tempfile::tempdir().unwrap();
    let db = Db::connect(&dir.path().join("wiki.sqlite")).await.unwrap();

    let base = NewRevision {
        page_id: "page-1".into(),
        author: "alice".into(),
        note: "note".into(),
        snapshot: "body".into(),
        format: "markdown".into(),
        opaque_update_bytes: None,
    };
    let id1 = db.insert(base.clone()).await.unwrap();
    let id2 = db.insert(base).await.unwrap();
    assert!(id2 > id1);
}

#[tokio::test]
async fn page_store_round_trips_committed_fields() {
    let dir = tempfile::tempdir().unwrap();
    let db = Db::connect(&dir.path().join("wiki.sqlite")).await.unwrap();

    assert!(db.load_committed_content("missing").await.unwrap().is_none());

    let fields = PageFields { title: "T".into(), summary: "S".into(), body: "B".into(), body_format: "markdown".into() };
    db.apply_commit("page-1", "alice", &fields).await.unwrap();
    assert_eq!(db.load_committed_content("page-1").await.unwrap().unwrap(), "B");
}

#[tokio::test]
async fn crdt_registry_flags_checkpoint_due_after_update_threshold() {
    let (state, _dir) = test_state().await;
    let handle = state.crdt.get_or_create("session-1", "page-1");
    {
        let mut log = handle.log.lock();
        for i in 0..3 {
            let payload = braid_core::crdt::UpdatePayload::FullContentSnapshot(
                serde_json::json!({ "type": "content_update", "content": format!("rev-{i}") }),
            );
            log.push("session-1", "client-a", payload, None, 1 << 20, false).unwrap();
        }
    }
    assert!(state.crdt.due_for_checkpoint(3, 3600).iter().any(|(id, _)| id == "session-1"));
    assert!(state.crdt.due_for_checkpoint(10, 3600).is_empty());
}

#[tokio::test]
async fn ot_subscribe_streams_document_state_as_first_frame() {
    let (state, _dir) = test_state().await;
    let response = subscribe(
        Path("page-1".to_string()),
        Query(JoinQuery { display_name: "Alice".into(), email: None }),
        server::ctx::Ctx::new("alice".into()),
        State(state),
    )
    .await
    .unwrap();

    assert_eq!(response.status().as_u16(), 209);

    let mut stream = response.into_body().into_data_stream();
    let first = tokio::time::timeout(Duration::from_secs(1), stream.next()).await.unwrap().unwrap().unwrap();
    let frame: serde_json::Value = serde_json::from_slice(&first).unwrap();
    assert_eq!(frame["type"], "document_state");
    assert_eq!(frame["data"]["content"], "");
}
