//! HTTP routing: wires the connection adapter's subscribe/push pairs plus health.

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::adapter::{crdt, ot};
use crate::state::AppState;

pub fn build(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/pages/{page_id}/edit", get(ot::subscribe).put(ot::push))
        .route("/pages/{page_id}/crdt/{session_id}", get(crdt::subscribe).put(crdt::push))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "OK"
}
