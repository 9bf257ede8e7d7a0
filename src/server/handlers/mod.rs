use axum::{
    Json, Router,
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::server::AppState;

mod chat;
mod stream;

pub use stream::NDJSON_CONTENT_TYPE;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/chat", post(chat::process_message))
        .route("/api/chat/stream", post(stream::process_streaming_message))
        .route("/health", get(health))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
