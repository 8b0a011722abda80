//! Liveness endpoint

use axum::{Json, extract::State};
use serde_json::{Value, json};
use tracing::warn;

use crate::state::AppState;

/// `GET /health`
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let store = state.store.health_check().await.unwrap_or_else(|e| {
        warn!("Document store health check failed: {}", e);
        false
    });
    let sessions = state.sessions.health_check().await.unwrap_or_else(|e| {
        warn!("Session store health check failed: {}", e);
        false
    });

    Json(json!({
        "status": if store && sessions { "ok" } else { "degraded" },
        "service": "api",
        "store": store,
        "sessions": sessions
    }))
}
