//! Health check endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// GET /health — Service info plus queue store reachability and depths.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let store = state.store.as_ref();

    let depths = async {
        store.ping().await?;
        let main = store.len(&state.config.main_queue).await?;
        let dlq = store.len(&state.config.dead_letter_queue).await?;
        Ok::<_, courier_notifier::StoreError>((main, dlq))
    }
    .await;

    match depths {
        Ok((main, dlq)) => {
            let mut queues = serde_json::Map::new();
            queues.insert(state.config.main_queue.clone(), json!(main));
            queues.insert(state.config.dead_letter_queue.clone(), json!(dlq));
            (
                StatusCode::OK,
                Json(json!({
                    "status": "ok",
                    "service": "courier-api",
                    "version": env!("CARGO_PKG_VERSION"),
                    "queues": queues,
                })),
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "Queue store health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "service": "courier-api",
                    "version": env!("CARGO_PKG_VERSION"),
                    "error": e.to_string(),
                })),
            )
        }
    }
}
