//! Dead-letter queue inspection and replay.

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use courier_common::error::AppError;
use courier_common::types::DeadLetterEntry;

use crate::state::AppState;

const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/dlq", get(list_dead_letters))
        .route("/api/dlq/replay", post(replay_dead_letters))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeadLetterListing {
    pub size: u64,
    pub entries: Vec<DeadLetterEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReplayParams {
    /// Entries to replay (default: 1).
    pub count: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReplayResult {
    pub replayed: usize,
}

/// GET /api/dlq — Oldest dead-letter entries, without removing them.
async fn list_dead_letters(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<DeadLetterListing>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .min(MAX_LIST_LIMIT);

    let size = state.dead_letters.size().await?;
    let entries = state.dead_letters.peek(limit).await?;
    Ok(Json(DeadLetterListing { size, entries }))
}

/// POST /api/dlq/replay — Move entries back onto the main queue.
async fn replay_dead_letters(
    State(state): State<AppState>,
    body: Option<Json<ReplayParams>>,
) -> Result<Json<ReplayResult>, AppError> {
    let Json(params) = body.unwrap_or_default();
    let count = params.count.unwrap_or(1);

    if count < 1 {
        return Err(AppError::Validation(
            "count must be an integer >= 1".to_string(),
        ));
    }
    let count = usize::try_from(count)
        .map_err(|_| AppError::Validation("count is too large".to_string()))?;

    let replayed = state.dead_letters.replay(count).await?;
    tracing::info!(requested = count, replayed, "DLQ replay requested via API");
    Ok(Json(ReplayResult { replayed }))
}
