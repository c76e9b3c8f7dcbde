//! Enqueue endpoint used by producers.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use courier_common::error::AppError;
use courier_common::types::{Message, Payload};
use courier_notifier::enqueue;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/notifications", post(enqueue_notification))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueParams {
    /// Notification record id; generated when omitted.
    pub id: Option<String>,
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    /// Delivery data interpreted by the notifier (`mobileNumber`, `customMessage`, ...).
    pub data: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EnqueueResult {
    pub id: String,
    pub depth: u64,
}

/// POST /api/notifications — Push a notification onto the main queue.
async fn enqueue_notification(
    State(state): State<AppState>,
    Json(params): Json<EnqueueParams>,
) -> Result<Json<EnqueueResult>, AppError> {
    if !params.data.is_object() {
        return Err(AppError::Validation("data must be a JSON object".to_string()));
    }

    let id = match params.id {
        Some(id) if id.trim().is_empty() => {
            return Err(AppError::Validation("id must not be empty".to_string()));
        }
        Some(id) => id,
        None => Uuid::new_v4().to_string(),
    };

    let mut payload = Payload::new();
    if let Some(tenant_id) = params.tenant_id {
        payload.insert("tenantId", tenant_id.into());
    }
    if let Some(user_id) = params.user_id {
        payload.insert("userId", user_id.into());
    }
    payload.insert("data", params.data);

    let depth = enqueue(
        state.store.as_ref(),
        &state.config.main_queue,
        Message::new(id.clone(), payload),
    )
    .await?;

    Ok(Json(EnqueueResult { id, depth }))
}
