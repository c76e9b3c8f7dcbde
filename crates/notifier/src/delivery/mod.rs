//! Delivery actions — the side effect performed for each dequeued message.
//!
//! An action reports ordinary business failures as [`DeliveryOutcome::Failure`]
//! so the retry policy can handle them. Only faults that make the message
//! unprocessable (an unusable payload) come back as [`DeliveryError`]; the
//! consumer drops such messages without requeueing.

pub mod failure;
pub mod record;
pub mod transport;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use courier_common::types::Message;

pub use failure::{FailureStrategy, FlakyTransport, NeverFail, RandomFailure};
pub use record::{LogRecordStore, PgRecordStore, RecordStore};
pub use transport::{LogTransport, NotificationTransport, TransportError, WebhookTransport};

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Success,
    /// The attempt failed; the string is the human-readable reason.
    Failure(String),
}

/// Faults that make a message undeliverable regardless of retries.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Invalid payload for message {id}: {reason}")]
    InvalidPayload { id: String, reason: String },

    #[error("Delivery fault: {0}")]
    Fatal(String),
}

/// Pluggable unit that performs the delivery side effect.
#[async_trait]
pub trait DeliveryAction: Send + Sync {
    async fn execute(&self, message: &Message) -> Result<DeliveryOutcome, DeliveryError>;

    /// Called once `message` has been parked on the dead-letter queue.
    async fn on_dead_letter(&self, _message: &Message, _reason: &str) {}
}

/// Typed WhatsApp notification, validated out of a message payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppNotification {
    pub message_id: String,
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    pub mobile_number: String,
    pub custom_message: String,
    /// Producer timestamp in epoch milliseconds.
    pub date: Option<i64>,
}

/// Shape of the `data` field written by the producer.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationData {
    mobile_number: String,
    custom_message: String,
    #[serde(default)]
    date: Option<i64>,
}

impl WhatsAppNotification {
    /// Validate `message.payload` into a notification.
    ///
    /// Expects `{"data": {"mobileNumber", "customMessage", "date"?}}` plus
    /// optional top-level `tenantId` / `userId`.
    pub fn from_message(message: &Message) -> Result<Self, DeliveryError> {
        let invalid = |reason: String| DeliveryError::InvalidPayload {
            id: message.id.clone(),
            reason,
        };

        let data = message
            .payload
            .get("data")
            .ok_or_else(|| invalid("missing `data` field".to_string()))?;

        let data: NotificationData =
            serde_json::from_value(data.clone()).map_err(|e| invalid(e.to_string()))?;

        if data.mobile_number.trim().is_empty() {
            return Err(invalid("empty mobile number".to_string()));
        }

        let text_field = |key: &str| {
            message
                .payload
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };

        Ok(Self {
            message_id: message.id.clone(),
            tenant_id: text_field("tenantId"),
            user_id: text_field("userId"),
            mobile_number: data.mobile_number,
            custom_message: data.custom_message,
            date: data.date,
        })
    }
}

/// Production delivery: send over WhatsApp, then mark the record delivered.
pub struct WhatsAppDelivery {
    transport: Arc<dyn NotificationTransport>,
    records: Arc<dyn RecordStore>,
}

impl WhatsAppDelivery {
    pub fn new(transport: Arc<dyn NotificationTransport>, records: Arc<dyn RecordStore>) -> Self {
        Self { transport, records }
    }
}

#[async_trait]
impl DeliveryAction for WhatsAppDelivery {
    async fn execute(&self, message: &Message) -> Result<DeliveryOutcome, DeliveryError> {
        let notification = WhatsAppNotification::from_message(message)?;

        if let Err(e) = self.transport.send(&notification).await {
            tracing::warn!(
                message_id = %message.id,
                error = %e,
                "WhatsApp transport failed"
            );
            return Ok(DeliveryOutcome::Failure(e.to_string()));
        }

        // Already consumed from the queue; a failed status update is not retried.
        if let Err(e) = self.records.mark_delivered(&message.id).await {
            tracing::warn!(
                message_id = %message.id,
                error = %e,
                "Failed to mark notification as delivered"
            );
        }

        Ok(DeliveryOutcome::Success)
    }

    async fn on_dead_letter(&self, message: &Message, reason: &str) {
        if let Err(e) = self.records.mark_failed(&message.id, reason).await {
            tracing::warn!(
                message_id = %message.id,
                error = %e,
                "Failed to mark notification as failed"
            );
        }
    }
}
