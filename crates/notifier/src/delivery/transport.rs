//! Outbound notification transports.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

use super::WhatsAppNotification;

/// Longest response body kept in a rejection reason.
const MAX_BODY_IN_REASON: usize = 256;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook rejected notification with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Simulated transport failure")]
    Injected,
}

/// Sends a notification to the recipient.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn send(&self, notification: &WhatsAppNotification) -> Result<(), TransportError>;
}

/// HTTP webhook transport for a WhatsApp messaging provider.
pub struct WebhookTransport {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl WebhookTransport {
    pub fn new(
        url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            token,
        })
    }
}

#[async_trait]
impl NotificationTransport for WebhookTransport {
    async fn send(&self, notification: &WhatsAppNotification) -> Result<(), TransportError> {
        let body = json!({
            "to": notification.mobile_number,
            "type": "text",
            "text": { "body": notification.custom_message },
            "reference": notification.message_id,
        });

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let mut text = response.text().await.unwrap_or_default();
            if text.len() > MAX_BODY_IN_REASON {
                let mut cut = MAX_BODY_IN_REASON;
                while !text.is_char_boundary(cut) {
                    cut -= 1;
                }
                text.truncate(cut);
            }
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }

        tracing::debug!(
            message_id = %notification.message_id,
            status = status.as_u16(),
            "WhatsApp webhook accepted notification"
        );
        Ok(())
    }
}

/// Transport that only logs; used when no webhook is configured.
pub struct LogTransport;

#[async_trait]
impl NotificationTransport for LogTransport {
    async fn send(&self, notification: &WhatsAppNotification) -> Result<(), TransportError> {
        tracing::info!(
            message_id = %notification.message_id,
            to = %notification.mobile_number,
            "Sending WhatsApp notification (log transport)"
        );
        Ok(())
    }
}
