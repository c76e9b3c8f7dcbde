//! Record store — marks notification records as delivered or failed.
//!
//! Called after a successful send, or once a message is dead-lettered. The
//! message has already left the queue, so errors here are reported to the
//! caller for logging only.

use async_trait::async_trait;
use sqlx::PgPool;

use courier_common::types::DeliveryStatus;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Idempotently mark the notification `id` as sent.
    async fn mark_delivered(&self, id: &str) -> anyhow::Result<()>;

    /// Mark the notification `id` as failed with `reason`. A record already
    /// marked sent is left alone.
    async fn mark_failed(&self, id: &str, reason: &str) -> anyhow::Result<()>;
}

/// PostgreSQL-backed record store (`notifications` table).
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn mark_delivered(&self, id: &str) -> anyhow::Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET status = $1, sent_at = COALESCE(sent_at, NOW()), error_detail = NULL
            WHERE id = $2
            "#,
        )
        .bind(DeliveryStatus::Sent)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!(notification_id = %id, "No notification record to mark as sent");
        } else {
            tracing::debug!(notification_id = %id, status = %DeliveryStatus::Sent, "Notification record updated");
        }

        Ok(())
    }

    async fn mark_failed(&self, id: &str, reason: &str) -> anyhow::Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET status = $1, error_detail = $2
            WHERE id = $3 AND status <> 'sent'
            "#,
        )
        .bind(DeliveryStatus::Failed)
        .bind(reason)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!(notification_id = %id, "No pending notification record to mark as failed");
        } else {
            tracing::debug!(notification_id = %id, status = %DeliveryStatus::Failed, "Notification record updated");
        }

        Ok(())
    }
}

/// Record store that only logs the status change.
pub struct LogRecordStore;

#[async_trait]
impl RecordStore for LogRecordStore {
    async fn mark_delivered(&self, id: &str) -> anyhow::Result<()> {
        tracing::info!(notification_id = %id, status = %DeliveryStatus::Sent, "Notification status updated");
        Ok(())
    }

    async fn mark_failed(&self, id: &str, reason: &str) -> anyhow::Result<()> {
        tracing::info!(notification_id = %id, status = %DeliveryStatus::Failed, reason, "Notification status updated");
        Ok(())
    }
}
