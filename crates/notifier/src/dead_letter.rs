//! Dead-letter manager — parks exhausted messages and replays them on demand.
//!
//! Entries live on their own queue in the same store as the main queue.
//! Replay is safe to run while the consumer is ticking: every step is a
//! single atomic pop or push on the store.

use std::sync::Arc;

use courier_common::types::{DeadLetterEntry, Message};

use crate::error::NotifierError;
use crate::store::QueueStore;

#[derive(Clone)]
pub struct DeadLetterManager {
    store: Arc<dyn QueueStore>,
    main_queue: String,
    dead_letter_queue: String,
}

impl DeadLetterManager {
    pub fn new(
        store: Arc<dyn QueueStore>,
        main_queue: impl Into<String>,
        dead_letter_queue: impl Into<String>,
    ) -> Self {
        Self {
            store,
            main_queue: main_queue.into(),
            dead_letter_queue: dead_letter_queue.into(),
        }
    }

    pub fn dead_letter_queue(&self) -> &str {
        &self.dead_letter_queue
    }

    /// Wrap `message` with `reason` and the current time and append it to the DLQ.
    pub async fn send_to_dead_letter(
        &self,
        message: Message,
        reason: &str,
    ) -> Result<DeadLetterEntry, NotifierError> {
        let entry = DeadLetterEntry::new(message, reason);
        let body = serde_json::to_string(&entry)?;

        if let Err(e) = self.store.push_tail(&self.dead_letter_queue, &body).await {
            tracing::error!(
                message_id = %entry.original_message.id,
                reason,
                error = %e,
                "Failed to dead-letter message; it is lost"
            );
            return Err(e.into());
        }

        tracing::warn!(
            message_id = %entry.original_message.id,
            attempts = entry.original_message.attempt_count,
            reason,
            queue = %self.dead_letter_queue,
            "Message sent to dead-letter queue"
        );
        Ok(entry)
    }

    /// Move up to `count` entries, oldest first, back onto the main queue with
    /// their attempt count reset. Returns how many were replayed; fewer than
    /// `count` when the DLQ runs out.
    ///
    /// At most the entries present when the call starts are examined. Entries
    /// that no longer parse are not counted and go back to the DLQ head in
    /// their original order.
    pub async fn replay(&self, count: usize) -> Result<usize, NotifierError> {
        if count == 0 {
            return Err(NotifierError::InvalidReplayCount);
        }

        let snapshot = self.store.len(&self.dead_letter_queue).await?;
        let mut skipped: Vec<String> = Vec::new();
        let mut replayed = 0;

        for _ in 0..snapshot {
            if replayed == count {
                break;
            }
            let raw = match self.store.pop_head(&self.dead_letter_queue).await {
                Ok(Some(raw)) => raw,
                Ok(None) => break,
                Err(e) => {
                    self.restore_skipped(&skipped).await;
                    return Err(e.into());
                }
            };

            let entry: DeadLetterEntry = match serde_json::from_str(&raw) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        queue = %self.dead_letter_queue,
                        "Unreadable dead-letter entry, keeping it for inspection"
                    );
                    skipped.push(raw);
                    continue;
                }
            };

            let mut message = entry.original_message;
            message.reset_attempts();
            let pushed = match serde_json::to_string(&message) {
                Ok(body) => self
                    .store
                    .push_tail(&self.main_queue, &body)
                    .await
                    .map_err(NotifierError::from),
                Err(e) => Err(e.into()),
            };

            if let Err(e) = pushed {
                tracing::error!(
                    message_id = %message.id,
                    error = %e,
                    "Replay push failed, restoring entry to dead-letter queue"
                );
                skipped.push(raw);
                self.restore_skipped(&skipped).await;
                return Err(e);
            }

            replayed += 1;
            tracing::info!(message_id = %message.id, "Replayed message from dead-letter queue");
        }

        self.restore_skipped(&skipped).await;
        tracing::info!(
            requested = count,
            replayed,
            skipped = skipped.len(),
            "Dead-letter replay finished"
        );
        Ok(replayed)
    }

    /// Put entries taken off the DLQ head back where they were, oldest first.
    async fn restore_skipped(&self, skipped: &[String]) {
        for raw in skipped.iter().rev() {
            if let Err(e) = self.store.push_head(&self.dead_letter_queue, raw).await {
                tracing::error!(
                    error = %e,
                    queue = %self.dead_letter_queue,
                    "Failed to restore dead-letter entry; it is lost"
                );
            }
        }
    }

    /// Number of entries waiting in the DLQ.
    pub async fn size(&self) -> Result<u64, NotifierError> {
        Ok(self.store.len(&self.dead_letter_queue).await?)
    }

    /// Up to `limit` entries from the head of the DLQ without removing them.
    /// Unreadable entries are skipped.
    pub async fn peek(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, NotifierError> {
        let raw = self.store.peek(&self.dead_letter_queue, limit).await?;
        let entries = raw
            .iter()
            .filter_map(|item| match serde_json::from_str(item) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable dead-letter entry");
                    None
                }
            })
            .collect();
        Ok(entries)
    }
}
