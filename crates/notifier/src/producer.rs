//! Producer side — appends fresh notifications to the main queue.

use courier_common::types::Message;

use crate::error::NotifierError;
use crate::store::QueueStore;

/// Push `message` onto the tail of `queue` as a never-attempted message.
/// Returns the queue length after the push.
pub async fn enqueue(
    store: &dyn QueueStore,
    queue: &str,
    mut message: Message,
) -> Result<u64, NotifierError> {
    message.reset_attempts();
    let body = serde_json::to_string(&message)?;
    let len = store.push_tail(queue, &body).await?;

    tracing::info!(message_id = %message.id, queue, depth = len, "Notification enqueued");
    Ok(len)
}
