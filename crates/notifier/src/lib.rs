//! Notification delivery worker.
//!
//! Consumes the Redis notification queue, delivers each message through a
//! pluggable [`delivery::DeliveryAction`], retries failures a bounded number
//! of times and parks exhausted messages on a dead-letter queue that
//! operators can replay.

pub mod consumer;
pub mod dead_letter;
pub mod delivery;
pub mod error;
pub mod producer;
pub mod retry;
pub mod store;

pub use consumer::{ConsumerLoop, ConsumerScheduler, ConsumerSettings, ConsumerState, TickOutcome};
pub use dead_letter::DeadLetterManager;
pub use error::{NotifierError, StoreError};
pub use producer::enqueue;
pub use retry::{RetryDecision, RetryPolicy};
pub use store::{MemoryQueueStore, QueueStore, RedisQueueStore};
