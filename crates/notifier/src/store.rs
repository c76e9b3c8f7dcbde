//! Durable queue store — ordered lists addressed by queue name.
//!
//! Items are opaque strings (JSON documents). Each call is atomic on its own;
//! nothing here offers transactional pop. A popped item belongs to the caller
//! and is gone from the store, so a crash after `pop_head` loses it.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::Mutex;

use crate::error::StoreError;

/// FIFO list storage shared by producers, the consumer and the DLQ manager.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Append an item to the tail of `queue`. Returns the new queue length.
    async fn push_tail(&self, queue: &str, item: &str) -> Result<u64, StoreError>;

    /// Put an item back at the head of `queue`, ahead of everything else.
    async fn push_head(&self, queue: &str, item: &str) -> Result<u64, StoreError>;

    /// Remove and return the oldest item of `queue`, or `None` when empty.
    async fn pop_head(&self, queue: &str) -> Result<Option<String>, StoreError>;

    /// Number of items currently in `queue`.
    async fn len(&self, queue: &str) -> Result<u64, StoreError>;

    /// Up to `limit` items from the head of `queue`, oldest first, without removing them.
    async fn peek(&self, queue: &str, limit: usize) -> Result<Vec<String>, StoreError>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Redis list-backed store (`RPUSH` / `LPOP`).
#[derive(Clone)]
pub struct RedisQueueStore {
    conn: ConnectionManager,
}

impl RedisQueueStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl QueueStore for RedisQueueStore {
    async fn push_tail(&self, queue: &str, item: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let len: u64 = conn.rpush(queue, item).await?;
        Ok(len)
    }

    async fn push_head(&self, queue: &str, item: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let len: u64 = conn.lpush(queue, item).await?;
        Ok(len)
    }

    async fn pop_head(&self, queue: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let item: Option<String> = conn.lpop(queue, None).await?;
        Ok(item)
    }

    async fn len(&self, queue: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let len: u64 = conn.llen(queue).await?;
        Ok(len)
    }

    async fn peek(&self, queue: &str, limit: usize) -> Result<Vec<String>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let stop = isize::try_from(limit).unwrap_or(isize::MAX) - 1;
        let mut conn = self.conn.clone();
        let items: Vec<String> = conn.lrange(queue, 0, stop).await?;
        Ok(items)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// Process-local store used by tests and single-process demos.
#[derive(Default)]
pub struct MemoryQueueStore {
    queues: Mutex<HashMap<String, VecDeque<String>>>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every item in `queue`, oldest first.
    pub async fn items(&self, queue: &str) -> Vec<String> {
        let queues = self.queues.lock().await;
        queues
            .get(queue)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn push_tail(&self, queue: &str, item: &str) -> Result<u64, StoreError> {
        let mut queues = self.queues.lock().await;
        let list = queues.entry(queue.to_string()).or_default();
        list.push_back(item.to_string());
        Ok(list.len() as u64)
    }

    async fn push_head(&self, queue: &str, item: &str) -> Result<u64, StoreError> {
        let mut queues = self.queues.lock().await;
        let list = queues.entry(queue.to_string()).or_default();
        list.push_front(item.to_string());
        Ok(list.len() as u64)
    }

    async fn pop_head(&self, queue: &str) -> Result<Option<String>, StoreError> {
        let mut queues = self.queues.lock().await;
        Ok(queues.get_mut(queue).and_then(VecDeque::pop_front))
    }

    async fn len(&self, queue: &str) -> Result<u64, StoreError> {
        let queues = self.queues.lock().await;
        Ok(queues.get(queue).map_or(0, |q| q.len() as u64))
    }

    async fn peek(&self, queue: &str, limit: usize) -> Result<Vec<String>, StoreError> {
        let queues = self.queues.lock().await;
        Ok(queues
            .get(queue)
            .map(|q| q.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
