use redis::Client;
use redis::aio::ConnectionManager;

/// Create a Redis connection manager for the queue store.
///
/// Fails when the server is unreachable; callers treat that as a fatal
/// startup error.
pub async fn create_redis_pool(redis_url: &str) -> anyhow::Result<ConnectionManager> {
    let client = Client::open(redis_url)?;
    let mut manager = ConnectionManager::new(client).await?;

    let _: String = redis::cmd("PING").query_async(&mut manager).await?;

    tracing::info!("Connected to Redis");
    Ok(manager)
}
