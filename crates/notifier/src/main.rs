use std::sync::Arc;
use std::time::Duration;

use courier_common::config::AppConfig;
use courier_common::db;
use courier_common::redis_pool::create_redis_pool;
use courier_notifier::delivery::{
    FlakyTransport, LogRecordStore, LogTransport, NotificationTransport, PgRecordStore,
    RandomFailure, RecordStore, WebhookTransport, WhatsAppDelivery,
};
use courier_notifier::{ConsumerLoop, ConsumerScheduler, ConsumerSettings, RedisQueueStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier_notifier=info,courier_common=info".into()),
        )
        .json()
        .init();

    tracing::info!("Courier notifier starting...");

    // Load configuration
    let config = AppConfig::from_env()?;
    let settings = ConsumerSettings::from_config(&config);

    // Queue store; unreachable Redis is fatal here
    let redis = create_redis_pool(&config.redis_url).await?;
    let store = Arc::new(RedisQueueStore::new(redis));

    let records: Arc<dyn RecordStore> = match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url, config.db_max_connections).await?;
            sqlx::migrate!("../../migrations").run(&pool).await?;
            tracing::info!("Database migrations applied");
            Arc::new(PgRecordStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, delivery status will only be logged");
            Arc::new(LogRecordStore)
        }
    };

    let mut transport: Arc<dyn NotificationTransport> = match &config.whatsapp_webhook_url {
        Some(url) => Arc::new(WebhookTransport::new(
            url.clone(),
            config.whatsapp_api_token.clone(),
            Duration::from_millis(config.webhook_timeout_ms),
        )?),
        None => {
            tracing::warn!("WHATSAPP_WEBHOOK_URL not set, notifications will only be logged");
            Arc::new(LogTransport)
        }
    };

    if config.failure_rate > 0.0 {
        tracing::warn!(
            failure_rate = config.failure_rate,
            "Simulated transport failures enabled"
        );
        transport = Arc::new(FlakyTransport::new(
            transport,
            Arc::new(RandomFailure::new(config.failure_rate)),
        ));
    }

    let action = Arc::new(WhatsAppDelivery::new(transport, records));
    let consumer = Arc::new(ConsumerLoop::new(store, action, &settings));

    let mut scheduler = ConsumerScheduler::new(consumer, settings.poll_interval);
    scheduler.start()?;

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("Received shutdown signal, draining in-flight message...");
            scheduler.stop().await;
        }
        _ = scheduler.stopped() => {
            anyhow::bail!("Consumer task exited unexpectedly");
        }
    }

    tracing::info!("Courier notifier stopped.");
    Ok(())
}
