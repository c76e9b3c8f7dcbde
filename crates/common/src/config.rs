use std::net::SocketAddr;

use serde::Deserialize;

/// Default main queue name.
pub const DEFAULT_MAIN_QUEUE: &str = "meeting:notifications";

/// Default dead-letter queue name.
pub const DEFAULT_DEAD_LETTER_QUEUE: &str = "meeting:notifications:dlq";

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Redis connection string (queue store)
    pub redis_url: String,

    /// PostgreSQL connection string for the notification record store.
    /// When unset, delivery status updates are only logged.
    pub database_url: Option<String>,

    /// Maximum number of PostgreSQL connections in the pool (default: 5)
    pub db_max_connections: u32,

    /// Consumer tick interval in milliseconds (default: 2000)
    pub poll_interval_ms: u64,

    /// Failed attempts before a message is dead-lettered (default: 3).
    /// Zero dead-letters on the first failure.
    pub max_retries: u32,

    /// Main notification queue name
    pub main_queue: String,

    /// Dead-letter queue name
    pub dead_letter_queue: String,

    /// WhatsApp webhook endpoint. When unset, deliveries are only logged.
    pub whatsapp_webhook_url: Option<String>,

    /// Bearer token sent to the WhatsApp webhook
    pub whatsapp_api_token: Option<String>,

    /// HTTP timeout for the webhook transport in milliseconds (default: 10000)
    pub webhook_timeout_ms: u64,

    /// Probability in `[0, 1]` of injecting a simulated transport failure.
    /// Demo only; production deployments leave this at 0.
    pub failure_rate: f64,

    /// Listen address for the operator API (default: 0.0.0.0:3000)
    pub api_bind_addr: SocketAddr,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let poll_interval_ms: u64 = parse_or(&lookup, "NOTIFIER_POLL_INTERVAL_MS", 2000)?;
        if poll_interval_ms == 0 {
            anyhow::bail!("NOTIFIER_POLL_INTERVAL_MS must be greater than zero");
        }

        let raw_retries: i64 = parse_or(&lookup, "NOTIFIER_MAX_RETRIES", 3)?;
        let max_retries = u32::try_from(raw_retries.max(0))
            .map_err(|_| anyhow::anyhow!("NOTIFIER_MAX_RETRIES is out of range"))?;

        let failure_rate: f64 = parse_or(&lookup, "NOTIFIER_FAILURE_RATE", 0.0)?;
        if !(0.0..=1.0).contains(&failure_rate) {
            anyhow::bail!("NOTIFIER_FAILURE_RATE must be between 0 and 1");
        }

        Ok(Self {
            redis_url: lookup("REDIS_URL").unwrap_or_else(|| "redis://localhost:6379".to_string()),
            database_url: lookup("DATABASE_URL").filter(|v| !v.is_empty()),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?,
            poll_interval_ms,
            max_retries,
            main_queue: lookup("NOTIFIER_MAIN_QUEUE")
                .unwrap_or_else(|| DEFAULT_MAIN_QUEUE.to_string()),
            dead_letter_queue: lookup("NOTIFIER_DLQ")
                .unwrap_or_else(|| DEFAULT_DEAD_LETTER_QUEUE.to_string()),
            whatsapp_webhook_url: lookup("WHATSAPP_WEBHOOK_URL").filter(|v| !v.is_empty()),
            whatsapp_api_token: lookup("WHATSAPP_API_TOKEN").filter(|v| !v.is_empty()),
            webhook_timeout_ms: parse_or(&lookup, "WEBHOOK_TIMEOUT_MS", 10_000)?,
            failure_rate,
            api_bind_addr: parse_or(&lookup, "API_BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{key} has an invalid value: {raw}")),
        None => Ok(default),
    }
}
