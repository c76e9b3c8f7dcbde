use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys owned by the queue envelope; they never appear inside a payload.
const RESERVED_KEYS: [&str; 2] = ["id", "attemptCount"];

/// Opaque delivery data carried by a [`Message`].
///
/// The queue never looks inside; only a delivery action interprets it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a payload from a JSON object, dropping envelope keys.
    /// Non-object values are stored under `data`.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => map.into_iter().collect(),
            Value::Null => Self::default(),
            other => {
                let mut payload = Self::default();
                payload.insert("data", other);
                payload
            }
        }
    }

    /// Insert a field. Envelope keys (`id`, `attemptCount`) are ignored.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        if RESERVED_KEYS.contains(&key.as_str()) {
            return None;
        }
        self.0.insert(key, value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Borrow the payload as a JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl FromIterator<(String, Value)> for Payload {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut payload = Self::default();
        for (key, value) in iter {
            payload.insert(key, value);
        }
        payload
    }
}

/// A unit of notification work travelling through the queue.
///
/// Serialized flat: `{"id": ..., "attemptCount": n, <payload fields>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Producer-assigned identifier, unique per logical notification.
    pub id: String,
    #[serde(flatten)]
    pub payload: Payload,
    /// Failed delivery attempts so far. Missing or `null` reads as 0.
    #[serde(default, deserialize_with = "null_as_zero")]
    pub attempt_count: u32,
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<u32>::deserialize(deserializer)?.unwrap_or_default())
}

impl Message {
    /// A fresh message that has never been attempted.
    pub fn new(id: impl Into<String>, payload: Payload) -> Self {
        Self {
            id: id.into(),
            payload,
            attempt_count: 0,
        }
    }

    /// Count one more failed attempt and return the new total.
    pub fn record_failure(&mut self) -> u32 {
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.attempt_count
    }

    /// Forget previous attempts (DLQ replay only).
    pub fn reset_attempts(&mut self) {
        self.attempt_count = 0;
    }
}

/// Terminal failure record stored on the dead-letter queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterEntry {
    /// The message as it was when it exhausted its retries.
    pub original_message: Message,
    /// Failure description of the last attempt.
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetterEntry {
    pub fn new(original_message: Message, reason: impl Into<String>) -> Self {
        Self {
            original_message,
            reason: reason.into(),
            failed_at: Utc::now(),
        }
    }
}

/// Terminal delivery status written to the record store. Rows start out
/// `pending` from the table default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Sent => write!(f, "sent"),
            DeliveryStatus::Failed => write!(f, "failed"),
        }
    }
}
