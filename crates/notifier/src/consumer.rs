//! Consumer loop — polls the main queue and routes each message through
//! delivery, the retry policy and the dead-letter manager.
//!
//! Flow per tick:
//! 1. `LPOP` one raw item from the main queue (empty → idle tick)
//! 2. Parse it into a `Message` (unparseable → logged and dropped)
//! 3. Run the delivery action
//! 4. On failure, count the attempt and either requeue at the tail or dead-letter
//!
//! Delivery is at-least-once with one known gap: a message popped right before
//! a crash is lost, because the store has no acknowledgement step.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use courier_common::config::{AppConfig, DEFAULT_DEAD_LETTER_QUEUE, DEFAULT_MAIN_QUEUE};
use courier_common::types::Message;

use crate::dead_letter::DeadLetterManager;
use crate::delivery::{DeliveryAction, DeliveryOutcome};
use crate::error::NotifierError;
use crate::retry::{DEFAULT_MAX_RETRIES, RetryDecision, RetryPolicy};
use crate::store::QueueStore;

/// Default tick interval (2 seconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Longest slice of a malformed item echoed into the logs.
const MALFORMED_PREVIEW_LEN: usize = 128;

/// Queue names, retry budget and tick interval for one consumer.
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub main_queue: String,
    pub dead_letter_queue: String,
    pub max_retries: u32,
    pub poll_interval: Duration,
}

impl ConsumerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            main_queue: config.main_queue.clone(),
            dead_letter_queue: config.dead_letter_queue.clone(),
            max_retries: config.max_retries,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            main_queue: DEFAULT_MAIN_QUEUE.to_string(),
            dead_letter_queue: DEFAULT_DEAD_LETTER_QUEUE.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Idle,
    Processing,
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The main queue was empty.
    Empty,
    /// Another tick was still processing; nothing was popped.
    Busy,
    Delivered { id: String },
    Requeued { id: String, attempt: u32 },
    DeadLettered { id: String, attempt: u32 },
    /// The message could not be processed at all and was discarded.
    Dropped { id: Option<String>, reason: String },
}

/// Single-queue consumer. Processes at most one message at a time.
pub struct ConsumerLoop {
    store: Arc<dyn QueueStore>,
    action: Arc<dyn DeliveryAction>,
    dead_letters: DeadLetterManager,
    policy: RetryPolicy,
    main_queue: String,
    processing: AtomicBool,
}

/// Clears the processing flag when a tick ends, however it ends.
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ConsumerLoop {
    pub fn new(
        store: Arc<dyn QueueStore>,
        action: Arc<dyn DeliveryAction>,
        settings: &ConsumerSettings,
    ) -> Self {
        let dead_letters = DeadLetterManager::new(
            store.clone(),
            settings.main_queue.clone(),
            settings.dead_letter_queue.clone(),
        );

        Self {
            store,
            action,
            dead_letters,
            policy: RetryPolicy::new(settings.max_retries),
            main_queue: settings.main_queue.clone(),
            processing: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ConsumerState {
        if self.processing.load(Ordering::Acquire) {
            ConsumerState::Processing
        } else {
            ConsumerState::Idle
        }
    }

    pub fn dead_letters(&self) -> &DeadLetterManager {
        &self.dead_letters
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run one poll-and-process cycle.
    ///
    /// Errors are store or serialization failures; any message already popped
    /// in this tick is lost.
    pub async fn tick(&self) -> Result<TickOutcome, NotifierError> {
        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(TickOutcome::Busy);
        }
        let _guard = ProcessingGuard(&self.processing);

        let Some(raw) = self.store.pop_head(&self.main_queue).await? else {
            return Ok(TickOutcome::Empty);
        };

        let message: Message = match serde_json::from_str(&raw) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    queue = %self.main_queue,
                    item = %preview(&raw),
                    "Dropping malformed message"
                );
                return Ok(TickOutcome::Dropped {
                    id: None,
                    reason: e.to_string(),
                });
            }
        };

        tracing::debug!(
            message_id = %message.id,
            attempt = message.attempt_count.saturating_add(1),
            "Processing message"
        );

        match self.action.execute(&message).await {
            Ok(DeliveryOutcome::Success) => {
                tracing::info!(message_id = %message.id, "Message delivered");
                Ok(TickOutcome::Delivered { id: message.id })
            }
            Ok(DeliveryOutcome::Failure(reason)) => self.handle_failure(message, reason).await,
            Err(e) => {
                tracing::error!(
                    message_id = %message.id,
                    error = %e,
                    "Unrecoverable delivery fault, dropping message"
                );
                Ok(TickOutcome::Dropped {
                    id: Some(message.id),
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn handle_failure(
        &self,
        mut message: Message,
        reason: String,
    ) -> Result<TickOutcome, NotifierError> {
        let decision = self.policy.apply(&mut message);
        let attempt = message.attempt_count;

        tracing::warn!(
            message_id = %message.id,
            attempt,
            max_retries = self.policy.max_retries(),
            reason = %reason,
            "Delivery attempt failed"
        );

        match decision {
            RetryDecision::Requeue => {
                let body = serde_json::to_string(&message)?;
                if let Err(e) = self.store.push_tail(&self.main_queue, &body).await {
                    tracing::error!(
                        message_id = %message.id,
                        error = %e,
                        "Failed to requeue message; it is lost"
                    );
                    return Err(e.into());
                }
                tracing::info!(
                    message_id = %message.id,
                    attempt,
                    max_retries = self.policy.max_retries(),
                    "Message requeued for retry"
                );
                Ok(TickOutcome::Requeued {
                    id: message.id,
                    attempt,
                })
            }
            RetryDecision::DeadLetter => {
                let entry = self.dead_letters.send_to_dead_letter(message, &reason).await?;
                self.action
                    .on_dead_letter(&entry.original_message, &reason)
                    .await;
                Ok(TickOutcome::DeadLettered {
                    id: entry.original_message.id,
                    attempt,
                })
            }
        }
    }
}

fn preview(raw: &str) -> &str {
    match raw.char_indices().nth(MALFORMED_PREVIEW_LEN) {
        Some((idx, _)) => &raw[..idx],
        None => raw,
    }
}

/// Owns the ticking task of a [`ConsumerLoop`].
///
/// Ticks fire on a fixed interval. A tick that overruns delays the next one,
/// so ticks never overlap. `stop` waits for the in-flight tick to finish.
pub struct ConsumerScheduler {
    consumer: Arc<ConsumerLoop>,
    poll_interval: Duration,
    running: Option<RunningConsumer>,
}

struct RunningConsumer {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ConsumerScheduler {
    pub fn new(consumer: Arc<ConsumerLoop>, poll_interval: Duration) -> Self {
        Self {
            consumer,
            poll_interval,
            running: None,
        }
    }

    pub fn consumer(&self) -> &Arc<ConsumerLoop> {
        &self.consumer
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
    }

    /// Spawn the ticking task. Must be called inside a Tokio runtime.
    pub fn start(&mut self) -> Result<(), NotifierError> {
        if self.is_running() {
            return Err(NotifierError::AlreadyRunning);
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_ticks(
            self.consumer.clone(),
            self.poll_interval,
            shutdown_rx,
        ));

        self.running = Some(RunningConsumer { shutdown, task });
        Ok(())
    }

    /// Resolves when the ticking task ends without `stop` having been called.
    /// Pending forever when the scheduler is not running.
    pub async fn stopped(&mut self) {
        let Some(running) = self.running.as_mut() else {
            return std::future::pending().await;
        };

        if let Err(e) = (&mut running.task).await {
            tracing::error!(error = %e, "Consumer task ended abnormally");
        }
        self.running = None;
    }

    /// Stop scheduling ticks and wait for the current one to complete.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        let _ = running.shutdown.send(true);
        if let Err(e) = running.task.await {
            tracing::error!(error = %e, "Consumer task ended abnormally");
        }
    }
}

async fn run_ticks(
    consumer: Arc<ConsumerLoop>,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + poll_interval, poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        queue = %consumer.main_queue,
        poll_interval_ms = poll_interval.as_millis() as u64,
        max_retries = consumer.policy.max_retries(),
        "Consumer started"
    );

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                // Each tick runs on its own task so a panicking delivery only
                // costs that tick. Shutdown is only observed between ticks.
                let tick = tokio::spawn({
                    let consumer = consumer.clone();
                    async move { consumer.tick().await }
                });
                match tick.await {
                    Ok(Ok(TickOutcome::Empty)) | Ok(Ok(TickOutcome::Busy)) => {}
                    Ok(Ok(outcome)) => tracing::trace!(?outcome, "Tick finished"),
                    Ok(Err(e)) => tracing::error!(error = %e, "Consumer tick failed"),
                    Err(e) => tracing::error!(error = %e, "Consumer tick panicked"),
                }
            }
        }
    }

    tracing::info!(queue = %consumer.main_queue, "Consumer stopped");
}
