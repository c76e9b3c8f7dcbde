//! Shared application state for the Axum API server.

use std::sync::Arc;

use courier_common::config::AppConfig;
use courier_notifier::{DeadLetterManager, QueueStore};

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn QueueStore>,
    pub dead_letters: DeadLetterManager,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn QueueStore>, config: AppConfig) -> Self {
        let dead_letters = DeadLetterManager::new(
            store.clone(),
            config.main_queue.clone(),
            config.dead_letter_queue.clone(),
        );
        Self {
            store,
            dead_letters,
            config,
        }
    }
}
