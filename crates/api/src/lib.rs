//! Operator HTTP surface for the notification queue: health, dead-letter
//! inspection and replay, and an enqueue endpoint for producers.

pub mod routes;
pub mod state;
