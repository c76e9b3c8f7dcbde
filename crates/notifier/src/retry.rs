//! Bounded retry policy.
//!
//! A failed attempt is counted first, then compared against the budget:
//! once the count reaches `max_retries` the message is dead-lettered.
//! A budget of zero dead-letters on the very first failure.

use courier_common::types::Message;

/// Default number of failed attempts before dead-lettering.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// What to do with a message whose delivery just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Push it back on the tail of the main queue.
    Requeue,
    /// Hand it to the dead-letter manager.
    DeadLetter,
}

/// Decide the fate of a message that has failed `attempt_count` times before
/// the attempt that just failed.
pub fn decide(attempt_count: u32, max_retries: u32) -> RetryDecision {
    if max_retries == 0 {
        return RetryDecision::DeadLetter;
    }

    let failed = attempt_count.saturating_add(1);
    if failed >= max_retries {
        RetryDecision::DeadLetter
    } else {
        RetryDecision::Requeue
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Record the failed attempt on `message` and return the decision.
    pub fn apply(&self, message: &mut Message) -> RetryDecision {
        let decision = decide(message.attempt_count, self.max_retries);
        message.record_failure();
        decision
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}
