//! Failure injection for demos of the retry path.
//!
//! Production wiring uses [`NeverFail`]; tests substitute deterministic
//! strategies.

use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;

use super::WhatsAppNotification;
use super::transport::{NotificationTransport, TransportError};

/// Decides whether the next send should be failed artificially.
pub trait FailureStrategy: Send + Sync {
    fn should_fail(&self) -> bool;
}

pub struct NeverFail;

impl FailureStrategy for NeverFail {
    fn should_fail(&self) -> bool {
        false
    }
}

/// Fails each send independently with probability `rate`.
pub struct RandomFailure {
    rate: f64,
}

impl RandomFailure {
    /// `rate` is clamped into `[0, 1]`.
    pub fn new(rate: f64) -> Self {
        let rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        Self { rate }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl FailureStrategy for RandomFailure {
    fn should_fail(&self) -> bool {
        rand::rng().random_bool(self.rate)
    }
}

/// Wraps a transport and fails sends chosen by a [`FailureStrategy`].
pub struct FlakyTransport {
    inner: Arc<dyn NotificationTransport>,
    strategy: Arc<dyn FailureStrategy>,
}

impl FlakyTransport {
    pub fn new(inner: Arc<dyn NotificationTransport>, strategy: Arc<dyn FailureStrategy>) -> Self {
        Self { inner, strategy }
    }
}

#[async_trait]
impl NotificationTransport for FlakyTransport {
    async fn send(&self, notification: &WhatsAppNotification) -> Result<(), TransportError> {
        if self.strategy.should_fail() {
            return Err(TransportError::Injected);
        }
        self.inner.send(notification).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::delivery::LogTransport;

    /// Fails the first `n` sends, then succeeds.
    struct FailFirst {
        remaining: AtomicUsize,
    }

    impl FailureStrategy for FailFirst {
        fn should_fail(&self) -> bool {
            self.remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
    }

    fn notification() -> WhatsAppNotification {
        WhatsAppNotification {
            message_id: "m1".into(),
            tenant_id: None,
            user_id: None,
            mobile_number: "+15550100".into(),
            custom_message: "hi".into(),
            date: None,
        }
    }

    #[test]
    fn test_random_failure_extremes() {
        assert!(!RandomFailure::new(0.0).should_fail());
        assert!(RandomFailure::new(1.0).should_fail());
        assert_eq!(RandomFailure::new(4.0).rate(), 1.0);
        assert_eq!(RandomFailure::new(f64::NAN).rate(), 0.0);
    }

    #[tokio::test]
    async fn test_flaky_transport_follows_strategy() {
        let strategy = Arc::new(FailFirst {
            remaining: AtomicUsize::new(1),
        });
        let transport = FlakyTransport::new(Arc::new(LogTransport), strategy);

        assert!(matches!(
            transport.send(&notification()).await,
            Err(TransportError::Injected)
        ));
        assert!(transport.send(&notification()).await.is_ok());
    }

    #[tokio::test]
    async fn test_never_fail_passes_through() {
        let transport = FlakyTransport::new(Arc::new(LogTransport), Arc::new(NeverFail));
        assert!(transport.send(&notification()).await.is_ok());
    }
}
