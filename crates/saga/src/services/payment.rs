//! Payment processor trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::{Money, ReservationId};
use thiserror::Error;

/// Result of a successful payment capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentCapture {
    /// Reference assigned by the payment processor.
    pub payment_ref: String,
}

/// Errors reported by the payment processor.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The charge was explicitly declined. Definitive, never retried.
    #[error("payment declined: {0}")]
    Declined(String),

    /// The processor did not answer within the deadline.
    #[error("payment processor timed out")]
    Timeout,

    /// The processor could not be reached.
    #[error("payment processor unavailable: {0}")]
    Unavailable(String),
}

/// Contract for the payment collaborator.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Charges the amount due for a reservation.
    async fn charge(
        &self,
        reservation_id: ReservationId,
        amount: Money,
    ) -> Result<PaymentCapture, PaymentError>;

    /// Reverses a previously captured payment.
    async fn refund(&self, payment_ref: &str) -> Result<(), PaymentError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    captures: HashMap<String, (ReservationId, Money)>,
    next_id: u32,
    decline: bool,
    latency: Option<Duration>,
}

/// In-memory payment processor with decline and latency injection.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentProcessor {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentProcessor {
    /// Creates a new in-memory payment processor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures charges to be declined.
    pub fn set_decline(&self, decline: bool) {
        self.state.write().unwrap().decline = decline;
    }

    /// Configures an artificial delay before each charge resolves.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state.write().unwrap().latency = latency;
    }

    /// Number of captured (not refunded) payments.
    pub fn capture_count(&self) -> usize {
        self.state.read().unwrap().captures.len()
    }

    /// Returns true if a capture exists with the given reference.
    pub fn has_capture(&self, payment_ref: &str) -> bool {
        self.state.read().unwrap().captures.contains_key(payment_ref)
    }
}

#[async_trait]
impl PaymentProcessor for InMemoryPaymentProcessor {
    async fn charge(
        &self,
        reservation_id: ReservationId,
        amount: Money,
    ) -> Result<PaymentCapture, PaymentError> {
        let latency = self.state.read().unwrap().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.write().unwrap();
        if state.decline {
            return Err(PaymentError::Declined("card declined".to_string()));
        }

        state.next_id += 1;
        let payment_ref = format!("PAY-{:04}", state.next_id);
        state
            .captures
            .insert(payment_ref.clone(), (reservation_id, amount));

        Ok(PaymentCapture { payment_ref })
    }

    async fn refund(&self, payment_ref: &str) -> Result<(), PaymentError> {
        let mut state = self.state.write().unwrap();
        state.captures.remove(payment_ref);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn charge_and_refund() {
        let processor = InMemoryPaymentProcessor::new();
        let reservation_id = ReservationId::new();
        let amount = Money::from_cents(5000);

        let capture = processor.charge(reservation_id, amount).await.unwrap();
        assert!(capture.payment_ref.starts_with("PAY-"));
        assert_eq!(processor.capture_count(), 1);
        assert!(processor.has_capture(&capture.payment_ref));

        processor.refund(&capture.payment_ref).await.unwrap();
        assert_eq!(processor.capture_count(), 0);
    }

    #[tokio::test]
    async fn declined_charge_captures_nothing() {
        let processor = InMemoryPaymentProcessor::new();
        processor.set_decline(true);

        let result = processor
            .charge(ReservationId::new(), Money::from_cents(5000))
            .await;

        assert!(matches!(result.unwrap_err(), PaymentError::Declined(_)));
        assert_eq!(processor.capture_count(), 0);
    }

    #[tokio::test]
    async fn sequential_payment_refs() {
        let processor = InMemoryPaymentProcessor::new();
        let amount = Money::from_cents(1000);

        let first = processor.charge(ReservationId::new(), amount).await.unwrap();
        let second = processor.charge(ReservationId::new(), amount).await.unwrap();

        assert_eq!(first.payment_ref, "PAY-0001");
        assert_eq!(second.payment_ref, "PAY-0002");
    }

    #[tokio::test(start_paused = true)]
    async fn latency_delays_the_charge() {
        let processor = InMemoryPaymentProcessor::new();
        processor.set_latency(Some(Duration::from_secs(2)));

        let started = tokio::time::Instant::now();
        processor
            .charge(ReservationId::new(), Money::from_cents(100))
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn refund_of_unknown_ref_is_a_noop() {
        let processor = InMemoryPaymentProcessor::new();
        processor.refund("PAY-9999").await.unwrap();
    }
}
