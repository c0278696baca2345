//! Notifier trait and in-memory implementation.
//!
//! Notification failure is never fatal to a reservation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::RequesterId;
use thiserror::Error;

/// Error from the notification collaborator.
#[derive(Debug, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Contract for the notification collaborator.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers a message to the recipient.
    async fn notify(&self, recipient: RequesterId, message: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Default)]
struct InMemoryNotifierState {
    sent: Vec<(RequesterId, String)>,
    fail: bool,
}

/// In-memory notifier recording delivered messages.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    state: Arc<RwLock<InMemoryNotifierState>>,
}

impl InMemoryNotifier {
    /// Creates a new in-memory notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures deliveries to fail.
    pub fn set_fail(&self, fail: bool) {
        self.state.write().unwrap().fail = fail;
    }

    /// Number of delivered messages.
    pub fn sent_count(&self) -> usize {
        self.state.read().unwrap().sent.len()
    }

    /// The most recently delivered message, if any.
    pub fn last_message(&self) -> Option<String> {
        self.state
            .read()
            .unwrap()
            .sent
            .last()
            .map(|(_, message)| message.clone())
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, recipient: RequesterId, message: &str) -> Result<(), NotifyError> {
        let mut state = self.state.write().unwrap();
        if state.fail {
            return Err(NotifyError("injected failure".to_string()));
        }
        state.sent.push((recipient, message.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notify_records_message() {
        let notifier = InMemoryNotifier::new();
        let recipient = RequesterId::new();

        notifier.notify(recipient, "seat confirmed").await.unwrap();

        assert_eq!(notifier.sent_count(), 1);
        assert_eq!(notifier.last_message(), Some("seat confirmed".to_string()));
    }

    #[tokio::test]
    async fn injected_failure_delivers_nothing() {
        let notifier = InMemoryNotifier::new();
        notifier.set_fail(true);

        let result = notifier.notify(RequesterId::new(), "seat confirmed").await;

        assert!(result.is_err());
        assert_eq!(notifier.sent_count(), 0);
    }
}
