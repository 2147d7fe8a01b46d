//! Ticket delivery after a successful payment.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::OrderId;
use domain::{Order, Ticket};
use thiserror::Error;

/// Ticket delivery failed. Delivery is best effort, so this is only logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Ticket delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Sends issued tickets to the buyer.
#[async_trait]
pub trait TicketNotifier: Send + Sync {
    async fn tickets_issued(&self, order: &Order, tickets: &[Ticket]) -> Result<(), NotifyError>;
}

/// Notifier that only writes a log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTicketNotifier;

#[async_trait]
impl TicketNotifier for LogTicketNotifier {
    async fn tickets_issued(&self, order: &Order, tickets: &[Ticket]) -> Result<(), NotifyError> {
        tracing::info!(
            order_id = %order.id,
            email = %order.buyer.email,
            tickets = tickets.len(),
            "tickets ready for delivery"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryNotifierState {
    sent: Vec<(OrderId, usize)>,
    fail: bool,
}

/// Notifier that records deliveries, for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTicketNotifier {
    state: Arc<Mutex<InMemoryNotifierState>>,
}

impl InMemoryTicketNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, InMemoryNotifierState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Makes every delivery fail.
    pub fn set_fail(&self, fail: bool) {
        self.state().fail = fail;
    }

    /// Deliveries made so far as `(order, ticket count)`.
    pub fn sent(&self) -> Vec<(OrderId, usize)> {
        self.state().sent.clone()
    }
}

#[async_trait]
impl TicketNotifier for InMemoryTicketNotifier {
    async fn tickets_issued(&self, order: &Order, tickets: &[Ticket]) -> Result<(), NotifyError> {
        let mut state = self.state();
        if state.fail {
            return Err(NotifyError("mail server unreachable".to_string()));
        }
        state.sent.push((order.id, tickets.len()));
        Ok(())
    }
}
