//! Outbound notification contract.
//!
//! Emitted after an order commits, for ticket delivery and email. Delivery
//! failures are the notifier's problem: they never roll back an order.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::BoxResult;
use crate::types::{BuyerId, OrderId, TicketId};

/// Event published once per committed order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCommitted {
    /// Committed order
    pub order_id: OrderId,
    /// Buyer to notify
    pub buyer_id: BuyerId,
    /// Tickets to deliver
    pub ticket_ids: Vec<TicketId>,
}

/// Notification delivery failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The downstream collaborator rejected or could not receive the event.
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Downstream notification collaborator.
pub trait OrderNotifier: Send + Sync {
    /// Publish an [`OrderCommitted`] event.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Delivery`] if the event could not be handed off.
    fn order_committed(&self, event: OrderCommitted) -> BoxResult<'_, (), NotifyError>;
}
