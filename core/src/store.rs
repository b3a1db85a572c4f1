//! Storage contracts for discount codes, orders and tickets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::BoxResult;
use crate::error::StoreError;
use crate::token::RedemptionToken;
use crate::types::{DiscountCode, Order, OrderId, Ticket};

/// An order together with the tickets issued for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// The order
    pub order: Order,
    /// One ticket per unit sold
    pub tickets: Vec<Ticket>,
}

impl OrderRecord {
    /// Check that tickets match the order lines exactly.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] describing the mismatch.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.order.lines.is_empty() {
            return Err(StoreError::Invalid("order has no lines".to_string()));
        }
        for line in &self.order.lines {
            let issued = self
                .tickets
                .iter()
                .filter(|t| t.ticket_class_id == line.ticket_class_id)
                .count();
            if u64::try_from(issued) != Ok(u64::from(line.quantity)) {
                return Err(StoreError::Invalid(format!(
                    "line {} has quantity {} but {issued} tickets",
                    line.ticket_class_id, line.quantity
                )));
            }
        }
        if u64::try_from(self.tickets.len()) != Ok(self.order.ticket_count()) {
            return Err(StoreError::Invalid(
                "tickets reference classes not on the order".to_string(),
            ));
        }
        if self.tickets.iter().any(|t| t.order_id != self.order.id) {
            return Err(StoreError::Invalid(
                "ticket belongs to a different order".to_string(),
            ));
        }
        Ok(())
    }
}

/// Discount code persistence.
pub trait DiscountStore: Send + Sync {
    /// Create or replace a code. The code is stored normalized.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] if the record fails validation.
    fn upsert(&self, code: DiscountCode) -> BoxResult<'_, (), StoreError>;

    /// Case-insensitive lookup.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    fn find<'a>(&'a self, code: &'a str) -> BoxResult<'a, Option<DiscountCode>, StoreError>;

    /// Atomically increment `redemptions_used` if below `max_redemptions`.
    ///
    /// Returns `false` without changing anything when the cap is reached.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the code does not exist.
    fn record_redemption<'a>(&'a self, code: &'a str) -> BoxResult<'a, bool, StoreError>;
}

/// Order and ticket persistence.
pub trait OrderStore: Send + Sync {
    /// Write an order and all of its tickets as one atomic operation.
    ///
    /// Either every row is written or none is.
    ///
    /// # Errors
    ///
    /// - [`StoreError::TokenCollision`] if a redemption token already exists
    /// - [`StoreError::Conflict`] if the order id already exists
    /// - [`StoreError::Invalid`] if the record fails [`OrderRecord::validate`]
    /// - [`StoreError::Unavailable`] on transient backend failure
    fn persist<'a>(&'a self, record: &'a OrderRecord) -> BoxResult<'a, (), StoreError>;

    /// Load an order with its tickets.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] if a stored row does not match the schema.
    fn order(&self, id: OrderId) -> BoxResult<'_, Option<OrderRecord>, StoreError>;

    /// Move a paid order to refunded.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if the order does not exist
    /// - [`StoreError::InvalidTransition`] if the order is not paid
    fn mark_refunded(&self, id: OrderId) -> BoxResult<'_, Order, StoreError>;

    /// Check a ticket in: flips `used` from false to true exactly once.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if no ticket has this token
    /// - [`StoreError::AlreadyUsed`] if the ticket was already checked in
    fn redeem<'a>(
        &'a self,
        token: &'a RedemptionToken,
        at: DateTime<Utc>,
    ) -> BoxResult<'a, Ticket, StoreError>;
}
