//! Discount code validation and pricing.
//!
//! [`DiscountEngine::evaluate`] and [`DiscountEngine::price_discount`] are pure
//! and carry all of the rules. The async [`DiscountEngine::validate`] only adds
//! the case-insensitive lookup, and [`DiscountEngine::record_redemption`] is the
//! single side effect, delegated to the store's bounded atomic increment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{DiscountError, DiscountRejection};
use crate::pricing::scale_rounded;
use crate::store::DiscountStore;
use crate::types::{DiscountCode, DiscountKind, EventId, Money};

/// A discount that passed validation for one checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidDiscount {
    /// Normalized code
    pub code: String,
    /// Percentage or fixed amount
    pub kind: DiscountKind,
    /// Percentage points or minor units
    pub value: u64,
}

/// Validates discount codes and computes discount amounts.
#[derive(Clone)]
pub struct DiscountEngine {
    store: Arc<dyn DiscountStore>,
}

impl DiscountEngine {
    /// Creates an engine over a discount store.
    #[must_use]
    pub fn new(store: Arc<dyn DiscountStore>) -> Self {
        Self { store }
    }

    /// Look up `code` (case-insensitively) and validate it for `event_id` at `now`.
    ///
    /// # Errors
    ///
    /// - [`DiscountError::Rejected`] with the first rule the code fails
    /// - [`DiscountError::Storage`] if the lookup fails
    pub async fn validate(
        &self,
        code: &str,
        event_id: &EventId,
        now: DateTime<Utc>,
    ) -> Result<ValidDiscount, DiscountError> {
        let normalized = DiscountCode::normalize(code);
        let record = self.store.find(&normalized).await?;
        Self::evaluate(record.as_ref(), event_id, now).map_err(DiscountError::Rejected)
    }

    /// Apply the validation rules to an already-loaded record.
    ///
    /// Checks run in a fixed order: existence, enabled, window
    /// (`active_from <= now <= active_until`), redemption cap, event applicability.
    ///
    /// # Errors
    ///
    /// Returns the first [`DiscountRejection`] that applies.
    pub fn evaluate(
        record: Option<&DiscountCode>,
        event_id: &EventId,
        now: DateTime<Utc>,
    ) -> Result<ValidDiscount, DiscountRejection> {
        let record = record.ok_or(DiscountRejection::NotFound)?;

        if !record.enabled {
            return Err(DiscountRejection::Disabled);
        }
        if now < record.active_from || now > record.active_until {
            return Err(DiscountRejection::OutOfWindow);
        }
        if record.is_exhausted() {
            return Err(DiscountRejection::Exhausted);
        }
        if !record.applies_to(event_id) {
            return Err(DiscountRejection::NotApplicable);
        }

        Ok(ValidDiscount {
            code: DiscountCode::normalize(&record.code),
            kind: record.kind,
            value: record.value,
        })
    }

    /// Discount for `subtotal`.
    ///
    /// Percentage: `round(subtotal * value / 100)`, halves rounded up.
    /// Fixed amount: `min(value, subtotal)`. Never exceeds the subtotal.
    #[must_use]
    pub fn price_discount(discount: &ValidDiscount, subtotal: Money) -> Money {
        let amount = match discount.kind {
            DiscountKind::Percentage => scale_rounded(subtotal.cents(), discount.value, 100),
            DiscountKind::FixedAmount => discount.value,
        };
        Money::from_cents(amount.min(subtotal.cents()))
    }

    /// Count one redemption of `code`. Call only after the order is durable.
    ///
    /// Returns `false` if the cap was reached by a concurrent order in the meantime.
    ///
    /// # Errors
    ///
    /// - [`DiscountError::Rejected`] with `NotFound` if the code was deleted
    /// - [`DiscountError::Storage`] on backend failure
    pub async fn record_redemption(&self, code: &str) -> Result<bool, DiscountError> {
        let normalized = DiscountCode::normalize(code);
        Ok(self.store.record_redemption(&normalized).await?)
    }
}
