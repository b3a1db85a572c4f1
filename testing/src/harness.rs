//! Fixtures and a checkout test harness.
//!
//! [`CheckoutHarness`] wires every in-memory collaborator into a
//! [`CheckoutEnvironment`] and keeps typed handles so tests can seed state and
//! inspect the outcome.

use boxoffice_core::{
    BuyerId, CartLine, Clock, DiscountCode, DiscountKind, EventId, LedgerError, Money, PaymentConfirmation,
    TicketClass,
};
use boxoffice_runtime::{
    CheckoutConfig, CheckoutEnvironment, CheckoutRequest, CheckoutTransaction, ConfigError,
    RetryPolicy,
};
use chrono::Duration;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use crate::inventory_mocks::InMemoryInventoryLedger;
use crate::mocks::{ManualClock, RecordingNotifier, ScriptedTokenSource, test_clock};
use crate::store_mocks::{InMemoryDiscountStore, InMemoryOrderStore};

/// Event used by the fixtures.
pub const GALA: &str = "gala-2025";

/// A ticket class for the fixture event.
#[must_use]
pub fn ticket_class(id: &str, unit_price_cents: u64, capacity: u32) -> TicketClass {
    TicketClass::new(id, GALA, id.to_uppercase(), Money::from_cents(unit_price_cents), capacity)
}

/// An enabled, unlimited discount valid for a day around [`test_clock`].
#[must_use]
pub fn discount_code(code: &str, kind: DiscountKind, value: u64) -> DiscountCode {
    let now = test_clock().now();
    DiscountCode {
        code: code.to_string(),
        kind,
        value,
        active_from: now - Duration::days(1),
        active_until: now + Duration::days(1),
        max_redemptions: None,
        redemptions_used: 0,
        applicable_event_ids: vec![],
        enabled: true,
    }
}

/// A paid checkout request for the fixture event.
#[must_use]
pub fn checkout_request(lines: &[(&str, u32)]) -> CheckoutRequest {
    CheckoutRequest {
        buyer_id: BuyerId::new("buyer-1"),
        event_id: EventId::new(GALA),
        lines: lines
            .iter()
            .map(|(class, quantity)| CartLine::new(*class, *quantity))
            .collect(),
        discount_code: None,
        payment: PaymentConfirmation {
            paid: true,
            payment_reference: "pay_test_0001".to_string(),
        },
    }
}

/// A configuration with fast retries.
#[must_use]
pub fn fast_config() -> CheckoutConfig {
    CheckoutConfig {
        persist_retry: RetryPolicy::default().with_initial_delay(StdDuration::from_millis(1)),
        ..CheckoutConfig::default()
    }
}

/// In-memory collaborators for checkout tests.
///
/// # Example
///
/// ```
/// use boxoffice_testing::harness::{CheckoutHarness, checkout_request, ticket_class};
/// use boxoffice_core::TicketClassId;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let harness = CheckoutHarness::with_classes([ticket_class("vip", 5000, 10)])?;
/// let checkout = harness.checkout()?;
///
/// let record = checkout.run(checkout_request(&[("vip", 2)])).await?;
/// assert_eq!(record.tickets.len(), 2);
/// assert_eq!(harness.ledger.remaining(&TicketClassId::new("vip")), Some(8));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CheckoutHarness {
    /// Adjustable clock, starting at [`test_clock`]
    pub clock: Arc<ManualClock>,
    /// Inventory
    pub ledger: Arc<InMemoryInventoryLedger>,
    /// Discount codes
    pub discounts: Arc<InMemoryDiscountStore>,
    /// Orders and tickets
    pub orders: Arc<InMemoryOrderStore>,
    /// Captured notifications
    pub notifier: Arc<RecordingNotifier>,
    /// Token source, random unless scripted
    pub tokens: Arc<ScriptedTokenSource>,
}

impl CheckoutHarness {
    /// Harness over an inventory with the given classes.
    ///
    /// # Errors
    ///
    /// Returns the ledger error if a class cannot be registered.
    pub fn with_classes(classes: impl IntoIterator<Item = TicketClass>) -> Result<Self, LedgerError> {
        Ok(Self {
            clock: Arc::new(ManualClock::new(test_clock().now())),
            ledger: Arc::new(InMemoryInventoryLedger::with_classes(classes)?),
            discounts: Arc::new(InMemoryDiscountStore::new()),
            orders: Arc::new(InMemoryOrderStore::new()),
            notifier: Arc::new(RecordingNotifier::new()),
            tokens: Arc::new(ScriptedTokenSource::new()),
        })
    }

    /// The collaborators as trait objects.
    #[must_use]
    pub fn environment(&self) -> CheckoutEnvironment {
        CheckoutEnvironment {
            clock: self.clock.clone(),
            ledger: self.ledger.clone(),
            discounts: self.discounts.clone(),
            orders: self.orders.clone(),
            notifier: self.notifier.clone(),
            tokens: self.tokens.clone(),
        }
    }

    /// A checkout runner using [`fast_config`].
    ///
    /// # Errors
    ///
    /// Never fails for the fast configuration.
    pub fn checkout(&self) -> Result<CheckoutTransaction, ConfigError> {
        self.checkout_with(fast_config())
    }

    /// A checkout runner with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns the validation error for `config`.
    pub fn checkout_with(&self, config: CheckoutConfig) -> Result<CheckoutTransaction, ConfigError> {
        CheckoutTransaction::new(self.environment(), config)
    }
}
