//! Domain types for ticket inventory and order fulfillment.
//!
//! Every persisted record here has a fixed shape. Storage backends validate rows
//! against these types at the boundary instead of trusting free-form documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::token::RedemptionToken;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an identifier from a `Uuid`.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of a ticket class (e.g. `"vip"`). Assigned by the catalog.
    TicketClassId
);
string_id!(
    /// Identifier of an event in the catalog.
    EventId
);
string_id!(
    /// Identifier of the buyer, issued by the identity provider.
    BuyerId
);
uuid_id!(
    /// Unique identifier for an order.
    OrderId
);
uuid_id!(
    /// Unique identifier for a ticket (distinct from its redemption token).
    TicketId
);
uuid_id!(
    /// Unique identifier for an inventory reservation.
    ReservationId
);

// ============================================================================
// Money
// ============================================================================

/// Amount in minor currency units (cents).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents.
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Returns the amount in cents.
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two amounts, saturating at `u64::MAX`.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Subtracts `other`, flooring at zero.
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Multiplies by a quantity, saturating at `u64::MAX`.
    #[must_use]
    pub const fn saturating_mul(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(quantity as u64))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Ticket classes
// ============================================================================

/// One sellable tier of one event (e.g. "VIP").
///
/// `total_capacity` is fixed once the class is published; `remaining` is only
/// changed by the inventory ledger and always satisfies
/// `0 <= remaining <= total_capacity`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketClass {
    /// Class identifier
    pub id: TicketClassId,
    /// Event this class belongs to
    pub event_id: EventId,
    /// Display name
    pub name: String,
    /// Price per ticket
    pub unit_price: Money,
    /// Total tickets that can ever be sold
    pub total_capacity: u32,
    /// Tickets still available
    pub remaining: u32,
    /// Smallest quantity one order may contain
    pub min_per_order: u32,
    /// Largest quantity one order may contain
    pub max_per_order: u32,
}

/// Per-order cap applied by [`TicketClass::new`].
pub const DEFAULT_MAX_PER_ORDER: u32 = 10;

impl TicketClass {
    /// Creates a freshly published class with `remaining == total_capacity`
    /// and order limits `1..=DEFAULT_MAX_PER_ORDER`.
    #[must_use]
    pub fn new(
        id: impl Into<TicketClassId>,
        event_id: impl Into<EventId>,
        name: impl Into<String>,
        unit_price: Money,
        total_capacity: u32,
    ) -> Self {
        Self {
            id: id.into(),
            event_id: event_id.into(),
            name: name.into(),
            unit_price,
            total_capacity,
            remaining: total_capacity,
            min_per_order: 1,
            max_per_order: DEFAULT_MAX_PER_ORDER,
        }
    }

    /// Set the per-order quantity bounds.
    #[must_use]
    pub const fn with_order_limits(mut self, min_per_order: u32, max_per_order: u32) -> Self {
        self.min_per_order = min_per_order;
        self.max_per_order = max_per_order;
        self
    }

    /// Check the record is publishable.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated rule.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.as_str().is_empty() {
            return Err("ticket class id must not be empty".to_string());
        }
        if self.min_per_order == 0 {
            return Err("min_per_order must be at least 1".to_string());
        }
        if self.min_per_order > self.max_per_order {
            return Err(format!(
                "min_per_order ({}) exceeds max_per_order ({})",
                self.min_per_order, self.max_per_order
            ));
        }
        if self.remaining > self.total_capacity {
            return Err(format!(
                "remaining ({}) exceeds total_capacity ({})",
                self.remaining, self.total_capacity
            ));
        }
        Ok(())
    }

    /// Whether `quantity` is within this class's per-order bounds.
    #[must_use]
    pub const fn accepts_quantity(&self, quantity: u32) -> bool {
        quantity >= self.min_per_order && quantity <= self.max_per_order
    }
}

/// Point-in-time stock snapshot for a ticket class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    /// Total capacity of the class
    pub total_capacity: u32,
    /// Tickets not currently held or sold
    pub remaining: u32,
}

// ============================================================================
// Discount codes
// ============================================================================

/// How a discount value is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// `value` is a whole percentage (0..=100) of the subtotal
    Percentage,
    /// `value` is an amount in minor currency units
    FixedAmount,
}

impl DiscountKind {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Percentage => "percentage",
            Self::FixedAmount => "fixed_amount",
        }
    }

    /// Parse from the database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "percentage" => Some(Self::Percentage),
            "fixed_amount" => Some(Self::FixedAmount),
            _ => None,
        }
    }
}

/// A named promotional rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountCode {
    /// Code as typed by buyers; stored normalized (see [`DiscountCode::normalize`])
    pub code: String,
    /// Percentage or fixed amount
    pub kind: DiscountKind,
    /// Percentage points or minor units, depending on `kind`
    pub value: u64,
    /// Start of the validity window (inclusive)
    pub active_from: DateTime<Utc>,
    /// End of the validity window (inclusive)
    pub active_until: DateTime<Utc>,
    /// Redemption cap; `None` means unlimited
    pub max_redemptions: Option<u32>,
    /// Orders that have used this code
    pub redemptions_used: u32,
    /// Events the code applies to; empty means every event
    pub applicable_event_ids: Vec<EventId>,
    /// Operator kill switch
    pub enabled: bool,
}

impl DiscountCode {
    /// Canonical form used for storage and case-insensitive lookup.
    #[must_use]
    pub fn normalize(code: &str) -> String {
        code.trim().to_uppercase()
    }

    /// Check the record before it is stored.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated rule.
    pub fn validate(&self) -> Result<(), String> {
        if Self::normalize(&self.code).is_empty() {
            return Err("discount code must not be empty".to_string());
        }
        if self.kind == DiscountKind::Percentage && self.value > 100 {
            return Err(format!("percentage discount {} exceeds 100", self.value));
        }
        if self.active_from > self.active_until {
            return Err("active_from is after active_until".to_string());
        }
        if let Some(max) = self.max_redemptions {
            if self.redemptions_used > max {
                return Err(format!(
                    "redemptions_used ({}) exceeds max_redemptions ({max})",
                    self.redemptions_used
                ));
            }
        }
        Ok(())
    }

    /// Whether the code may be used for `event_id`.
    #[must_use]
    pub fn applies_to(&self, event_id: &EventId) -> bool {
        self.applicable_event_ids.is_empty() || self.applicable_event_ids.contains(event_id)
    }

    /// Whether the redemption cap has been reached.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.max_redemptions
            .is_some_and(|max| self.redemptions_used >= max)
    }
}

// ============================================================================
// Cart
// ============================================================================

/// One line of a client-held cart. Exists only for one checkout attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Class being purchased
    pub ticket_class_id: TicketClassId,
    /// Number of tickets
    pub quantity: u32,
    /// Price the client displayed; informational, never trusted for charging
    pub unit_price_snapshot: Option<Money>,
}

impl CartLine {
    /// Creates a cart line without a client price snapshot.
    #[must_use]
    pub fn new(ticket_class_id: impl Into<TicketClassId>, quantity: u32) -> Self {
        Self {
            ticket_class_id: ticket_class_id.into(),
            quantity,
            unit_price_snapshot: None,
        }
    }
}

/// Payment result handed in by the external payment collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    /// Whether payment was authorized
    pub paid: bool,
    /// Provider reference recorded on the order
    pub payment_reference: String,
}

// ============================================================================
// Orders and tickets
// ============================================================================

/// Order lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created but not yet paid
    Pending,
    /// Paid; immutable except for a refund
    Paid,
    /// Payment failed
    Failed,
    /// Refunded after being paid
    Refunded,
}

impl OrderStatus {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }

    /// Parse from the database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "failed" => Some(Self::Failed),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid | Self::Failed) | (Self::Paid, Self::Refunded)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A purchased line, priced at the moment of sale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Class purchased
    pub ticket_class_id: TicketClassId,
    /// Number of tickets
    pub quantity: u32,
    /// Unit price charged
    pub unit_price: Money,
}

/// The durable record of a completed purchase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Order identifier
    pub id: OrderId,
    /// Buyer
    pub buyer_id: BuyerId,
    /// Purchased lines
    pub lines: Vec<OrderLine>,
    /// Sum of line totals
    pub subtotal: Money,
    /// Service fee charged on the subtotal
    pub service_fee: Money,
    /// Normalized discount code, if one was used
    pub discount_code: Option<String>,
    /// Discount applied
    pub discount_amount: Money,
    /// Amount charged
    pub total: Money,
    /// Reference from the payment collaborator
    pub payment_reference: String,
    /// Lifecycle status
    pub status: OrderStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Total number of tickets across all lines.
    #[must_use]
    pub fn ticket_count(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }
}

/// One redeemable admission, 1:1 with a sold unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Ticket identifier
    pub id: TicketId,
    /// Owning order
    pub order_id: OrderId,
    /// Class sold
    pub ticket_class_id: TicketClassId,
    /// Event admitted to
    pub event_id: EventId,
    /// Opaque, globally unique check-in token
    pub redemption_token: RedemptionToken,
    /// Whether the ticket has been checked in; never reverts
    pub used: bool,
    /// Check-in time
    pub used_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(1050).to_string(), "10.50");
        assert_eq!(Money::from_cents(7).to_string(), "0.07");
    }

    #[test]
    fn test_money_saturates() {
        assert_eq!(
            Money::from_cents(5).saturating_sub(Money::from_cents(9)),
            Money::ZERO
        );
        assert_eq!(
            Money::from_cents(u64::MAX).saturating_add(Money::from_cents(1)),
            Money::from_cents(u64::MAX)
        );
    }

    #[test]
    fn test_ticket_class_validation() {
        let class = TicketClass::new("vip", "gala", "VIP", Money::from_cents(5000), 10);
        assert!(class.validate().is_ok());
        assert!(class.clone().with_order_limits(0, 4).validate().is_err());
        assert!(class.clone().with_order_limits(5, 4).validate().is_err());

        let mut oversized = class;
        oversized.remaining = 11;
        assert!(oversized.validate().is_err());
    }

    #[test]
    fn test_ticket_class_quantity_bounds() {
        let class = TicketClass::new("ga", "gala", "General", Money::from_cents(1000), 100)
            .with_order_limits(2, 6);
        assert!(!class.accepts_quantity(1));
        assert!(class.accepts_quantity(2));
        assert!(class.accepts_quantity(6));
        assert!(!class.accepts_quantity(7));
    }

    #[test]
    fn test_discount_code_normalize() {
        assert_eq!(DiscountCode::normalize("  vip20 "), "VIP20");
    }

    #[test]
    fn test_order_status_transitions() {
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Refunded));
        assert!(!OrderStatus::Refunded.can_transition_to(OrderStatus::Paid));
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Pending));
        assert_eq!(OrderStatus::parse("refunded"), Some(OrderStatus::Refunded));
        assert_eq!(OrderStatus::parse("shipped"), None);
    }

    #[test]
    fn test_ticket_count_does_not_overflow() {
        let line = |id: &str| OrderLine {
            ticket_class_id: TicketClassId::new(id),
            quantity: u32::MAX,
            unit_price: Money::ZERO,
        };
        let order = Order {
            id: OrderId::new(),
            buyer_id: BuyerId::new("buyer"),
            lines: vec![line("vip"), line("ga")],
            subtotal: Money::ZERO,
            service_fee: Money::ZERO,
            discount_code: None,
            discount_amount: Money::ZERO,
            total: Money::ZERO,
            payment_reference: "pay".to_string(),
            status: OrderStatus::Paid,
            created_at: Utc::now(),
        };
        assert_eq!(order.ticket_count(), 2 * u64::from(u32::MAX));
    }
}
