//! Error taxonomy for inventory, discounts, storage and checkout.
//!
//! Client-facing kinds are carried by [`CheckoutError`]. Internal conditions
//! (token collisions, lapsed reservations) are handled inside the checkout and
//! never reach the buyer.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::token::RedemptionToken;
use crate::types::{OrderStatus, ReservationId, TicketClassId};

/// Errors returned by an [`InventoryLedger`](crate::InventoryLedger).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Not enough stock to satisfy the reservation. Retryable with a smaller quantity.
    #[error("Insufficient stock for ticket class {ticket_class_id}: requested {requested}, available {available}")]
    InsufficientStock {
        /// Class that ran short
        ticket_class_id: TicketClassId,
        /// Quantity requested
        requested: u32,
        /// Quantity available when the reservation was attempted
        available: u32,
    },

    /// The ticket class does not exist. Not retryable.
    #[error("Unknown ticket class: {0}")]
    UnknownTicketClass(TicketClassId),

    /// The reservation does not exist.
    #[error("Unknown reservation: {0}")]
    UnknownReservation(ReservationId),

    /// The reservation was released before commit and its stock is gone.
    #[error("Reservation {0} lapsed and its stock was taken")]
    ReservationLapsed(ReservationId),

    /// A ticket class with this id is already registered.
    #[error("Ticket class already registered: {0}")]
    DuplicateTicketClass(TicketClassId),

    /// The ticket class record is malformed.
    #[error("Invalid ticket class: {0}")]
    InvalidTicketClass(String),

    /// Storage backend failure.
    #[error("Ledger storage error: {0}")]
    Storage(String),
}

/// Why a discount code was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountRejection {
    /// No code with that name
    NotFound,
    /// Switched off by an operator
    Disabled,
    /// Outside `active_from..=active_until`
    OutOfWindow,
    /// Redemption cap reached
    Exhausted,
    /// Not valid for the event being purchased
    NotApplicable,
}

impl DiscountRejection {
    /// Stable machine-readable reason.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Disabled => "disabled",
            Self::OutOfWindow => "out_of_window",
            Self::Exhausted => "exhausted",
            Self::NotApplicable => "not_applicable",
        }
    }
}

impl fmt::Display for DiscountRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::NotFound => "discount code does not exist",
            Self::Disabled => "discount code is disabled",
            Self::OutOfWindow => "discount code is not active at this time",
            Self::Exhausted => "discount code has no redemptions left",
            Self::NotApplicable => "discount code does not apply to this event",
        };
        f.write_str(message)
    }
}

/// Errors returned by the [`DiscountEngine`](crate::DiscountEngine).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscountError {
    /// The code was refused.
    #[error("Discount rejected: {0}")]
    Rejected(DiscountRejection),

    /// Storage backend failure.
    #[error("Discount storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for DiscountError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => Self::Rejected(DiscountRejection::NotFound),
            other => Self::Storage(other.to_string()),
        }
    }
}

/// Errors returned by [`DiscountStore`](crate::DiscountStore) and
/// [`OrderStore`](crate::OrderStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Record not found.
    #[error("Record not found")]
    NotFound,

    /// A redemption token already exists. `None` when the backend cannot tell which.
    #[error("Redemption token collision")]
    TokenCollision(Option<RedemptionToken>),

    /// A record with the same key already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The requested status change is not allowed.
    #[error("Invalid order status transition from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: OrderStatus,
        /// Requested status
        to: OrderStatus,
    },

    /// The ticket has already been checked in.
    #[error("Ticket already used")]
    AlreadyUsed,

    /// A record failed validation at the storage boundary.
    #[error("Invalid record: {0}")]
    Invalid(String),

    /// Transient backend failure; the operation may be retried.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether retrying the same operation may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Errors surfaced by a checkout attempt.
///
/// Every variant is returned only after all reservations taken by the attempt
/// have been released.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    /// Cart is structurally invalid. Not retryable as-is.
    #[error("Invalid cart: {0}")]
    InvalidCart(String),

    /// Payment was not confirmed by the payment collaborator.
    #[error("Payment not confirmed")]
    PaymentNotConfirmed,

    /// Cart references a ticket class that does not exist.
    #[error("Unknown ticket class: {0}")]
    UnknownTicketClass(TicketClassId),

    /// Not enough tickets left. Retryable with at most `available`.
    #[error("Not enough tickets left for {ticket_class_id}: requested {requested}, available {available}")]
    InsufficientStock {
        /// Class that ran short
        ticket_class_id: TicketClassId,
        /// Quantity requested
        requested: u32,
        /// Quantity currently available
        available: u32,
    },

    /// The discount code was refused.
    #[error("Discount code invalid: {0}")]
    DiscountInvalid(DiscountRejection),

    /// Transient storage failure. Retry the whole checkout.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The caller cancelled the checkout.
    #[error("Checkout cancelled")]
    Cancelled,

    /// The checkout deadline passed before the order was written.
    #[error("Checkout timed out")]
    TimedOut,
}

impl CheckoutError {
    /// Stable machine-readable error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidCart(_) => "invalid_cart",
            Self::PaymentNotConfirmed => "payment_not_confirmed",
            Self::UnknownTicketClass(_) => "unknown_ticket_class",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::DiscountInvalid(_) => "discount_invalid",
            Self::Persistence(_) => "persistence_error",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed_out",
        }
    }

    /// Whether the buyer can retry (possibly with a changed cart).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientStock { .. } | Self::Persistence(_) | Self::TimedOut
        )
    }
}

impl From<LedgerError> for CheckoutError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::InsufficientStock {
                ticket_class_id,
                requested,
                available,
            } => Self::InsufficientStock {
                ticket_class_id,
                requested,
                available,
            },
            LedgerError::UnknownTicketClass(id) => Self::UnknownTicketClass(id),
            other => Self::Persistence(other.to_string()),
        }
    }
}

impl From<DiscountError> for CheckoutError {
    fn from(error: DiscountError) -> Self {
        match error {
            DiscountError::Rejected(reason) => Self::DiscountInvalid(reason),
            DiscountError::Storage(message) => Self::Persistence(message),
        }
    }
}
