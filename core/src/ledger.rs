//! Inventory ledger contract.
//!
//! The ledger owns `TicketClass::remaining`. Stock leaves the pool through
//! [`InventoryLedger::reserve`] and comes back only through a release of a
//! still-held reservation.
//!
//! # Reservation lifecycle
//!
//! ```text
//!            reserve
//!               │
//!               ▼
//!          ┌─────────┐   commit    ┌───────────┐
//!          │  Held   │────────────►│ Committed │
//!          └────┬────┘             └───────────┘
//!               │ release / expiry       ▲
//!               ▼                        │ commit (re-acquire stock)
//!          ┌──────────┐                  │
//!          │ Released │──────────────────┘
//!          └──────────┘
//! ```
//!
//! # Implementation requirements
//!
//! - `reserve` is a single compare-and-decrement (`remaining = remaining - q
//!   WHERE remaining >= q`), never a read followed by a write.
//! - Operations on different ticket classes must not contend on a shared lock.
//! - `release` and `commit` are idempotent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::BoxResult;
use crate::error::LedgerError;
use crate::types::{Availability, ReservationId, TicketClass, TicketClassId};

/// State of a reservation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationState {
    /// Stock is decremented and may still be returned
    Held,
    /// Stock is sold; the reservation can no longer be released
    Committed,
    /// Stock was returned to the pool
    Released,
}

impl ReservationState {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Held => "held",
            Self::Committed => "committed",
            Self::Released => "released",
        }
    }

    /// Parse from the database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "held" => Some(Self::Held),
            "committed" => Some(Self::Committed),
            "released" => Some(Self::Released),
            _ => None,
        }
    }
}

/// A hold against one ticket class, scoped to one checkout attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Reservation identifier
    pub id: ReservationId,
    /// Class the stock was taken from
    pub ticket_class_id: TicketClassId,
    /// Units held
    pub quantity: u32,
    /// Current state
    pub state: ReservationState,
    /// After this instant a held reservation may be released by the sweep
    pub expires_at: DateTime<Utc>,
}

/// Atomic reservation of ticket stock.
///
/// # Dyn Compatibility
///
/// Methods return boxed futures so the ledger can be shared as
/// `Arc<dyn InventoryLedger>`.
pub trait InventoryLedger: Send + Sync {
    /// Publish a ticket class. Its `remaining` is reset to `total_capacity`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidTicketClass`] if the record fails validation
    /// - [`LedgerError::DuplicateTicketClass`] if the id is taken
    fn register_class(&self, class: TicketClass) -> BoxResult<'_, (), LedgerError>;

    /// Look up a ticket class, including its current `remaining`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownTicketClass`] if it does not exist.
    fn ticket_class<'a>(
        &'a self,
        id: &'a TicketClassId,
    ) -> BoxResult<'a, TicketClass, LedgerError>;

    /// Current stock snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownTicketClass`] if it does not exist.
    fn availability<'a>(
        &'a self,
        id: &'a TicketClassId,
    ) -> BoxResult<'a, Availability, LedgerError>;

    /// Atomically take `quantity` units if at least that many remain.
    ///
    /// Either the whole quantity is held or nothing changes.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InsufficientStock`] with the quantity currently available
    /// - [`LedgerError::UnknownTicketClass`] if the class does not exist
    fn reserve<'a>(
        &'a self,
        id: &'a TicketClassId,
        quantity: u32,
        expires_at: DateTime<Utc>,
    ) -> BoxResult<'a, ReservationId, LedgerError>;

    /// Return a held reservation's stock to the pool.
    ///
    /// Releasing an already released or committed reservation is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownReservation`] if the id was never issued.
    fn release(&self, reservation: ReservationId) -> BoxResult<'_, (), LedgerError>;

    /// Mark a reservation sold. No quantity change for a held reservation.
    ///
    /// A reservation released by expiry re-acquires its quantity here; committing an
    /// already committed reservation is a no-op.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::ReservationLapsed`] if the stock could not be re-acquired
    /// - [`LedgerError::UnknownReservation`] if the id was never issued
    fn commit(&self, reservation: ReservationId) -> BoxResult<'_, (), LedgerError>;

    /// Release every held reservation whose `expires_at` is before `now`.
    ///
    /// Returns the ids that were released by this call.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] on backend failure.
    fn release_expired(&self, now: DateTime<Utc>) -> BoxResult<'_, Vec<ReservationId>, LedgerError>;
}
