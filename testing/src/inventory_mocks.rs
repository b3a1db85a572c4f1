//! In-memory inventory ledger.
//!
//! Each ticket class keeps its `remaining` in an [`AtomicU32`] updated with a
//! compare-and-swap loop, so reservations on one class never wait on another.
//! Reservation state changes happen under the reservation's own map entry.

use boxoffice_core::{
    Availability, BoxResult, InventoryLedger, LedgerError, Reservation, ReservationId,
    ReservationState, TicketClass, TicketClassId,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// A published class and its live stock counter.
#[derive(Debug)]
struct ClassSlot {
    class: TicketClass,
    remaining: AtomicU32,
}

impl ClassSlot {
    /// Compare-and-decrement. Returns the stock seen on failure.
    fn take(&self, quantity: u32) -> Result<(), u32> {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |r| r.checked_sub(quantity))
            .map(|_| ())
    }

    fn put_back(&self, quantity: u32) {
        let capacity = self.class.total_capacity;
        // Saturates at capacity; the closure never returns None so the result is always Ok.
        let _ = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |r| {
                Some(r.saturating_add(quantity).min(capacity))
            });
    }

    fn snapshot(&self) -> TicketClass {
        let mut class = self.class.clone();
        class.remaining = self.remaining.load(Ordering::Acquire);
        class
    }
}

#[derive(Debug)]
struct HeldReservation {
    reservation: Reservation,
    slot: Arc<ClassSlot>,
}

/// In-memory [`InventoryLedger`] for fast, deterministic tests.
///
/// # Example
///
/// ```
/// use boxoffice_testing::InMemoryInventoryLedger;
/// use boxoffice_core::{InventoryLedger, Money, TicketClass, TicketClassId};
/// use chrono::Utc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let ledger = InMemoryInventoryLedger::new();
/// ledger.register_class(TicketClass::new("vip", "gala", "VIP", Money::from_cents(5000), 2)).await?;
///
/// let id = TicketClassId::new("vip");
/// let reservation = ledger.reserve(&id, 2, Utc::now()).await?;
/// assert_eq!(ledger.remaining(&id), Some(0));
///
/// ledger.release(reservation).await?;
/// assert_eq!(ledger.remaining(&id), Some(2));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryInventoryLedger {
    classes: DashMap<TicketClassId, Arc<ClassSlot>>,
    reservations: DashMap<ReservationId, HeldReservation>,
}

impl InMemoryInventoryLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ledger with classes already published.
    ///
    /// # Errors
    ///
    /// Returns the first registration error.
    pub fn with_classes(classes: impl IntoIterator<Item = TicketClass>) -> Result<Self, LedgerError> {
        let ledger = Self::new();
        for class in classes {
            ledger.insert_class(class)?;
        }
        Ok(ledger)
    }

    fn insert_class(&self, mut class: TicketClass) -> Result<(), LedgerError> {
        class.remaining = class.total_capacity;
        class.validate().map_err(LedgerError::InvalidTicketClass)?;

        match self.classes.entry(class.id.clone()) {
            Entry::Occupied(_) => Err(LedgerError::DuplicateTicketClass(class.id)),
            Entry::Vacant(vacant) => {
                let remaining = AtomicU32::new(class.remaining);
                vacant.insert(Arc::new(ClassSlot { class, remaining }));
                Ok(())
            },
        }
    }

    fn slot(&self, id: &TicketClassId) -> Result<Arc<ClassSlot>, LedgerError> {
        self.classes
            .get(id)
            .map(|slot| Arc::clone(slot.value()))
            .ok_or_else(|| LedgerError::UnknownTicketClass(id.clone()))
    }

    /// Current stock of a class, if it exists.
    #[must_use]
    pub fn remaining(&self, id: &TicketClassId) -> Option<u32> {
        self.classes
            .get(id)
            .map(|slot| slot.remaining.load(Ordering::Acquire))
    }

    /// Look up a reservation.
    #[must_use]
    pub fn reservation(&self, id: ReservationId) -> Option<Reservation> {
        self.reservations
            .get(&id)
            .map(|held| held.reservation.clone())
    }

    /// Number of reservations currently in `state`.
    #[must_use]
    pub fn count_in_state(&self, state: ReservationState) -> usize {
        self.reservations
            .iter()
            .filter(|held| held.reservation.state == state)
            .count()
    }

    fn release_now(&self, id: ReservationId) -> Result<bool, LedgerError> {
        let mut held = self
            .reservations
            .get_mut(&id)
            .ok_or(LedgerError::UnknownReservation(id))?;

        if held.reservation.state != ReservationState::Held {
            return Ok(false);
        }
        held.reservation.state = ReservationState::Released;
        held.slot.put_back(held.reservation.quantity);
        Ok(true)
    }
}

impl InventoryLedger for InMemoryInventoryLedger {
    fn register_class(&self, class: TicketClass) -> BoxResult<'_, (), LedgerError> {
        Box::pin(async move { self.insert_class(class) })
    }

    fn ticket_class<'a>(&'a self, id: &'a TicketClassId) -> BoxResult<'a, TicketClass, LedgerError> {
        Box::pin(async move { Ok(self.slot(id)?.snapshot()) })
    }

    fn availability<'a>(&'a self, id: &'a TicketClassId) -> BoxResult<'a, Availability, LedgerError> {
        Box::pin(async move {
            let slot = self.slot(id)?;
            Ok(Availability {
                total_capacity: slot.class.total_capacity,
                remaining: slot.remaining.load(Ordering::Acquire),
            })
        })
    }

    fn reserve<'a>(
        &'a self,
        id: &'a TicketClassId,
        quantity: u32,
        expires_at: DateTime<Utc>,
    ) -> BoxResult<'a, ReservationId, LedgerError> {
        Box::pin(async move {
            let slot = self.slot(id)?;
            slot.take(quantity)
                .map_err(|available| LedgerError::InsufficientStock {
                    ticket_class_id: id.clone(),
                    requested: quantity,
                    available,
                })?;

            let reservation = Reservation {
                id: ReservationId::new(),
                ticket_class_id: id.clone(),
                quantity,
                state: ReservationState::Held,
                expires_at,
            };
            let reservation_id = reservation.id;
            self.reservations
                .insert(reservation_id, HeldReservation { reservation, slot });
            Ok(reservation_id)
        })
    }

    fn release(&self, reservation: ReservationId) -> BoxResult<'_, (), LedgerError> {
        Box::pin(async move { self.release_now(reservation).map(|_| ()) })
    }

    fn commit(&self, reservation: ReservationId) -> BoxResult<'_, (), LedgerError> {
        Box::pin(async move {
            let mut held = self
                .reservations
                .get_mut(&reservation)
                .ok_or(LedgerError::UnknownReservation(reservation))?;

            match held.reservation.state {
                ReservationState::Committed => Ok(()),
                ReservationState::Held => {
                    held.reservation.state = ReservationState::Committed;
                    Ok(())
                },
                ReservationState::Released => {
                    held.slot
                        .take(held.reservation.quantity)
                        .map_err(|_| LedgerError::ReservationLapsed(reservation))?;
                    held.reservation.state = ReservationState::Committed;
                    Ok(())
                },
            }
        })
    }

    fn release_expired(&self, now: DateTime<Utc>) -> BoxResult<'_, Vec<ReservationId>, LedgerError> {
        Box::pin(async move {
            let expired: Vec<ReservationId> = self
                .reservations
                .iter()
                .filter(|held| {
                    held.reservation.state == ReservationState::Held
                        && held.reservation.expires_at < now
                })
                .map(|held| *held.key())
                .collect();

            let mut released = Vec::with_capacity(expired.len());
            for id in expired {
                if self.release_now(id)? {
                    released.push(id);
                }
            }
            Ok(released)
        })
    }
}
