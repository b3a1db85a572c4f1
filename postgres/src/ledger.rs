//! Inventory ledger on `ticket_classes` and `reservations`.

use boxoffice_core::{
    Availability, BoxResult, EventId, InventoryLedger, LedgerError, Money, Reservation,
    ReservationId, ReservationState, TicketClass, TicketClassId,
};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::{to_i32, to_i64, to_u32, to_u64};

/// `PostgreSQL`-backed [`InventoryLedger`].
///
/// `reserve` is one statement: a guarded decrement of `remaining` feeding the
/// reservation insert. If the guard fails no row is inserted, so a reservation
/// exists exactly when its stock was taken.
#[derive(Clone)]
pub struct PostgresInventoryLedger {
    pool: PgPool,
}

fn storage(context: &str) -> impl FnOnce(sqlx::Error) -> LedgerError + '_ {
    move |e| LedgerError::Storage(format!("{context}: {e}"))
}

fn class_from_row(row: &PgRow) -> Result<TicketClass, LedgerError> {
    let read = || -> Result<TicketClass, String> {
        let id: String = row.try_get("id").map_err(|e| e.to_string())?;
        let event_id: String = row.try_get("event_id").map_err(|e| e.to_string())?;
        let price: i64 = row.try_get("unit_price_cents").map_err(|e| e.to_string())?;
        let total: i32 = row.try_get("total_capacity").map_err(|e| e.to_string())?;
        let remaining: i32 = row.try_get("remaining").map_err(|e| e.to_string())?;
        let min: i32 = row.try_get("min_per_order").map_err(|e| e.to_string())?;
        let max: i32 = row.try_get("max_per_order").map_err(|e| e.to_string())?;
        Ok(TicketClass {
            id: TicketClassId::new(id),
            event_id: EventId::new(event_id),
            name: row.try_get("name").map_err(|e| e.to_string())?,
            unit_price: Money::from_cents(to_u64(price, "unit_price_cents")?),
            total_capacity: to_u32(total, "total_capacity")?,
            remaining: to_u32(remaining, "remaining")?,
            min_per_order: to_u32(min, "min_per_order")?,
            max_per_order: to_u32(max, "max_per_order")?,
        })
    };
    read().map_err(LedgerError::Storage)
}

impl PostgresInventoryLedger {
    /// Create a ledger over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load a reservation by id.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] if the query fails or a row is malformed.
    pub async fn reservation(&self, id: ReservationId) -> Result<Option<Reservation>, LedgerError> {
        let row = sqlx::query(
            "SELECT ticket_class_id, quantity, state, expires_at
             FROM reservations
             WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage("Failed to load reservation"))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let state: String = row
            .try_get("state")
            .map_err(storage("Failed to read reservation state"))?;
        let quantity: i32 = row
            .try_get("quantity")
            .map_err(storage("Failed to read reservation quantity"))?;
        Ok(Some(Reservation {
            id,
            ticket_class_id: TicketClassId::new(
                row.try_get::<String, _>("ticket_class_id")
                    .map_err(storage("Failed to read reservation class"))?,
            ),
            quantity: to_u32(quantity, "quantity").map_err(LedgerError::Storage)?,
            state: ReservationState::parse(&state)
                .ok_or_else(|| LedgerError::Storage(format!("Invalid reservation state: {state}")))?,
            expires_at: row
                .try_get("expires_at")
                .map_err(storage("Failed to read reservation expiry"))?,
        }))
    }

    async fn remaining_of(&self, id: &TicketClassId) -> Result<Option<u32>, LedgerError> {
        let remaining: Option<(i32,)> =
            sqlx::query_as("SELECT remaining FROM ticket_classes WHERE id = $1")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(storage("Failed to read remaining stock"))?;
        remaining
            .map(|(value,)| to_u32(value, "remaining").map_err(LedgerError::Storage))
            .transpose()
    }

    async fn reservation_exists(&self, id: ReservationId) -> Result<bool, LedgerError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM reservations WHERE id = $1)")
                .bind(id.as_uuid())
                .fetch_one(&self.pool)
                .await
                .map_err(storage("Failed to look up reservation"))?;
        Ok(exists)
    }
}

impl InventoryLedger for PostgresInventoryLedger {
    fn register_class(&self, class: TicketClass) -> BoxResult<'_, (), LedgerError> {
        Box::pin(async move {
            class.validate().map_err(LedgerError::InvalidTicketClass)?;
            let convert = |r: Result<i32, String>| r.map_err(LedgerError::InvalidTicketClass);

            let inserted: Option<(String,)> = sqlx::query_as(
                "INSERT INTO ticket_classes
                    (id, event_id, name, unit_price_cents, total_capacity, remaining,
                     min_per_order, max_per_order)
                 VALUES ($1, $2, $3, $4, $5, $5, $6, $7)
                 ON CONFLICT (id) DO NOTHING
                 RETURNING id",
            )
            .bind(class.id.as_str())
            .bind(class.event_id.as_str())
            .bind(&class.name)
            .bind(
                to_i64(class.unit_price.cents(), "unit_price")
                    .map_err(LedgerError::InvalidTicketClass)?,
            )
            .bind(convert(to_i32(class.total_capacity, "total_capacity"))?)
            .bind(convert(to_i32(class.min_per_order, "min_per_order"))?)
            .bind(convert(to_i32(class.max_per_order, "max_per_order"))?)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("Failed to register ticket class"))?;

            if inserted.is_none() {
                return Err(LedgerError::DuplicateTicketClass(class.id));
            }
            tracing::info!(
                ticket_class_id = %class.id,
                event_id = %class.event_id,
                capacity = class.total_capacity,
                "Ticket class registered"
            );
            Ok(())
        })
    }

    fn ticket_class<'a>(&'a self, id: &'a TicketClassId) -> BoxResult<'a, TicketClass, LedgerError> {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT id, event_id, name, unit_price_cents, total_capacity, remaining,
                        min_per_order, max_per_order
                 FROM ticket_classes
                 WHERE id = $1",
            )
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("Failed to load ticket class"))?
            .ok_or_else(|| LedgerError::UnknownTicketClass(id.clone()))?;

            class_from_row(&row)
        })
    }

    fn availability<'a>(&'a self, id: &'a TicketClassId) -> BoxResult<'a, Availability, LedgerError> {
        Box::pin(async move {
            let row: Option<(i32, i32)> = sqlx::query_as(
                "SELECT total_capacity, remaining FROM ticket_classes WHERE id = $1",
            )
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("Failed to load availability"))?;

            let (total, remaining) = row.ok_or_else(|| LedgerError::UnknownTicketClass(id.clone()))?;
            Ok(Availability {
                total_capacity: to_u32(total, "total_capacity").map_err(LedgerError::Storage)?,
                remaining: to_u32(remaining, "remaining").map_err(LedgerError::Storage)?,
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
            let Ok(requested) = i32::try_from(quantity) else {
                let available = self
                    .remaining_of(id)
                    .await?
                    .ok_or_else(|| LedgerError::UnknownTicketClass(id.clone()))?;
                return Err(LedgerError::InsufficientStock {
                    ticket_class_id: id.clone(),
                    requested: quantity,
                    available,
                });
            };
            let reservation = ReservationId::new();

            let taken: Option<(Uuid,)> = sqlx::query_as(
                "WITH taken AS (
                    UPDATE ticket_classes
                    SET remaining = remaining - $2
                    WHERE id = $1 AND remaining >= $2
                    RETURNING id
                 )
                 INSERT INTO reservations (id, ticket_class_id, quantity, state, expires_at)
                 SELECT $3, id, $2, 'held', $4 FROM taken
                 RETURNING id",
            )
            .bind(id.as_str())
            .bind(requested)
            .bind(reservation.as_uuid())
            .bind(expires_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("Failed to reserve stock"))?;

            if taken.is_some() {
                tracing::debug!(
                    reservation_id = %reservation,
                    ticket_class_id = %id,
                    quantity,
                    "Stock reserved"
                );
                return Ok(reservation);
            }

            match self.remaining_of(id).await? {
                None => Err(LedgerError::UnknownTicketClass(id.clone())),
                Some(available) => Err(LedgerError::InsufficientStock {
                    ticket_class_id: id.clone(),
                    requested: quantity,
                    available,
                }),
            }
        })
    }

    fn release(&self, reservation: ReservationId) -> BoxResult<'_, (), LedgerError> {
        Box::pin(async move {
            let restored: Option<(String,)> = sqlx::query_as(
                "WITH released AS (
                    UPDATE reservations
                    SET state = 'released', updated_at = now()
                    WHERE id = $1 AND state = 'held'
                    RETURNING ticket_class_id, quantity
                 )
                 UPDATE ticket_classes t
                 SET remaining = t.remaining + r.quantity
                 FROM released r
                 WHERE t.id = r.ticket_class_id
                 RETURNING t.id",
            )
            .bind(reservation.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("Failed to release reservation"))?;

            if restored.is_some() {
                tracing::debug!(reservation_id = %reservation, "Reservation released");
                return Ok(());
            }
            if self.reservation_exists(reservation).await? {
                Ok(())
            } else {
                Err(LedgerError::UnknownReservation(reservation))
            }
        })
    }

    fn commit(&self, reservation: ReservationId) -> BoxResult<'_, (), LedgerError> {
        Box::pin(async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(storage("Failed to begin commit"))?;

            let row: Option<(String, i32, String)> = sqlx::query_as(
                "SELECT ticket_class_id, quantity, state
                 FROM reservations
                 WHERE id = $1
                 FOR UPDATE",
            )
            .bind(reservation.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage("Failed to lock reservation"))?;

            let (class_id, quantity, state) =
                row.ok_or(LedgerError::UnknownReservation(reservation))?;

            match ReservationState::parse(&state) {
                Some(ReservationState::Committed) => return Ok(()),
                Some(ReservationState::Held) => {},
                Some(ReservationState::Released) => {
                    let reacquired = sqlx::query(
                        "UPDATE ticket_classes
                         SET remaining = remaining - $2
                         WHERE id = $1 AND remaining >= $2",
                    )
                    .bind(&class_id)
                    .bind(quantity)
                    .execute(&mut *tx)
                    .await
                    .map_err(storage("Failed to re-acquire stock"))?;

                    if reacquired.rows_affected() == 0 {
                        metrics::counter!("boxoffice_reservations_lapsed_total").increment(1);
                        return Err(LedgerError::ReservationLapsed(reservation));
                    }
                    tracing::info!(
                        reservation_id = %reservation,
                        ticket_class_id = %class_id,
                        "Lapsed reservation re-acquired its stock"
                    );
                },
                None => {
                    return Err(LedgerError::Storage(format!(
                        "Invalid reservation state: {state}"
                    )));
                },
            }

            sqlx::query(
                "UPDATE reservations SET state = 'committed', updated_at = now() WHERE id = $1",
            )
            .bind(reservation.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(storage("Failed to commit reservation"))?;

            tx.commit().await.map_err(storage("Failed to commit transaction"))?;
            Ok(())
        })
    }

    fn release_expired(&self, now: DateTime<Utc>) -> BoxResult<'_, Vec<ReservationId>, LedgerError> {
        Box::pin(async move {
            let rows: Vec<(Uuid,)> = sqlx::query_as(
                "WITH expired AS (
                    UPDATE reservations
                    SET state = 'released', updated_at = now()
                    WHERE state = 'held' AND expires_at < $1
                    RETURNING id, ticket_class_id, quantity
                 ),
                 restored AS (
                    UPDATE ticket_classes t
                    SET remaining = t.remaining + e.total
                    FROM (
                        SELECT ticket_class_id, SUM(quantity)::INTEGER AS total
                        FROM expired
                        GROUP BY ticket_class_id
                    ) e
                    WHERE t.id = e.ticket_class_id
                    RETURNING t.id
                 )
                 SELECT id FROM expired",
            )
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(storage("Failed to release expired reservations"))?;

            Ok(rows
                .into_iter()
                .map(|(id,)| ReservationId::from_uuid(id))
                .collect())
        })
    }
}
