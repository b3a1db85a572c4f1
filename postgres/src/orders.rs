//! Orders and tickets on `orders` and `tickets`.

use boxoffice_core::{
    BoxResult, BuyerId, EventId, Money, Order, OrderId, OrderLine, OrderRecord, OrderStatus,
    OrderStore, RedemptionToken, StoreError, Ticket, TicketClassId, TicketId,
};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::store_error;
use crate::{to_i32, to_i64, to_u64};

const ORDER_COLUMNS: &str = "id, buyer_id, lines_json, subtotal_cents, service_fee_cents, \
     discount_code, discount_amount_cents, total_cents, payment_reference, status, created_at";

const TICKET_COLUMNS: &str =
    "id, order_id, ticket_class_id, event_id, redemption_token, used, used_at";

/// `PostgreSQL`-backed [`OrderStore`].
///
/// An order row and all of its ticket rows are inserted in one transaction.
/// Redemption tokens are protected by a unique constraint; a violation is
/// reported as [`StoreError::TokenCollision`] so the caller can re-mint.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn tickets_of(&self, order: OrderId) -> Result<Vec<Ticket>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE order_id = $1 ORDER BY position"
        ))
        .bind(order.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.iter().map(ticket_from_row).collect()
    }
}

fn money(row: &PgRow, column: &str) -> Result<Money, StoreError> {
    let cents: i64 = row.try_get(column).map_err(store_error)?;
    to_u64(cents, column)
        .map(Money::from_cents)
        .map_err(StoreError::Invalid)
}

fn cents(amount: Money, column: &str) -> Result<i64, StoreError> {
    to_i64(amount.cents(), column).map_err(StoreError::Invalid)
}

fn order_from_row(row: &PgRow) -> Result<Order, StoreError> {
    let status: String = row.try_get("status").map_err(store_error)?;
    let lines: Json<Vec<OrderLine>> = row.try_get("lines_json").map_err(store_error)?;
    Ok(Order {
        id: OrderId::from_uuid(row.try_get("id").map_err(store_error)?),
        buyer_id: BuyerId::new(row.try_get::<String, _>("buyer_id").map_err(store_error)?),
        lines: lines.0,
        subtotal: money(row, "subtotal_cents")?,
        service_fee: money(row, "service_fee_cents")?,
        discount_code: row.try_get("discount_code").map_err(store_error)?,
        discount_amount: money(row, "discount_amount_cents")?,
        total: money(row, "total_cents")?,
        payment_reference: row.try_get("payment_reference").map_err(store_error)?,
        status: OrderStatus::parse(&status)
            .ok_or_else(|| StoreError::Invalid(format!("Invalid order status: {status}")))?,
        created_at: row.try_get("created_at").map_err(store_error)?,
    })
}

fn ticket_from_row(row: &PgRow) -> Result<Ticket, StoreError> {
    Ok(Ticket {
        id: TicketId::from_uuid(row.try_get("id").map_err(store_error)?),
        order_id: OrderId::from_uuid(row.try_get("order_id").map_err(store_error)?),
        ticket_class_id: TicketClassId::new(
            row.try_get::<String, _>("ticket_class_id")
                .map_err(store_error)?,
        ),
        event_id: EventId::new(row.try_get::<String, _>("event_id").map_err(store_error)?),
        redemption_token: RedemptionToken::from_string(
            row.try_get::<String, _>("redemption_token")
                .map_err(store_error)?,
        ),
        used: row.try_get("used").map_err(store_error)?,
        used_at: row.try_get("used_at").map_err(store_error)?,
    })
}

impl OrderStore for PostgresOrderStore {
    fn persist<'a>(&'a self, record: &'a OrderRecord) -> BoxResult<'a, (), StoreError> {
        Box::pin(async move {
            record.validate()?;
            let order = &record.order;

            let mut ids: Vec<Uuid> = Vec::with_capacity(record.tickets.len());
            let mut positions = Vec::with_capacity(record.tickets.len());
            let mut classes = Vec::with_capacity(record.tickets.len());
            let mut events = Vec::with_capacity(record.tickets.len());
            let mut tokens = Vec::with_capacity(record.tickets.len());
            for (position, ticket) in record.tickets.iter().enumerate() {
                ids.push(*ticket.id.as_uuid());
                positions.push(
                    u32::try_from(position)
                        .map_err(|e| e.to_string())
                        .and_then(|p| to_i32(p, "position"))
                        .map_err(StoreError::Invalid)?,
                );
                classes.push(ticket.ticket_class_id.as_str().to_string());
                events.push(ticket.event_id.as_str().to_string());
                tokens.push(ticket.redemption_token.as_str().to_string());
            }

            let mut tx = self.pool.begin().await.map_err(store_error)?;

            sqlx::query(
                "INSERT INTO orders
                    (id, buyer_id, lines_json, subtotal_cents, service_fee_cents, discount_code,
                     discount_amount_cents, total_cents, payment_reference, status, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(order.id.as_uuid())
            .bind(order.buyer_id.as_str())
            .bind(Json(&order.lines))
            .bind(cents(order.subtotal, "subtotal")?)
            .bind(cents(order.service_fee, "service_fee")?)
            .bind(order.discount_code.as_deref())
            .bind(cents(order.discount_amount, "discount_amount")?)
            .bind(cents(order.total, "total")?)
            .bind(&order.payment_reference)
            .bind(order.status.as_str())
            .bind(order.created_at)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;

            sqlx::query(
                "INSERT INTO tickets (id, order_id, position, ticket_class_id, event_id, redemption_token)
                 SELECT t.id, $1, t.position, t.class_id, t.event_id, t.token
                 FROM UNNEST($2::uuid[], $3::int[], $4::text[], $5::text[], $6::text[])
                      AS t(id, position, class_id, event_id, token)",
            )
            .bind(order.id.as_uuid())
            .bind(&ids)
            .bind(&positions)
            .bind(&classes)
            .bind(&events)
            .bind(&tokens)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;

            tx.commit().await.map_err(store_error)?;

            tracing::debug!(
                order_id = %order.id,
                tickets = record.tickets.len(),
                "Order persisted"
            );
            Ok(())
        })
    }

    fn order(&self, id: OrderId) -> BoxResult<'_, Option<OrderRecord>, StoreError> {
        Box::pin(async move {
            let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(store_error)?;

            let Some(row) = row else {
                return Ok(None);
            };
            let order = order_from_row(&row)?;
            let tickets = self.tickets_of(id).await?;
            Ok(Some(OrderRecord { order, tickets }))
        })
    }

    fn mark_refunded(&self, id: OrderId) -> BoxResult<'_, Order, StoreError> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "UPDATE orders SET status = 'refunded'
                 WHERE id = $1 AND status = 'paid'
                 RETURNING {ORDER_COLUMNS}"
            ))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

            if let Some(row) = row {
                tracing::info!(order_id = %id, "Order refunded");
                return order_from_row(&row);
            }

            let status: Option<(String,)> = sqlx::query_as("SELECT status FROM orders WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(store_error)?;
            let (status,) = status.ok_or(StoreError::NotFound)?;
            let from = OrderStatus::parse(&status)
                .ok_or_else(|| StoreError::Invalid(format!("Invalid order status: {status}")))?;
            Err(StoreError::InvalidTransition {
                from,
                to: OrderStatus::Refunded,
            })
        })
    }

    fn redeem<'a>(
        &'a self,
        token: &'a RedemptionToken,
        at: DateTime<Utc>,
    ) -> BoxResult<'a, Ticket, StoreError> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "UPDATE tickets SET used = true, used_at = $2
                 WHERE redemption_token = $1 AND NOT used
                 RETURNING {TICKET_COLUMNS}"
            ))
            .bind(token.as_str())
            .bind(at)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

            if let Some(row) = row {
                return ticket_from_row(&row);
            }

            let (exists,): (bool,) =
                sqlx::query_as("SELECT EXISTS(SELECT 1 FROM tickets WHERE redemption_token = $1)")
                    .bind(token.as_str())
                    .fetch_one(&self.pool)
                    .await
                    .map_err(store_error)?;
            if exists {
                Err(StoreError::AlreadyUsed)
            } else {
                Err(StoreError::NotFound)
            }
        })
    }
}
