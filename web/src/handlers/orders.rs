//! Order lookup endpoint.

use axum::{
    Json,
    extract::{Path, State},
};
use boxoffice_core::{OrderId, OrderRecord, OrderStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// An order with its tickets, amounts in minor units.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    /// Order id
    pub order_id: String,
    /// Buyer
    pub buyer_id: String,
    /// Lifecycle status
    pub status: OrderStatus,
    /// Purchased lines
    pub lines: Vec<OrderLineView>,
    /// Sum of line totals
    pub subtotal_cents: u64,
    /// Service fee
    pub service_fee_cents: u64,
    /// Discount code used, normalized
    pub discount_code: Option<String>,
    /// Discount applied
    pub discount_amount_cents: u64,
    /// Amount charged
    pub total_cents: u64,
    /// Payment provider reference
    pub payment_reference: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Issued tickets
    pub tickets: Vec<TicketView>,
}

/// One purchased line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineView {
    /// Ticket class
    pub ticket_class_id: String,
    /// Number of tickets
    pub quantity: u32,
    /// Unit price charged
    pub unit_price_cents: u64,
}

/// One issued ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketView {
    /// Ticket id
    pub id: String,
    /// Ticket class
    pub ticket_class_id: String,
    /// Event
    pub event_id: String,
    /// Check-in token
    pub redemption_token: String,
    /// Whether the ticket was checked in
    pub used: bool,
    /// Check-in time
    pub used_at: Option<DateTime<Utc>>,
}

impl From<OrderRecord> for OrderView {
    fn from(record: OrderRecord) -> Self {
        let order = record.order;
        Self {
            order_id: order.id.to_string(),
            buyer_id: order.buyer_id.to_string(),
            status: order.status,
            lines: order
                .lines
                .into_iter()
                .map(|line| OrderLineView {
                    ticket_class_id: line.ticket_class_id.to_string(),
                    quantity: line.quantity,
                    unit_price_cents: line.unit_price.cents(),
                })
                .collect(),
            subtotal_cents: order.subtotal.cents(),
            service_fee_cents: order.service_fee.cents(),
            discount_code: order.discount_code,
            discount_amount_cents: order.discount_amount.cents(),
            total_cents: order.total.cents(),
            payment_reference: order.payment_reference,
            created_at: order.created_at,
            tickets: record
                .tickets
                .into_iter()
                .map(|ticket| TicketView {
                    id: ticket.id.to_string(),
                    ticket_class_id: ticket.ticket_class_id.to_string(),
                    event_id: ticket.event_id.to_string(),
                    redemption_token: ticket.redemption_token.as_str().to_string(),
                    used: ticket.used,
                    used_at: ticket.used_at,
                })
                .collect(),
        }
    }
}

/// Fetch an order with its tickets.
///
/// # Endpoint
///
/// ```text
/// GET /api/orders/:id
/// ```
///
/// # Errors
///
/// Returns 400 for a malformed id, 404 for an unknown order and 503 when
/// storage is unavailable.
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OrderView>, AppError> {
    let uuid = Uuid::parse_str(&id)
        .map_err(|_| AppError::bad_request(format!("{id} is not a valid order id")))?;

    let record = state
        .orders
        .order(OrderId::from_uuid(uuid))
        .await?
        .ok_or_else(|| AppError::not_found("order", &id))?;

    Ok(Json(OrderView::from(record)))
}
