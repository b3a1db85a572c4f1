//! Checkout endpoint.

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use boxoffice_core::{BuyerId, CartLine, EventId, Money, OrderRecord, OrderStatus, PaymentConfirmation};
use boxoffice_runtime::CheckoutRequest;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::middleware::CorrelationId;
use crate::state::AppState;

/// Checkout request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    /// Buyer placing the order
    pub buyer_id: String,
    /// Event every line must belong to
    pub event_id: String,
    /// Cart lines
    pub lines: Vec<CartLineBody>,
    /// Optional discount code, any case
    #[serde(default)]
    pub discount_code: Option<String>,
    /// Result from the payment collaborator
    pub payment_confirmation: PaymentBody,
}

/// One cart line.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineBody {
    /// Ticket class
    pub ticket_class_id: String,
    /// Number of tickets
    pub quantity: u32,
    /// Price the client displayed, in minor units; informational only
    #[serde(default)]
    pub unit_price_snapshot: Option<u64>,
}

/// Payment confirmation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentBody {
    /// Whether payment was authorized
    pub paid: bool,
    /// Provider reference
    pub payment_reference: String,
}

/// Successful checkout response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    /// New order id
    pub order_id: String,
    /// Order status
    pub status: OrderStatus,
    /// One entry per ticket issued
    pub tickets: Vec<IssuedTicket>,
}

/// A ticket as returned to the buyer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedTicket {
    /// Ticket id
    pub id: String,
    /// Check-in token
    pub redemption_token: String,
}

impl From<CheckoutBody> for CheckoutRequest {
    fn from(body: CheckoutBody) -> Self {
        Self {
            buyer_id: BuyerId::new(body.buyer_id),
            event_id: EventId::new(body.event_id),
            lines: body
                .lines
                .into_iter()
                .map(|line| CartLine {
                    unit_price_snapshot: line.unit_price_snapshot.map(Money::from_cents),
                    ..CartLine::new(line.ticket_class_id, line.quantity)
                })
                .collect(),
            discount_code: body.discount_code.filter(|code| !code.trim().is_empty()),
            payment: PaymentConfirmation {
                paid: body.payment_confirmation.paid,
                payment_reference: body.payment_confirmation.payment_reference,
            },
        }
    }
}

impl From<OrderRecord> for CheckoutResponse {
    fn from(record: OrderRecord) -> Self {
        Self {
            order_id: record.order.id.to_string(),
            status: record.order.status,
            tickets: record
                .tickets
                .into_iter()
                .map(|ticket| IssuedTicket {
                    id: ticket.id.to_string(),
                    redemption_token: ticket.redemption_token.as_str().to_string(),
                })
                .collect(),
        }
    }
}

/// Run a checkout.
///
/// # Endpoint
///
/// ```text
/// POST /api/checkout
/// ```
///
/// # Errors
///
/// Returns the [`AppError`] mapped from the checkout failure, or 400 for a
/// body that is not valid JSON of the expected shape.
///
/// The checkout runs on its own task. If the client disconnects it still
/// finishes, committing or releasing its holds.
pub async fn checkout(
    State(state): State<AppState>,
    Extension(CorrelationId(correlation_id)): Extension<CorrelationId>,
    body: Result<Json<CheckoutBody>, JsonRejection>,
) -> Result<(StatusCode, Json<CheckoutResponse>), AppError> {
    let Json(body) = body.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
    let request = CheckoutRequest::from(body);

    tracing::debug!(
        %correlation_id,
        buyer_id = %request.buyer_id,
        lines = request.lines.len(),
        "Checkout requested"
    );

    // Runs to completion even if the client disconnects
    let checkout = state.checkout.clone();
    let record = tokio::spawn(async move { checkout.run(request).await })
        .await
        .map_err(|e| {
            tracing::error!(%correlation_id, error = %e, "Checkout task failed");
            AppError::internal().with_source(e)
        })??;
    Ok((StatusCode::CREATED, Json(CheckoutResponse::from(record))))
}
