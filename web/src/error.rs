//! Error types for web handlers.
//!
//! Bridges domain errors to HTTP responses. The body always has the shape
//! `{errorKind, detail}`, plus `available` for stock shortfalls and `reason`
//! for refused discount codes. Internal error text is logged, never returned.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use boxoffice_core::{CheckoutError, LedgerError, StoreError};
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    kind: &'static str,
    detail: String,
    available: Option<u32>,
    reason: Option<&'static str>,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub fn new(status: StatusCode, kind: &'static str, detail: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            detail: detail.into(),
            available: None,
            reason: None,
            source: None,
        }
    }

    /// Attach the underlying error for logging.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", detail)
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("{resource} {id} not found"),
        )
    }

    /// Create a 503 Service Unavailable error.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "unavailable",
            "please try again",
        )
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "an internal error occurred",
        )
    }

    /// HTTP status of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        self.kind
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.detail)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    error_kind: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    available: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    kind = self.kind,
                    error = %source,
                    "Request failed"
                );
            } else {
                tracing::error!(status = %self.status, kind = self.kind, "Request failed");
            }
        }

        let body = ErrorResponse {
            error_kind: self.kind,
            detail: self.detail,
            available: self.available,
            reason: self.reason,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<CheckoutError> for AppError {
    fn from(error: CheckoutError) -> Self {
        let kind = error.kind();
        match error {
            CheckoutError::InvalidCart(detail) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, kind, detail)
            },
            CheckoutError::PaymentNotConfirmed => Self::new(
                StatusCode::PAYMENT_REQUIRED,
                kind,
                "payment has not been confirmed",
            ),
            CheckoutError::UnknownTicketClass(id) => Self::new(
                StatusCode::NOT_FOUND,
                kind,
                format!("ticket class {id} does not exist"),
            ),
            CheckoutError::InsufficientStock { available, .. } => Self {
                available: Some(available),
                ..Self::new(
                    StatusCode::CONFLICT,
                    kind,
                    format!("not enough tickets left ({available} available)"),
                )
            },
            CheckoutError::DiscountInvalid(rejection) => Self {
                reason: Some(rejection.as_str()),
                ..Self::new(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    kind,
                    format!("discount code invalid: {rejection}"),
                )
            },
            e @ CheckoutError::Persistence(_) => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, kind, "please try again").with_source(e)
            },
            CheckoutError::Cancelled | CheckoutError::TimedOut => Self::new(
                StatusCode::REQUEST_TIMEOUT,
                kind,
                "checkout did not complete, please try again",
            ),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => Self::new(StatusCode::NOT_FOUND, "not_found", "record not found"),
            e if e.is_transient() => Self::unavailable().with_source(e),
            e => Self::internal().with_source(e),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::UnknownTicketClass(id) => Self::not_found("ticket class", id),
            e @ LedgerError::Storage(_) => Self::unavailable().with_source(e),
            e => Self::internal().with_source(e),
        }
    }
}
