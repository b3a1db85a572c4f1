//! HTTP surface for Boxoffice.
//!
//! Exposes checkout, order lookup and ticket class availability over JSON,
//! backed by whichever [`InventoryLedger`](boxoffice_core::InventoryLedger),
//! discount store and [`OrderStore`](boxoffice_core::OrderStore) the
//! [`AppState`] was built with.
//!
//! # Routes
//!
//! | Method | Path                                    | Handler                           |
//! |--------|-----------------------------------------|-----------------------------------|
//! | GET    | `/health`                               | [`handlers::health_check`]        |
//! | POST   | `/api/checkout`                         | [`handlers::checkout`]            |
//! | GET    | `/api/orders/:id`                       | [`handlers::get_order`]           |
//! | GET    | `/api/ticket-classes/:id/availability`  | [`handlers::ticket_class_availability`] |
//!
//! # Example
//!
//! ```ignore
//! let state = AppState::new(environment, config.checkout_config())?;
//! let listener = tokio::net::TcpListener::bind(config.http_addr()?).await?;
//! axum::serve(listener, boxoffice_web::router(state)).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use error::AppError;
pub use middleware::{CORRELATION_ID_HEADER, CorrelationId, request_context_layer};
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/checkout", post(handlers::checkout))
        .route("/api/orders/:id", get(handlers::get_order))
        .route(
            "/api/ticket-classes/:id/availability",
            get(handlers::ticket_class_availability),
        )
        .layer(TraceLayer::new_for_http())
        .layer(request_context_layer())
        .with_state(state)
}
