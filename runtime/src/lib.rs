//! # Boxoffice Runtime
//!
//! Orchestration on top of the core contracts.
//!
//! ## Core Components
//!
//! - **`CheckoutTransaction`**: reserve → price → persist → commit, with compensation
//! - **`TicketIssuer`**: mints tickets and resolves redemption token collisions
//! - **`ReservationSweeper`**: releases holds abandoned by crashed or idle checkouts
//! - **Retry**: bounded exponential backoff for transient storage failures
//! - **Metrics**: checkout and inventory counters for Prometheus
//!
//! ## Example
//!
//! ```ignore
//! use boxoffice_runtime::{CheckoutConfig, CheckoutEnvironment, CheckoutTransaction};
//!
//! let checkout = CheckoutTransaction::new(environment, CheckoutConfig::default())?;
//! let record = checkout.run(request).await?;
//! println!("order {} with {} tickets", record.order.id, record.tickets.len());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Checkout state machine
pub mod checkout;

/// Ticket minting
pub mod issuer;

/// Prometheus metrics for observability
pub mod metrics;

/// Default notifier
pub mod notifier;

/// Retry logic with exponential backoff
pub mod retry;

/// Expired reservation sweep
pub mod sweeper;

pub use checkout::{
    CheckoutConfig, CheckoutEnvironment, CheckoutRequest, CheckoutState, CheckoutTransaction,
    ConfigError,
};
pub use issuer::TicketIssuer;
pub use notifier::TracingNotifier;
pub use retry::{RetryPolicy, retry_if};
pub use sweeper::ReservationSweeper;
