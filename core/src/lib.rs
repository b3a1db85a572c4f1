//! # Boxoffice Core
//!
//! Domain types, pricing rules and storage contracts for the ticket inventory and
//! order fulfillment subsystem of the storefront.
//!
//! This crate provides:
//! - **Domain records**: [`TicketClass`], [`DiscountCode`], [`Order`], [`Ticket`]
//! - **Pure rules**: [`CartPricer`] and the side-effect-free half of [`DiscountEngine`]
//! - **Storage contracts**: [`InventoryLedger`], [`DiscountStore`], [`OrderStore`]
//! - **Collaborator contracts**: [`Clock`], [`TokenSource`], [`OrderNotifier`]
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ DiscountEngine │     │  CartPricer  │     │ TokenSource  │
//! │ (pure + store) │     │    (pure)    │     │  (OS RNG)    │
//! └───────┬────────┘     └──────┬───────┘     └──────┬───────┘
//!         │                     │                    │
//!         └──────────┬──────────┴────────────────────┘
//!                    ▼
//!        CheckoutTransaction (boxoffice-runtime)
//!                    │
//!         ┌──────────┴──────────┐
//!         ▼                     ▼
//! ┌────────────────┐    ┌──────────────┐
//! │ InventoryLedger│    │  OrderStore  │
//! │ reserve/commit │    │ atomic write │
//! └────────────────┘    └──────────────┘
//! ```
//!
//! The shared counters (`TicketClass::remaining`, `DiscountCode::redemptions_used`)
//! are only ever mutated through the compare-and-update primitives exposed by the
//! storage traits. Nothing in this crate reads-then-writes them.
//!
//! Storage traits return boxed futures instead of using `async fn` so they can be
//! held as `Arc<dyn Trait>` inside the checkout environment.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod discount;
pub mod environment;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod pricing;
pub mod store;
pub mod token;
pub mod types;

pub use discount::{DiscountEngine, ValidDiscount};
pub use environment::{Clock, SystemClock};
pub use error::{CheckoutError, DiscountError, DiscountRejection, LedgerError, StoreError};
pub use ledger::{InventoryLedger, Reservation, ReservationState};
pub use notify::{NotifyError, OrderCommitted, OrderNotifier};
pub use pricing::{CartPricer, PriceBreakdown, ServiceFeeRate};
pub use store::{DiscountStore, OrderRecord, OrderStore};
pub use token::{OsRngTokenSource, RedemptionToken, TokenSource};
pub use types::*;

use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by the storage and collaborator traits.
pub type BoxResult<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;
