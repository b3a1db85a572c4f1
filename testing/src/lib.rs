//! # Boxoffice Testing
//!
//! Testing utilities for Boxoffice.
//!
//! This crate provides:
//! - In-memory implementations of every storage trait
//! - Deterministic clocks, a scripted token source and a recording notifier
//! - Fixtures and a checkout harness
//! - Property-based testing strategies
//!
//! ## Example
//!
//! ```ignore
//! use boxoffice_testing::harness::{CheckoutHarness, checkout_request, ticket_class};
//!
//! #[tokio::test]
//! async fn test_checkout() {
//!     let harness = CheckoutHarness::with_classes([ticket_class("vip", 5000, 2)]).unwrap();
//!     let checkout = harness.checkout().unwrap();
//!
//!     let record = checkout.run(checkout_request(&[("vip", 2)])).await.unwrap();
//!     assert_eq!(record.tickets.len(), 2);
//! }
//! ```

use boxoffice_core::environment::Clock;
use chrono::{DateTime, Utc};

/// Mock implementations of collaborator traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use boxoffice_core::{
        BoxResult, NotifyError, OrderCommitted, OrderNotifier, RedemptionToken, TokenSource,
    };
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Mutex, RwLock};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use boxoffice_testing::mocks::FixedClock;
    /// use boxoffice_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default())
    }

    /// Clock that only moves when told to.
    ///
    /// Used to push reservations past their expiry or discounts out of their window.
    #[derive(Debug)]
    pub struct ManualClock {
        time: RwLock<DateTime<Utc>>,
    }

    impl ManualClock {
        /// Start at `time`.
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: RwLock::new(time),
            }
        }

        /// Move the clock forward.
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            *time += by;
        }

        /// Jump to `time`.
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.write().unwrap_or_else(std::sync::PoisonError::into_inner) = time;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().unwrap_or_else(std::sync::PoisonError::into_inner)
        }
    }

    /// Captures `OrderCommitted` events, optionally failing every delivery.
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        events: Mutex<Vec<OrderCommitted>>,
        failing: AtomicBool,
    }

    impl RecordingNotifier {
        /// Create a notifier that accepts every event.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every later delivery fail (events are still recorded).
        pub fn fail_deliveries(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        /// Events received so far.
        #[must_use]
        pub fn events(&self) -> Vec<OrderCommitted> {
            self.events
                .lock()
                .map(|events| events.clone())
                .unwrap_or_default()
        }
    }

    impl OrderNotifier for RecordingNotifier {
        fn order_committed(&self, event: OrderCommitted) -> BoxResult<'_, (), NotifyError> {
            Box::pin(async move {
                if let Ok(mut events) = self.events.lock() {
                    events.push(event);
                }
                if self.failing.load(Ordering::SeqCst) {
                    return Err(NotifyError::Delivery("mail relay down".to_string()));
                }
                Ok(())
            })
        }
    }

    /// Hands out queued tokens first, then random ones.
    ///
    /// Queue a token that already exists in the order store to force a collision.
    #[derive(Debug, Default)]
    pub struct ScriptedTokenSource {
        queue: Mutex<VecDeque<RedemptionToken>>,
    }

    impl ScriptedTokenSource {
        /// Create a source with an empty queue.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue tokens to be returned in order.
        pub fn push(&self, tokens: impl IntoIterator<Item = RedemptionToken>) {
            if let Ok(mut queue) = self.queue.lock() {
                queue.extend(tokens);
            }
        }
    }

    impl TokenSource for ScriptedTokenSource {
        fn next_token(&self) -> RedemptionToken {
            self.queue
                .lock()
                .ok()
                .and_then(|mut queue| queue.pop_front())
                .unwrap_or_else(RedemptionToken::generate)
        }
    }
}

/// Property-based testing strategies using proptest.
pub mod properties {
    use proptest::prelude::*;

    /// Requested quantities for a burst of reservations.
    pub fn reservation_burst(max_quantity: u32, max_len: usize) -> impl Strategy<Value = Vec<u32>> {
        prop::collection::vec(1..=max_quantity, 1..=max_len)
    }

    /// A sequence of `(quantity, release_afterwards)` operations.
    pub fn reserve_release_ops(
        max_quantity: u32,
        max_len: usize,
    ) -> impl Strategy<Value = Vec<(u32, bool)>> {
        prop::collection::vec((1..=max_quantity, any::<bool>()), 1..=max_len)
    }
}

/// Install a test subscriber that honours `RUST_LOG`. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub mod harness;
mod inventory_mocks;
mod store_mocks;

// Re-export commonly used items
pub use inventory_mocks::InMemoryInventoryLedger;
pub use mocks::{FixedClock, ManualClock, RecordingNotifier, ScriptedTokenSource, test_clock};
pub use store_mocks::{InMemoryDiscountStore, InMemoryOrderStore};
