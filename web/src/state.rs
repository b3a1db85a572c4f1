//! Application state for Axum handlers.

use boxoffice_core::{InventoryLedger, OrderStore};
use boxoffice_runtime::{CheckoutConfig, CheckoutEnvironment, CheckoutTransaction, ConfigError};
use std::sync::Arc;

/// Shared across all HTTP handlers.
///
/// Cloning is cheap: every field is reference-counted.
#[derive(Clone)]
pub struct AppState {
    /// Runs checkouts
    pub checkout: CheckoutTransaction,
    /// Read side of the inventory for availability queries
    pub ledger: Arc<dyn InventoryLedger>,
    /// Read side of orders
    pub orders: Arc<dyn OrderStore>,
}

impl AppState {
    /// Build state from the checkout collaborators.
    ///
    /// # Errors
    ///
    /// Returns the validation error for `config`.
    pub fn new(environment: CheckoutEnvironment, config: CheckoutConfig) -> Result<Self, ConfigError> {
        let ledger = Arc::clone(&environment.ledger);
        let orders = Arc::clone(&environment.orders);
        Ok(Self {
            checkout: CheckoutTransaction::new(environment, config)?,
            ledger,
            orders,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_clone() {
        // Required for axum's State extractor
        fn assert_clone<T: Clone + Send + Sync + 'static>() {}
        assert_clone::<AppState>();
    }
}
