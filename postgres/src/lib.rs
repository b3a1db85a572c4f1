//! `PostgreSQL` storage for Boxoffice.
//!
//! Implements the storage contracts from `boxoffice-core` on one connection pool:
//!
//! - [`PostgresInventoryLedger`]: conditional stock decrements, reservation lifecycle
//! - [`PostgresDiscountStore`]: discount codes with a bounded redemption counter
//! - [`PostgresOrderStore`]: orders and tickets written in a single transaction
//!
//! Every counter is changed by a single guarded `UPDATE` (`WHERE remaining >= $n`,
//! `WHERE redemptions_used < max_redemptions`), so concurrent writers never need
//! application-level locks.
//!
//! # Example
//!
//! ```ignore
//! use boxoffice_postgres::PostgresStores;
//! use sqlx::postgres::PgPoolOptions;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = PgPoolOptions::new().max_connections(10);
//!     let stores = PostgresStores::connect("postgres://localhost/boxoffice", options).await?;
//!     stores.migrate().await?;
//!     let ledger = stores.ledger();
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod discounts;
mod error;
mod ledger;
mod orders;

pub use discounts::PostgresDiscountStore;
pub use error::PostgresError;
pub use ledger::PostgresInventoryLedger;
pub use orders::PostgresOrderStore;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Shared pool plus factories for each store.
#[derive(Clone)]
pub struct PostgresStores {
    pool: PgPool,
}

impl PostgresStores {
    /// Open a pool with the given options.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresError::Connect`] if the database is unreachable.
    pub async fn connect(database_url: &str, options: PgPoolOptions) -> Result<Self, PostgresError> {
        let pool = options
            .connect(database_url)
            .await
            .map_err(PostgresError::Connect)?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the bundled schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresError::Migrate`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), PostgresError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Inventory ledger backed by this pool.
    #[must_use]
    pub fn ledger(&self) -> PostgresInventoryLedger {
        PostgresInventoryLedger::new(self.pool.clone())
    }

    /// Discount store backed by this pool.
    #[must_use]
    pub fn discounts(&self) -> PostgresDiscountStore {
        PostgresDiscountStore::new(self.pool.clone())
    }

    /// Order store backed by this pool.
    #[must_use]
    pub fn orders(&self) -> PostgresOrderStore {
        PostgresOrderStore::new(self.pool.clone())
    }
}

/// Convert a stored `INTEGER` back to a quantity.
pub(crate) fn to_u32(value: i32, column: &str) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("negative {column}: {value}"))
}

/// Convert a quantity to a `INTEGER` bind value.
pub(crate) fn to_i32(value: u32, column: &str) -> Result<i32, String> {
    i32::try_from(value).map_err(|_| format!("{column} out of range: {value}"))
}

/// Convert a stored `BIGINT` amount back to minor units.
pub(crate) fn to_u64(value: i64, column: &str) -> Result<u64, String> {
    u64::try_from(value).map_err(|_| format!("negative {column}: {value}"))
}

/// Convert minor units to a `BIGINT` bind value.
pub(crate) fn to_i64(value: u64, column: &str) -> Result<i64, String> {
    i64::try_from(value).map_err(|_| format!("{column} out of range: {value}"))
}
