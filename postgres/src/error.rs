//! sqlx error classification.

use boxoffice_core::{RedemptionToken, StoreError};
use sqlx::postgres::PgDatabaseError;
use thiserror::Error;

/// Errors from connecting to or migrating the database.
#[derive(Error, Debug)]
pub enum PostgresError {
    /// The pool could not connect.
    #[error("Failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    /// A migration failed.
    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

const TOKEN_CONSTRAINT: &str = "tickets_redemption_token_key";

/// SQLSTATE classes worth retrying: connection exceptions, transaction rollbacks
/// (serialization failures, deadlocks), insufficient resources, operator intervention.
fn is_transient_state(code: &str) -> bool {
    ["08", "40", "53", "57"]
        .iter()
        .any(|class| code.starts_with(class))
}

pub(crate) fn store_error(error: sqlx::Error) -> StoreError {
    match &error {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db) => {
            if db.constraint() == Some(TOKEN_CONSTRAINT) {
                return StoreError::TokenCollision(colliding_token(db.try_downcast_ref()));
            }
            if db.is_unique_violation() {
                return StoreError::Conflict(db.message().to_string());
            }
            if db.is_check_violation() || db.is_foreign_key_violation() {
                return StoreError::Invalid(db.message().to_string());
            }
            match db.code() {
                Some(code) if is_transient_state(&code) => StoreError::Unavailable(error.to_string()),
                _ => StoreError::Invalid(error.to_string()),
            }
        },
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Invalid(error.to_string())
        },
        _ => StoreError::Unavailable(error.to_string()),
    }
}

/// Pull the token out of `Key (redemption_token)=(...) already exists.`
fn colliding_token(error: Option<&PgDatabaseError>) -> Option<RedemptionToken> {
    let detail = error?.detail()?;
    let start = detail.find(")=(")? + 3;
    let end = detail[start..].find(')')? + start;
    Some(RedemptionToken::from_string(&detail[start..end]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_sqlstate_classes() {
        assert!(is_transient_state("40001"));
        assert!(is_transient_state("40P01"));
        assert!(is_transient_state("08006"));
        assert!(!is_transient_state("23505"));
        assert!(!is_transient_state("22003"));
    }

    #[test]
    fn test_pool_timeout_is_unavailable() {
        assert!(store_error(sqlx::Error::PoolTimedOut).is_transient());
        assert_eq!(store_error(sqlx::Error::RowNotFound), StoreError::NotFound);
    }
}
