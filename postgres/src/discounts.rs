//! Discount codes on `discount_codes`.

use boxoffice_core::{BoxResult, DiscountCode, DiscountKind, DiscountStore, EventId, StoreError};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::error::store_error;
use crate::{to_i32, to_i64, to_u32, to_u64};

/// `PostgreSQL`-backed [`DiscountStore`].
#[derive(Clone)]
pub struct PostgresDiscountStore {
    pool: PgPool,
}

impl PostgresDiscountStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn code_from_row(row: &PgRow) -> Result<DiscountCode, StoreError> {
    let kind: String = row.try_get("kind").map_err(store_error)?;
    let value: i64 = row.try_get("value").map_err(store_error)?;
    let max: Option<i32> = row.try_get("max_redemptions").map_err(store_error)?;
    let used: i32 = row.try_get("redemptions_used").map_err(store_error)?;
    let events: Vec<String> = row.try_get("applicable_event_ids").map_err(store_error)?;

    Ok(DiscountCode {
        code: row.try_get("code").map_err(store_error)?,
        kind: DiscountKind::parse(&kind)
            .ok_or_else(|| StoreError::Invalid(format!("Invalid discount kind: {kind}")))?,
        value: to_u64(value, "value").map_err(StoreError::Invalid)?,
        active_from: row.try_get("active_from").map_err(store_error)?,
        active_until: row.try_get("active_until").map_err(store_error)?,
        max_redemptions: max
            .map(|m| to_u32(m, "max_redemptions"))
            .transpose()
            .map_err(StoreError::Invalid)?,
        redemptions_used: to_u32(used, "redemptions_used").map_err(StoreError::Invalid)?,
        applicable_event_ids: events.into_iter().map(EventId::new).collect(),
        enabled: row.try_get("enabled").map_err(store_error)?,
    })
}

impl DiscountStore for PostgresDiscountStore {
    fn upsert(&self, code: DiscountCode) -> BoxResult<'_, (), StoreError> {
        Box::pin(async move {
            code.validate().map_err(StoreError::Invalid)?;
            let normalized = DiscountCode::normalize(&code.code);
            let max = code
                .max_redemptions
                .map(|m| to_i32(m, "max_redemptions"))
                .transpose()
                .map_err(StoreError::Invalid)?;
            let events: Vec<String> = code
                .applicable_event_ids
                .iter()
                .map(|event| event.as_str().to_string())
                .collect();

            sqlx::query(
                "INSERT INTO discount_codes
                    (code, kind, value, active_from, active_until, max_redemptions,
                     redemptions_used, applicable_event_ids, enabled)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                 ON CONFLICT (code) DO UPDATE
                 SET kind = EXCLUDED.kind,
                     value = EXCLUDED.value,
                     active_from = EXCLUDED.active_from,
                     active_until = EXCLUDED.active_until,
                     max_redemptions = EXCLUDED.max_redemptions,
                     redemptions_used = EXCLUDED.redemptions_used,
                     applicable_event_ids = EXCLUDED.applicable_event_ids,
                     enabled = EXCLUDED.enabled,
                     updated_at = now()",
            )
            .bind(&normalized)
            .bind(code.kind.as_str())
            .bind(to_i64(code.value, "value").map_err(StoreError::Invalid)?)
            .bind(code.active_from)
            .bind(code.active_until)
            .bind(max)
            .bind(to_i32(code.redemptions_used, "redemptions_used").map_err(StoreError::Invalid)?)
            .bind(events)
            .bind(code.enabled)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

            tracing::info!(code = %normalized, kind = code.kind.as_str(), "Discount code stored");
            Ok(())
        })
    }

    fn find<'a>(&'a self, code: &'a str) -> BoxResult<'a, Option<DiscountCode>, StoreError> {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT code, kind, value, active_from, active_until, max_redemptions,
                        redemptions_used, applicable_event_ids, enabled
                 FROM discount_codes
                 WHERE code = $1",
            )
            .bind(DiscountCode::normalize(code))
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

            row.as_ref().map(code_from_row).transpose()
        })
    }

    fn record_redemption<'a>(&'a self, code: &'a str) -> BoxResult<'a, bool, StoreError> {
        Box::pin(async move {
            let normalized = DiscountCode::normalize(code);
            let updated = sqlx::query(
                "UPDATE discount_codes
                 SET redemptions_used = redemptions_used + 1, updated_at = now()
                 WHERE code = $1
                   AND (max_redemptions IS NULL OR redemptions_used < max_redemptions)",
            )
            .bind(&normalized)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

            if updated.rows_affected() == 1 {
                return Ok(true);
            }

            let (exists,): (bool,) =
                sqlx::query_as("SELECT EXISTS(SELECT 1 FROM discount_codes WHERE code = $1)")
                    .bind(&normalized)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(store_error)?;
            if exists { Ok(false) } else { Err(StoreError::NotFound) }
        })
    }
}
