// File: treetap-core/src/repositories/postgres/coupons.rs

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgExecutor, Pool, Postgres, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;
use treetap_common::error::Error;
use treetap_common::models::{Coupon, CouponState};
use treetap_common::traits::CouponRepository;

/// The conditional assignment every redemption funnels through: only one caller flips a
/// given code away from NULL. Binds: advertisement_id, code, user_email, assigned_at.
pub(crate) const ASSIGN_COUPON_SQL: &str = r#"
    UPDATE coupons
    SET user_email = $3,
        assigned_at = $4
    WHERE advertisement_id = $1
      AND code = $2
      AND user_email IS NULL
"#;

pub(crate) const COUNT_UNASSIGNED_SQL: &str =
    "SELECT COUNT(*) FROM coupons WHERE advertisement_id = $1 AND user_email IS NULL";

#[derive(Clone)]
pub struct PostgresCouponRepository {
    pool: Pool<Postgres>,
}

impl PostgresCouponRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn pick_available(
        &self,
        advertisement_id: Uuid,
        excluded: &[String],
        offset: i64,
    ) -> Result<Option<String>, Error> {
        let code: Option<String> = sqlx::query_scalar(
            r#"
            SELECT code
            FROM coupons
            WHERE advertisement_id = $1
              AND user_email IS NULL
              AND NOT (code = ANY($2))
            ORDER BY coupon_id
            OFFSET $3
            LIMIT 1
            "#,
        )
            .bind(advertisement_id)
            .bind(excluded)
            .bind(offset)
            .fetch_optional(&self.pool)
            .await?;
        Ok(code)
    }
}

pub(crate) async fn existing_codes<'e, E>(
    executor: E,
    advertisement_id: Uuid,
    codes: &[String],
) -> Result<Vec<String>, Error>
where
    E: PgExecutor<'e>,
{
    let existing: Vec<String> = sqlx::query_scalar(
        "SELECT code FROM coupons WHERE advertisement_id = $1 AND code = ANY($2)",
    )
        .bind(advertisement_id)
        .bind(codes)
        .fetch_all(executor)
        .await?;
    Ok(existing)
}

/// Inserts `codes` as unassigned coupons on the caller's connection, usually inside its
/// transaction. Codes that already exist are reported as `DuplicateCode`. A concurrent batch
/// that lands between the check and the insert comes back as the raw unique violation, which
/// the caller resolves once its transaction is gone.
pub(crate) async fn insert_codes(
    conn: &mut PgConnection,
    advertisement_id: Uuid,
    codes: &[String],
) -> Result<u64, Error> {
    let in_batch = batch_duplicates(codes);
    if !in_batch.is_empty() {
        return Err(Error::duplicate_codes(advertisement_id, in_batch));
    }

    let existing = existing_codes(&mut *conn, advertisement_id, codes).await?;
    if !existing.is_empty() {
        warn!("Rejecting coupon batch for {}: {} code(s) already exist", advertisement_id, existing.len());
        return Err(Error::duplicate_codes(advertisement_id, existing));
    }

    let coupon_ids: Vec<Uuid> = codes.iter().map(|_| Uuid::new_v4()).collect();
    let inserted = sqlx::query(
        r#"
        INSERT INTO coupons (coupon_id, advertisement_id, code, created_at)
        SELECT batch.coupon_id, $2, batch.code, $4
        FROM UNNEST($1::uuid[], $3::text[]) AS batch (coupon_id, code)
        "#,
    )
        .bind(&coupon_ids)
        .bind(advertisement_id)
        .bind(codes)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await;

    match inserted {
        Ok(result) => Ok(result.rows_affected()),
        Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => {
            Err(Error::NotFound(format!("Advertisement {advertisement_id} not found")))
        }
        Err(e) => Err(e.into()),
    }
}

/// True when `err` is the unique violation `insert_codes` passes through.
pub(crate) fn is_code_collision(err: &Error) -> bool {
    matches!(err, Error::Database(sqlx::Error::Database(db_err)) if db_err.is_unique_violation())
}

/// Builds a `Coupon` from a row; a NULL `user_email` means the coupon is still available.
pub(crate) fn coupon_from_row(row: &PgRow) -> Result<Coupon, Error> {
    Ok(Coupon {
        coupon_id: row.try_get("coupon_id")?,
        advertisement_id: row.try_get("advertisement_id")?,
        code: row.try_get("code")?,
        state: CouponState::from_user_email(row.try_get("user_email")?),
        created_at: row.try_get("created_at")?,
        assigned_at: row.try_get("assigned_at")?,
    })
}

fn batch_duplicates(codes: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    codes
        .iter()
        .filter(|c| !seen.insert(c.as_str()))
        .cloned()
        .collect()
}

#[async_trait]
impl CouponRepository for PostgresCouponRepository {
    async fn add_coupons(&self, advertisement_id: Uuid, codes: &[String]) -> Result<usize, Error> {
        if codes.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let inserted = match insert_codes(&mut tx, advertisement_id, codes).await {
            Ok(n) => n,
            Err(e) if is_code_collision(&e) => {
                // A concurrent batch got there first; report what collides now.
                drop(tx);
                let existing = existing_codes(&self.pool, advertisement_id, codes).await?;
                return Err(Error::duplicate_codes(advertisement_id, existing));
            }
            Err(e) => return Err(e),
        };

        tx.commit().await?;
        info!("Added {} coupon(s) to advertisement {}", inserted, advertisement_id);
        Ok(inserted as usize)
    }

    async fn select_available_code(
        &self,
        advertisement_id: Uuid,
        excluded: &HashSet<String>,
    ) -> Result<Option<String>, Error> {
        let excluded: Vec<String> = excluded.iter().cloned().collect();

        let available: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM coupons
            WHERE advertisement_id = $1
              AND user_email IS NULL
              AND NOT (code = ANY($2))
            "#,
        )
            .bind(advertisement_id)
            .bind(&excluded)
            .fetch_one(&self.pool)
            .await?;

        if available == 0 {
            return Ok(None);
        }

        let offset = rand::rng().random_range(0..available);
        debug!("Picking coupon {} of {} for advertisement {}", offset, available, advertisement_id);

        match self.pick_available(advertisement_id, &excluded, offset).await? {
            Some(code) => Ok(Some(code)),
            // The set shrank between count and pick; take whatever is first.
            None => self.pick_available(advertisement_id, &excluded, 0).await,
        }
    }

    async fn assign(&self, advertisement_id: Uuid, code: &str, user_email: &str) -> Result<(), Error> {
        let result = sqlx::query(ASSIGN_COUPON_SQL)
            .bind(advertisement_id)
            .bind(code)
            .bind(user_email)
            .bind(Utc::now())
            .execute(&self.pool)
            .await;

        let result = match result {
            Ok(r) => r,
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(Error::AlreadyRedeemed {
                    advertisement_id,
                    user_email: user_email.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM coupons WHERE advertisement_id = $1 AND code = $2)",
        )
            .bind(advertisement_id)
            .bind(code)
            .fetch_one(&self.pool)
            .await?;

        if exists {
            Err(Error::AlreadyAssigned {
                advertisement_id,
                code: code.to_string(),
            })
        } else {
            Err(Error::NotFound(format!("Coupon '{code}' not found for advertisement {advertisement_id}")))
        }
    }

    async fn count_unassigned(&self, advertisement_id: Uuid) -> Result<i64, Error> {
        let count: i64 = sqlx::query_scalar(COUNT_UNASSIGNED_SQL)
            .bind(advertisement_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn has_assignment(&self, advertisement_id: Uuid, user_email: &str) -> Result<bool, Error> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM coupons WHERE advertisement_id = $1 AND user_email = $2)",
        )
            .bind(advertisement_id)
            .bind(user_email)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn list_for_user(&self, user_email: &str) -> Result<Vec<Coupon>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT coupon_id, advertisement_id, code, user_email, created_at, assigned_at
            FROM coupons
            WHERE user_email = $1
            ORDER BY assigned_at ASC, coupon_id ASC
            "#,
        )
            .bind(user_email)
            .fetch_all(&self.pool)
            .await?;

        let mut coupons = Vec::with_capacity(rows.len());
        for row in rows {
            coupons.push(coupon_from_row(&row)?);
        }
        Ok(coupons)
    }

    async fn list_for_advertisement(&self, advertisement_id: Uuid) -> Result<Vec<Coupon>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT coupon_id, advertisement_id, code, user_email, created_at, assigned_at
            FROM coupons
            WHERE advertisement_id = $1
            ORDER BY created_at ASC, code ASC
            "#,
        )
            .bind(advertisement_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(coupon_from_row).collect()
    }
}
