// File: treetap-core/src/repositories/postgres/ledger.rs

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};
use tracing::{debug, info};
use treetap_common::error::Error;
use treetap_common::models::{RedemptionClaim, RedemptionReceipt};
use treetap_common::traits::RedemptionLedger;

use super::coupons::{ASSIGN_COUPON_SQL, COUNT_UNASSIGNED_SQL};
use super::users::INCREMENT_USER_TREES_SQL;

/// Commits a redemption inside one transaction. The advertisement row is locked first, so
/// redemptions against the same advertisement serialize on it while other advertisements
/// proceed in parallel.
#[derive(Clone)]
pub struct PostgresRedemptionLedger {
    pool: Pool<Postgres>,
}

impl PostgresRedemptionLedger {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RedemptionLedger for PostgresRedemptionLedger {
    async fn commit_redemption(&self, claim: &RedemptionClaim) -> Result<RedemptionReceipt, Error> {
        let id = claim.advertisement_id;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let closed: Option<bool> = sqlx::query_scalar(
            "SELECT closed FROM advertisements WHERE advertisement_id = $1 FOR UPDATE",
        )
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        match closed {
            None => return Err(Error::NotFound(format!("Advertisement {id} not found"))),
            Some(true) => {
                let remaining: i64 = sqlx::query_scalar(COUNT_UNASSIGNED_SQL)
                    .bind(id)
                    .fetch_one(&mut *tx)
                    .await?;
                // Drained while this claim was in flight.
                return Err(if remaining == 0 { Error::Exhausted(id) } else { Error::Closed(id) });
            }
            Some(false) => {}
        }

        // Linearization point: only one caller flips a given code from NULL.
        let assigned = sqlx::query(ASSIGN_COUPON_SQL)
            .bind(id)
            .bind(&claim.code)
            .bind(&claim.user_email)
            .bind(now)
            .execute(&mut *tx)
            .await;

        let assigned = match assigned {
            Ok(r) => r,
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(Error::AlreadyRedeemed {
                    advertisement_id: id,
                    user_email: claim.user_email.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        if assigned.rows_affected() == 0 {
            debug!("Coupon '{}' of {} was taken concurrently", claim.code, id);
            return Err(Error::AlreadyAssigned {
                advertisement_id: id,
                code: claim.code.clone(),
            });
        }

        let remaining: i64 = sqlx::query_scalar(COUNT_UNASSIGNED_SQL)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        let advertisement_closed = remaining == 0;

        sqlx::query(
            r#"
            UPDATE advertisements
            SET trees_planted = trees_planted + $2,
                closed = closed OR $3,
                updated_at = $4
            WHERE advertisement_id = $1
            "#,
        )
            .bind(id)
            .bind(claim.trees)
            .bind(advertisement_closed)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        sqlx::query(INCREMENT_USER_TREES_SQL)
            .bind(&claim.user_email)
            .bind(claim.trees)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        if advertisement_closed {
            info!("Advertisement {} ran out of coupons and was closed", id);
        }
        Ok(RedemptionReceipt {
            remaining,
            advertisement_closed,
        })
    }
}
