// File: treetap-core/src/repositories/postgres/advertisements.rs

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};
use tracing::{debug, info};
use uuid::Uuid;
use treetap_common::error::Error;
use treetap_common::models::Advertisement;
use treetap_common::traits::AdvertisementRepository;

use super::coupons::{existing_codes, insert_codes, is_code_collision};

#[derive(Clone)]
pub struct PostgresAdvertisementRepository {
    pool: Pool<Postgres>,
}

impl PostgresAdvertisementRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Runs a single-row flag update and maps "no row" onto `NotFound`.
    async fn update_flags(&self, sql: &str, advertisement_id: Uuid) -> Result<(), Error> {
        let result = sqlx::query(sql)
            .bind(advertisement_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Advertisement {advertisement_id} not found")));
        }
        Ok(())
    }
}

#[async_trait]
impl AdvertisementRepository for PostgresAdvertisementRepository {
    async fn create(&self, ad: &Advertisement) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO advertisements (
                advertisement_id,
                company_name,
                website,
                coupon_info,
                trees_per_click,
                advertisement_content,
                advertisement_image,
                created_by,
                approved,
                closed,
                ngo,
                trees_planted,
                created_at,
                updated_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14)
            "#,
        )
            .bind(ad.advertisement_id)
            .bind(&ad.company_name)
            .bind(&ad.website)
            .bind(&ad.coupon_info)
            .bind(ad.trees_per_click)
            .bind(&ad.advertisement_content)
            .bind(&ad.advertisement_image)
            .bind(&ad.created_by)
            .bind(ad.approved)
            .bind(ad.closed)
            .bind(&ad.ngo)
            .bind(ad.trees_planted)
            .bind(ad.created_at)
            .bind(ad.updated_at)
            .execute(&self.pool)
            .await?;

        debug!("Stored advertisement {} for {}", ad.advertisement_id, ad.created_by);
        Ok(())
    }

    async fn get(&self, advertisement_id: Uuid) -> Result<Option<Advertisement>, Error> {
        let ad = sqlx::query_as::<_, Advertisement>(
            r#"
            SELECT advertisement_id, company_name, website, coupon_info, trees_per_click,
                   advertisement_content, advertisement_image, created_by, approved, closed,
                   ngo, trees_planted, created_at, updated_at
            FROM advertisements
            WHERE advertisement_id = $1
            "#,
        )
            .bind(advertisement_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(ad)
    }

    async fn approve(
        &self,
        advertisement_id: Uuid,
        ngo: &str,
        initial_codes: &[String],
        reset_if_approved: bool,
    ) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;

        // Row lock: concurrent approvals and redemptions on this advertisement wait here.
        let approved: Option<bool> = sqlx::query_scalar(
            "SELECT approved FROM advertisements WHERE advertisement_id = $1 FOR UPDATE",
        )
            .bind(advertisement_id)
            .fetch_optional(&mut *tx)
            .await?;
        match approved {
            None => return Err(Error::NotFound(format!("Advertisement {advertisement_id} not found"))),
            Some(true) if !reset_if_approved => return Err(Error::AlreadyApproved(advertisement_id)),
            Some(_) => {}
        }

        if !initial_codes.is_empty() {
            match insert_codes(&mut tx, advertisement_id, initial_codes).await {
                Ok(_) => {}
                Err(e) if is_code_collision(&e) => {
                    drop(tx);
                    let existing = existing_codes(&self.pool, advertisement_id, initial_codes).await?;
                    return Err(Error::duplicate_codes(advertisement_id, existing));
                }
                Err(e) => return Err(e),
            }
        }

        let result = sqlx::query(
            r#"
            UPDATE advertisements
            SET approved = TRUE,
                ngo = $2,
                trees_planted = 0,
                updated_at = $3
            WHERE advertisement_id = $1
              AND ($4 OR approved = FALSE)
            "#,
        )
            .bind(advertisement_id)
            .bind(ngo)
            .bind(Utc::now())
            .bind(reset_if_approved)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::AlreadyApproved(advertisement_id));
        }
        tx.commit().await?;

        info!(
            "Advertisement {} approved for ngo='{}' with {} code(s)",
            advertisement_id, ngo, initial_codes.len()
        );
        Ok(())
    }

    async fn close(&self, advertisement_id: Uuid) -> Result<(), Error> {
        self.update_flags(
            "UPDATE advertisements SET closed = TRUE, updated_at = $2 WHERE advertisement_id = $1",
            advertisement_id,
        )
            .await
    }

    async fn reopen(&self, advertisement_id: Uuid) -> Result<(), Error> {
        self.update_flags(
            "UPDATE advertisements SET closed = FALSE, updated_at = $2 WHERE advertisement_id = $1",
            advertisement_id,
        )
            .await
    }

    async fn increment_trees(&self, advertisement_id: Uuid, amount: i64) -> Result<(), Error> {
        if amount < 0 {
            return Err(Error::InvalidInput(format!("tree increment must not be negative, got {amount}")));
        }
        let result = sqlx::query(
            r#"
            UPDATE advertisements
            SET trees_planted = trees_planted + $2,
                updated_at = $3
            WHERE advertisement_id = $1
            "#,
        )
            .bind(advertisement_id)
            .bind(amount)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Advertisement {advertisement_id} not found")));
        }
        Ok(())
    }

    async fn list_approved(&self, exclude_closed: bool) -> Result<Vec<Advertisement>, Error> {
        let rows = sqlx::query_as::<_, Advertisement>(
            r#"
            SELECT advertisement_id, company_name, website, coupon_info, trees_per_click,
                   advertisement_content, advertisement_image, created_by, approved, closed,
                   ngo, trees_planted, created_at, updated_at
            FROM advertisements
            WHERE approved = TRUE
              AND ($1 = FALSE OR closed = FALSE)
            ORDER BY created_at ASC
            "#,
        )
            .bind(exclude_closed)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn list_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Advertisement>, Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, Advertisement>(
            r#"
            SELECT advertisement_id, company_name, website, coupon_info, trees_per_click,
                   advertisement_content, advertisement_image, created_by, approved, closed,
                   ngo, trees_planted, created_at, updated_at
            FROM advertisements
            WHERE approved = TRUE
              AND advertisement_id = ANY($1)
            ORDER BY created_at ASC
            "#,
        )
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn list_all(&self) -> Result<Vec<Advertisement>, Error> {
        let rows = sqlx::query_as::<_, Advertisement>(
            r#"
            SELECT advertisement_id, company_name, website, coupon_info, trees_per_click,
                   advertisement_content, advertisement_image, created_by, approved, closed,
                   ngo, trees_planted, created_at, updated_at
            FROM advertisements
            ORDER BY created_at ASC
            "#,
        )
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }
}
