// src/repositories/postgres/users.rs

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};
use treetap_common::error::Error;
use treetap_common::models::UserAccount;
use treetap_common::traits::UserRepository;

/// SQL shared with the redemption ledger, which runs it inside its own transaction.
pub(crate) const INCREMENT_USER_TREES_SQL: &str = r#"
    INSERT INTO users (email_address, trees_planted, created_at, updated_at)
    VALUES ($1, $2, $3, $3)
    ON CONFLICT (email_address) DO UPDATE
    SET trees_planted = users.trees_planted + EXCLUDED.trees_planted,
        updated_at = EXCLUDED.updated_at
"#;

#[derive(Clone)]
pub struct PostgresUserRepository {
    pool: Pool<Postgres>,
}

impl PostgresUserRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn get(&self, email_address: &str) -> Result<Option<UserAccount>, Error> {
        let user = sqlx::query_as::<_, UserAccount>(
            r#"
            SELECT email_address, trees_planted, created_at, updated_at
            FROM users
            WHERE email_address = $1
            "#,
        )
            .bind(email_address)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn increment_trees(&self, email_address: &str, amount: i64) -> Result<(), Error> {
        if amount < 0 {
            return Err(Error::InvalidInput(format!("tree increment must not be negative, got {amount}")));
        }
        sqlx::query(INCREMENT_USER_TREES_SQL)
            .bind(email_address)
            .bind(amount)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
