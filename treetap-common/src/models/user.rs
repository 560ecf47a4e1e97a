use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::coupon::Coupon;

/// Carbon credit is a display value only: trees planted times this factor.
pub const CARBON_CREDIT_PER_TREE: i64 = 22;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserAccount {
    pub email_address: String,
    pub trees_planted: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub email_address: String,
    pub trees_planted: i64,
    pub carbon_credit: i64,
    pub coupons: Vec<Coupon>,
}

impl UserProfile {
    pub fn new(email_address: &str, trees_planted: i64, coupons: Vec<Coupon>) -> Self {
        Self {
            email_address: email_address.to_string(),
            trees_planted,
            carbon_credit: trees_planted.saturating_mul(CARBON_CREDIT_PER_TREE),
            coupons,
        }
    }
}
