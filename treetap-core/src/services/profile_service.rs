use std::sync::Arc;

use tracing::debug;
use treetap_common::error::Error;
use treetap_common::models::UserProfile;
use treetap_common::traits::{CouponRepository, UserRepository};

pub struct ProfileService {
    users: Arc<dyn UserRepository>,
    coupons: Arc<dyn CouponRepository>,
}

impl ProfileService {
    pub fn new(users: Arc<dyn UserRepository>, coupons: Arc<dyn CouponRepository>) -> Self {
        Self { users, coupons }
    }

    /// Trees, derived carbon credit and held coupons. A user who never redeemed anything gets
    /// an all-zero profile rather than an error.
    pub async fn get_profile(&self, user_email: &str) -> Result<UserProfile, Error> {
        let trees_planted = self
            .users
            .get(user_email)
            .await?
            .map(|account| account.trees_planted)
            .unwrap_or(0);
        let coupons = self.coupons.list_for_user(user_email).await?;

        debug!("Profile for {}: {} tree(s), {} coupon(s)", user_email, trees_planted, coupons.len());
        Ok(UserProfile::new(user_email, trees_planted, coupons))
    }
}
