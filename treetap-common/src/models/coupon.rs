// File: treetap-common/src/models/coupon.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Assignment is one-way: once `AssignedTo`, a coupon never goes back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "user_email", rename_all = "snake_case")]
pub enum CouponState {
    Unassigned,
    AssignedTo(String),
}

impl CouponState {
    /// Maps the nullable `user_email` storage column onto the state.
    pub fn from_user_email(user_email: Option<String>) -> Self {
        match user_email {
            Some(email) => CouponState::AssignedTo(email),
            None => CouponState::Unassigned,
        }
    }

    pub fn user_email(&self) -> Option<&str> {
        match self {
            CouponState::AssignedTo(email) => Some(email.as_str()),
            CouponState::Unassigned => None,
        }
    }
}

/// A single-use code belonging to one advertisement's pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub coupon_id: Uuid,
    pub advertisement_id: Uuid,
    /// Unique within its advertisement only.
    pub code: String,
    pub state: CouponState,
    pub created_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
}

impl Coupon {
    pub fn new(advertisement_id: Uuid, code: impl Into<String>) -> Self {
        Self {
            coupon_id: Uuid::new_v4(),
            advertisement_id,
            code: code.into(),
            state: CouponState::Unassigned,
            created_at: Utc::now(),
            assigned_at: None,
        }
    }

    pub fn is_assigned(&self) -> bool {
        matches!(self.state, CouponState::AssignedTo(_))
    }

    pub fn user_email(&self) -> Option<&str> {
        self.state.user_email()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_follows_nullable_email() {
        assert_eq!(CouponState::from_user_email(None), CouponState::Unassigned);
        let state = CouponState::from_user_email(Some("u@x.test".into()));
        assert_eq!(state.user_email(), Some("u@x.test"));
    }

    #[test]
    fn fresh_coupons_are_unassigned() {
        let c = Coupon::new(Uuid::new_v4(), "X1");
        assert!(!c.is_assigned());
        assert!(c.assigned_at.is_none());
        assert_eq!(c.user_email(), None);
    }
}
