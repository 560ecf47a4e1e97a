// File: treetap-common/src/models/redemption.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Everything the storage layer needs to commit one redemption in a single unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionClaim {
    pub advertisement_id: Uuid,
    pub code: String,
    pub user_email: String,
    /// `trees_per_click` as read when the redemption started, not re-read at commit time.
    pub trees: i64,
}

/// What the storage layer observed while committing a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedemptionReceipt {
    /// Unassigned codes left in the pool after this assignment.
    pub remaining: i64,
    /// True when this commit drained the pool and closed the advertisement.
    pub advertisement_closed: bool,
}

/// Result of a successful `plant_tree`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantedTree {
    pub advertisement_id: Uuid,
    pub coupon_code: String,
    pub trees_awarded: i64,
    pub advertisement_closed: bool,
}
