use std::collections::HashSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Error;
use crate::models::{Advertisement, Coupon, RedemptionClaim, RedemptionReceipt, UserAccount};

#[async_trait]
pub trait AdvertisementRepository: Send + Sync {
    async fn create(&self, ad: &Advertisement) -> Result<(), Error>;
    async fn get(&self, advertisement_id: Uuid) -> Result<Option<Advertisement>, Error>;

    /// Appends `initial_codes` to the pool and sets `approved = true`, `ngo = ngo`,
    /// `trees_planted = 0`, all as one unit: on any error nothing changes.
    ///
    /// An advertisement that is already approved fails with `AlreadyApproved` unless
    /// `reset_if_approved` is set. Fails with `NotFound` when the advertisement does not exist.
    async fn approve(
        &self,
        advertisement_id: Uuid,
        ngo: &str,
        initial_codes: &[String],
        reset_if_approved: bool,
    ) -> Result<(), Error>;

    async fn close(&self, advertisement_id: Uuid) -> Result<(), Error>;
    async fn reopen(&self, advertisement_id: Uuid) -> Result<(), Error>;

    /// Atomic add; never a read followed by a separate write.
    async fn increment_trees(&self, advertisement_id: Uuid, amount: i64) -> Result<(), Error>;

    async fn list_approved(&self, exclude_closed: bool) -> Result<Vec<Advertisement>, Error>;
    /// Approved advertisements among `ids`. Unknown ids are skipped.
    async fn list_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Advertisement>, Error>;
    async fn list_all(&self) -> Result<Vec<Advertisement>, Error>;
}

#[async_trait]
pub trait CouponRepository: Send + Sync {
    /// Appends unassigned coupons. Rejects the whole batch with `DuplicateCode` if any code
    /// already exists for the advertisement, assigned or not. Returns the number inserted.
    async fn add_coupons(&self, advertisement_id: Uuid, codes: &[String]) -> Result<usize, Error>;

    /// A uniformly random unassigned code, skipping `excluded`. `None` when nothing is left.
    async fn select_available_code(
        &self,
        advertisement_id: Uuid,
        excluded: &HashSet<String>,
    ) -> Result<Option<String>, Error>;

    /// Unassigned -> assigned for exactly one caller. Losers get `AlreadyAssigned`; a user who
    /// already holds a coupon for the advertisement gets `AlreadyRedeemed`.
    async fn assign(&self, advertisement_id: Uuid, code: &str, user_email: &str) -> Result<(), Error>;

    async fn count_unassigned(&self, advertisement_id: Uuid) -> Result<i64, Error>;
    async fn has_assignment(&self, advertisement_id: Uuid, user_email: &str) -> Result<bool, Error>;
    async fn list_for_user(&self, user_email: &str) -> Result<Vec<Coupon>, Error>;
    async fn list_for_advertisement(&self, advertisement_id: Uuid) -> Result<Vec<Coupon>, Error>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get(&self, email_address: &str) -> Result<Option<UserAccount>, Error>;

    /// Atomic add, creating the account on first credit.
    async fn increment_trees(&self, email_address: &str, amount: i64) -> Result<(), Error>;
}

/// Commits the mutating half of a redemption as one unit: assign the code, close the
/// advertisement if the pool is now empty, and credit both counters.
#[async_trait]
pub trait RedemptionLedger: Send + Sync {
    async fn commit_redemption(&self, claim: &RedemptionClaim) -> Result<RedemptionReceipt, Error>;
}
