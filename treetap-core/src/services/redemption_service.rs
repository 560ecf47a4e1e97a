//! treetap-core/src/services/redemption_service.rs
//!
//! `plant_tree`: the gated redemption flow. The checks before the commit are fast paths only;
//! the ledger's conditional assignment is what actually decides who gets a code.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;
use treetap_common::error::Error;
use treetap_common::models::{PlantedTree, RedemptionClaim};
use treetap_common::traits::{AdvertisementRepository, CouponRepository, RedemptionLedger};

use crate::config::CoreConfig;

pub struct RedemptionService {
    advertisements: Arc<dyn AdvertisementRepository>,
    coupons: Arc<dyn CouponRepository>,
    ledger: Arc<dyn RedemptionLedger>,
    config: Arc<CoreConfig>,
}

impl RedemptionService {
    pub fn new(
        advertisements: Arc<dyn AdvertisementRepository>,
        coupons: Arc<dyn CouponRepository>,
        ledger: Arc<dyn RedemptionLedger>,
        config: Arc<CoreConfig>,
    ) -> Self {
        Self {
            advertisements,
            coupons,
            ledger,
            config,
        }
    }

    pub async fn plant_tree(&self, advertisement_id: Uuid, user_email: &str) -> Result<PlantedTree, Error> {
        if user_email.trim().is_empty() {
            return Err(Error::InvalidInput("user identity must not be empty".into()));
        }

        let ad = self
            .advertisements
            .get(advertisement_id)
            .await?
            .filter(|ad| ad.approved)
            .ok_or_else(|| Error::NotFound(format!("Advertisement {advertisement_id} not found")))?;

        if ad.closed {
            let remaining = self.coupons.count_unassigned(advertisement_id).await?;
            return Err(if remaining == 0 {
                Error::Exhausted(advertisement_id)
            } else {
                Error::Closed(advertisement_id)
            });
        }

        if self.coupons.has_assignment(advertisement_id, user_email).await? {
            return Err(Error::AlreadyRedeemed {
                advertisement_id,
                user_email: user_email.to_string(),
            });
        }

        // Read once; the credit uses the rate seen when the redemption started.
        let trees = i64::from(ad.trees_per_click);
        let mut excluded: HashSet<String> = HashSet::new();

        for attempt in 1..=self.config.max_assign_attempts {
            let Some(code) = self.coupons.select_available_code(advertisement_id, &excluded).await? else {
                debug!("No coupons left for {} after {} attempt(s)", advertisement_id, attempt - 1);
                return Err(Error::Exhausted(advertisement_id));
            };

            let claim = RedemptionClaim {
                advertisement_id,
                code,
                user_email: user_email.to_string(),
                trees,
            };

            match self.ledger.commit_redemption(&claim).await {
                Ok(receipt) => {
                    info!(
                        "{} planted {} tree(s) via {} (remaining={}, closed={})",
                        user_email, trees, advertisement_id, receipt.remaining, receipt.advertisement_closed
                    );
                    return Ok(PlantedTree {
                        advertisement_id,
                        coupon_code: claim.code,
                        trees_awarded: trees,
                        advertisement_closed: receipt.advertisement_closed,
                    });
                }
                Err(e) if e.is_retryable_race() => {
                    debug!("Attempt {} lost coupon '{}' on {}; retrying", attempt, claim.code, advertisement_id);
                    excluded.insert(claim.code);
                }
                Err(e) => return Err(e),
            }
        }

        warn!(
            "Giving up on {} for {} after {} contested attempts",
            advertisement_id, user_email, self.config.max_assign_attempts
        );
        Err(Error::Exhausted(advertisement_id))
    }
}
