// File: treetap-core/src/services/advertisement_service.rs

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;
use treetap_common::error::Error;
use treetap_common::models::{Advertisement, AdvertisementListing, Coupon, NewAdvertisement, Notification};
use treetap_common::traits::{AdvertisementRepository, CouponRepository};

use crate::config::{CoreConfig, ReapprovalPolicy};
use crate::notifications::{messages, Notifier};

/// Advertiser submissions and the admin side of the advertisement lifecycle.
pub struct AdvertisementService {
    advertisements: Arc<dyn AdvertisementRepository>,
    coupons: Arc<dyn CouponRepository>,
    notifier: Arc<dyn Notifier>,
    config: Arc<CoreConfig>,
}

/// Rejects empty codes and codes repeated inside the batch before anything touches storage.
fn check_batch(advertisement_id: Uuid, codes: &[String]) -> Result<(), Error> {
    if codes.iter().any(|code| code.trim().is_empty()) {
        return Err(Error::InvalidInput("coupon codes must not be empty".into()));
    }
    let mut seen = HashSet::with_capacity(codes.len());
    let repeated: Vec<String> = codes
        .iter()
        .filter(|code| !seen.insert(code.as_str()))
        .cloned()
        .collect();
    if !repeated.is_empty() {
        return Err(Error::duplicate_codes(advertisement_id, repeated));
    }
    Ok(())
}

impl AdvertisementService {
    pub fn new(
        advertisements: Arc<dyn AdvertisementRepository>,
        coupons: Arc<dyn CouponRepository>,
        notifier: Arc<dyn Notifier>,
        config: Arc<CoreConfig>,
    ) -> Self {
        Self {
            advertisements,
            coupons,
            notifier,
            config,
        }
    }

    fn require_admin(&self, actor: &str, action: &str) -> Result<(), Error> {
        if self.config.is_admin(actor) {
            Ok(())
        } else {
            warn!("Rejected {} by non-admin '{}'", action, actor);
            Err(Error::Unauthorized(format!("Only administrators can {action}")))
        }
    }

    async fn require_advertisement(&self, advertisement_id: Uuid) -> Result<Advertisement, Error> {
        self.advertisements
            .get(advertisement_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Advertisement {advertisement_id} not found")))
    }

    async fn notify(&self, notification: Notification) {
        if let Err(e) = self.notifier.send(&notification).await {
            warn!(
                "Could not send '{}' to {}: {}",
                notification.subject, notification.recipient, e
            );
        }
    }

    /// Stores an unapproved, open advertisement and lets the admin and the advertiser know.
    pub async fn create_advertisement(&self, submission: NewAdvertisement) -> Result<Advertisement, Error> {
        submission.validate()?;
        let ad = submission.into_advertisement();
        self.advertisements.create(&ad).await?;
        info!("Advertisement {} submitted by {}", ad.advertisement_id, ad.created_by);

        self.notify(messages::advertisement_created(&self.config.admin_email, &ad)).await;
        self.notify(messages::request_received(&ad)).await;
        Ok(ad)
    }

    /// Approves the advertisement for `ngo` and seeds its pool with `initial_codes`.
    ///
    /// What happens on an advertisement that is already approved depends on
    /// [`ReapprovalPolicy`].
    pub async fn approve_advertisement(
        &self,
        actor: &str,
        advertisement_id: Uuid,
        ngo: &str,
        initial_codes: &[String],
    ) -> Result<Advertisement, Error> {
        self.require_admin(actor, "approve advertisements")?;
        let ad = self.require_advertisement(advertisement_id).await?;
        let reset_if_approved = self.config.reapproval == ReapprovalPolicy::ResetCounter;

        if ad.approved {
            if !reset_if_approved {
                warn!("Advertisement {} is already approved; refusing to approve again", advertisement_id);
                return Err(Error::AlreadyApproved(advertisement_id));
            }
            warn!(
                "Re-approving {}: trees_planted {} will be reset to 0",
                advertisement_id, ad.trees_planted
            );
        }

        check_batch(advertisement_id, initial_codes)?;
        // The read above can be stale; storage re-checks the flag under its own lock.
        if let Err(e) = self
            .advertisements
            .approve(advertisement_id, ngo, initial_codes, reset_if_approved)
            .await
        {
            if matches!(e, Error::AlreadyApproved(_)) {
                warn!("Advertisement {} was approved concurrently; refusing to approve again", advertisement_id);
            }
            return Err(e);
        }

        let approved = self.require_advertisement(advertisement_id).await?;
        self.notify(messages::advertisement_approved(&approved)).await;
        Ok(approved)
    }

    pub async fn close_advertisement(&self, actor: &str, advertisement_id: Uuid) -> Result<(), Error> {
        self.require_admin(actor, "close advertisements")?;
        self.advertisements.close(advertisement_id).await?;
        info!("Advertisement {} closed by {}", advertisement_id, actor);
        Ok(())
    }

    /// Closing is never undone automatically, not even by a refill; this is the explicit way back.
    pub async fn reopen_advertisement(&self, actor: &str, advertisement_id: Uuid) -> Result<(), Error> {
        self.require_admin(actor, "reopen advertisements")?;
        self.advertisements.reopen(advertisement_id).await?;
        info!("Advertisement {} reopened by {}", advertisement_id, actor);
        Ok(())
    }

    /// Appends codes to the pool. The whole batch is rejected if any code repeats within it or
    /// collides with an existing code. Closed advertisements accept refills and stay closed.
    pub async fn refill_coupons(
        &self,
        actor: &str,
        advertisement_id: Uuid,
        codes: &[String],
    ) -> Result<usize, Error> {
        self.require_admin(actor, "refill coupons")?;
        let ad = self.require_advertisement(advertisement_id).await?;
        check_batch(advertisement_id, codes)?;

        let accepted = self.coupons.add_coupons(advertisement_id, codes).await?;
        if ad.closed {
            info!("Refilled closed advertisement {} with {} code(s); it stays closed", advertisement_id, accepted);
        }
        Ok(accepted)
    }

    /// Approved advertisements as `viewer` sees them, each flagged with whether the viewer
    /// already holds one of its coupons.
    pub async fn list_public(&self, viewer: &str, exclude_closed: bool) -> Result<Vec<AdvertisementListing>, Error> {
        let held: HashSet<Uuid> = self
            .coupons
            .list_for_user(viewer)
            .await?
            .into_iter()
            .map(|coupon| coupon.advertisement_id)
            .collect();

        let listings = self
            .advertisements
            .list_approved(exclude_closed)
            .await?
            .into_iter()
            .map(|mut ad| {
                ad.advertisement_content = ad.display_content();
                let already_done = held.contains(&ad.advertisement_id);
                AdvertisementListing {
                    advertisement: ad,
                    already_done,
                }
            })
            .collect();
        Ok(listings)
    }

    pub async fn list_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Advertisement>, Error> {
        self.advertisements.list_by_ids(ids).await
    }

    pub async fn list_all(&self, actor: &str) -> Result<Vec<Advertisement>, Error> {
        self.require_admin(actor, "list every advertisement")?;
        self.advertisements.list_all().await
    }

    pub async fn list_coupons(&self, actor: &str, advertisement_id: Uuid) -> Result<Vec<Coupon>, Error> {
        self.require_admin(actor, "audit coupon pools")?;
        self.require_advertisement(advertisement_id).await?;
        self.coupons.list_for_advertisement(advertisement_id).await
    }
}
