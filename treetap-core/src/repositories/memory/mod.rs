//! treetap-core/src/repositories/memory/mod.rs
//!
//! In-process backend. Each advertisement lives in one `DashMap` entry together with its coupon
//! pool, so everything a redemption touches for that advertisement sits behind one shard lock.
//! Lock order is always advertisement entry, then user entry.

mod pool;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info};
use uuid::Uuid;
use treetap_common::error::Error;
use treetap_common::models::{
    Advertisement, Coupon, RedemptionClaim, RedemptionReceipt, UserAccount,
};
use treetap_common::traits::{
    AdvertisementRepository, CouponRepository, RedemptionLedger, UserRepository,
};

use pool::CouponPool;

#[derive(Debug)]
struct AdvertisementEntry {
    advertisement: Advertisement,
    pool: CouponPool,
}

#[derive(Debug, Default)]
struct Inner {
    advertisements: DashMap<Uuid, AdvertisementEntry>,
    users: DashMap<String, UserAccount>,
}

/// Cheap to clone; clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

fn not_found(advertisement_id: Uuid) -> Error {
    Error::NotFound(format!("Advertisement {advertisement_id} not found"))
}

fn sorted(mut ads: Vec<Advertisement>) -> Vec<Advertisement> {
    ads.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.advertisement_id.cmp(&b.advertisement_id))
    });
    ads
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entry<T>(
        &self,
        advertisement_id: Uuid,
        f: impl FnOnce(&mut AdvertisementEntry) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut entry = self
            .inner
            .advertisements
            .get_mut(&advertisement_id)
            .ok_or_else(|| not_found(advertisement_id))?;
        f(entry.value_mut())
    }

    fn collect_advertisements(&self, keep: impl Fn(&Advertisement) -> bool) -> Vec<Advertisement> {
        let ads = self
            .inner
            .advertisements
            .iter()
            .filter(|entry| keep(&entry.advertisement))
            .map(|entry| entry.advertisement.clone())
            .collect();
        sorted(ads)
    }

    fn credit_user(&self, email_address: &str, amount: i64) {
        let now = Utc::now();
        self.inner
            .users
            .entry(email_address.to_string())
            .and_modify(|user| {
                user.trees_planted += amount;
                user.updated_at = now;
            })
            .or_insert_with(|| UserAccount {
                email_address: email_address.to_string(),
                trees_planted: amount,
                created_at: now,
                updated_at: now,
            });
    }
}

fn check_increment(amount: i64) -> Result<(), Error> {
    if amount < 0 {
        return Err(Error::InvalidInput(format!("tree increment must not be negative, got {amount}")));
    }
    Ok(())
}

#[async_trait]
impl AdvertisementRepository for MemoryStore {
    async fn create(&self, ad: &Advertisement) -> Result<(), Error> {
        match self.inner.advertisements.entry(ad.advertisement_id) {
            Entry::Occupied(_) => Err(Error::InvalidInput(format!(
                "advertisement {} already exists",
                ad.advertisement_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(AdvertisementEntry {
                    advertisement: ad.clone(),
                    pool: CouponPool::new(ad.advertisement_id),
                });
                debug!("Stored advertisement {} for {}", ad.advertisement_id, ad.created_by);
                Ok(())
            }
        }
    }

    async fn get(&self, advertisement_id: Uuid) -> Result<Option<Advertisement>, Error> {
        Ok(self
            .inner
            .advertisements
            .get(&advertisement_id)
            .map(|entry| entry.advertisement.clone()))
    }

    async fn approve(
        &self,
        advertisement_id: Uuid,
        ngo: &str,
        initial_codes: &[String],
        reset_if_approved: bool,
    ) -> Result<(), Error> {
        self.with_entry(advertisement_id, |entry| {
            if entry.advertisement.approved && !reset_if_approved {
                return Err(Error::AlreadyApproved(advertisement_id));
            }
            entry.pool.add(initial_codes)?;

            let ad = &mut entry.advertisement;
            ad.approved = true;
            ad.ngo = Some(ngo.to_string());
            ad.trees_planted = 0;
            ad.updated_at = Utc::now();
            Ok(())
        })?;
        info!("Advertisement {} approved for ngo='{}'", advertisement_id, ngo);
        Ok(())
    }

    async fn close(&self, advertisement_id: Uuid) -> Result<(), Error> {
        self.with_entry(advertisement_id, |entry| {
            entry.advertisement.closed = true;
            entry.advertisement.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn reopen(&self, advertisement_id: Uuid) -> Result<(), Error> {
        self.with_entry(advertisement_id, |entry| {
            entry.advertisement.closed = false;
            entry.advertisement.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn increment_trees(&self, advertisement_id: Uuid, amount: i64) -> Result<(), Error> {
        check_increment(amount)?;
        self.with_entry(advertisement_id, |entry| {
            entry.advertisement.trees_planted += amount;
            entry.advertisement.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn list_approved(&self, exclude_closed: bool) -> Result<Vec<Advertisement>, Error> {
        Ok(self.collect_advertisements(|ad| ad.approved && !(exclude_closed && ad.closed)))
    }

    async fn list_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Advertisement>, Error> {
        let wanted: HashSet<&Uuid> = ids.iter().collect();
        Ok(self.collect_advertisements(|ad| ad.approved && wanted.contains(&ad.advertisement_id)))
    }

    async fn list_all(&self) -> Result<Vec<Advertisement>, Error> {
        Ok(self.collect_advertisements(|_| true))
    }
}

#[async_trait]
impl CouponRepository for MemoryStore {
    async fn add_coupons(&self, advertisement_id: Uuid, codes: &[String]) -> Result<usize, Error> {
        let added = self.with_entry(advertisement_id, |entry| entry.pool.add(codes))?;
        if added > 0 {
            info!("Added {} coupon(s) to advertisement {}", added, advertisement_id);
        }
        Ok(added)
    }

    async fn select_available_code(
        &self,
        advertisement_id: Uuid,
        excluded: &HashSet<String>,
    ) -> Result<Option<String>, Error> {
        let entry = self
            .inner
            .advertisements
            .get(&advertisement_id)
            .ok_or_else(|| not_found(advertisement_id))?;
        Ok(entry.pool.select(excluded, &mut rand::rng()))
    }

    async fn assign(&self, advertisement_id: Uuid, code: &str, user_email: &str) -> Result<(), Error> {
        self.with_entry(advertisement_id, |entry| entry.pool.assign(code, user_email))
    }

    async fn count_unassigned(&self, advertisement_id: Uuid) -> Result<i64, Error> {
        let entry = self
            .inner
            .advertisements
            .get(&advertisement_id)
            .ok_or_else(|| not_found(advertisement_id))?;
        Ok(entry.pool.unassigned() as i64)
    }

    async fn has_assignment(&self, advertisement_id: Uuid, user_email: &str) -> Result<bool, Error> {
        Ok(self
            .inner
            .advertisements
            .get(&advertisement_id)
            .is_some_and(|entry| entry.pool.holds(user_email)))
    }

    async fn list_for_user(&self, user_email: &str) -> Result<Vec<Coupon>, Error> {
        let mut coupons: Vec<Coupon> = self
            .inner
            .advertisements
            .iter()
            .filter_map(|entry| entry.pool.held_by(user_email).cloned())
            .collect();
        coupons.sort_by(|a, b| a.assigned_at.cmp(&b.assigned_at).then_with(|| a.coupon_id.cmp(&b.coupon_id)));
        Ok(coupons)
    }

    async fn list_for_advertisement(&self, advertisement_id: Uuid) -> Result<Vec<Coupon>, Error> {
        Ok(self
            .inner
            .advertisements
            .get(&advertisement_id)
            .map(|entry| entry.pool.coupons().to_vec())
            .unwrap_or_default())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn get(&self, email_address: &str) -> Result<Option<UserAccount>, Error> {
        Ok(self.inner.users.get(email_address).map(|user| user.value().clone()))
    }

    async fn increment_trees(&self, email_address: &str, amount: i64) -> Result<(), Error> {
        check_increment(amount)?;
        self.credit_user(email_address, amount);
        Ok(())
    }
}

#[async_trait]
impl RedemptionLedger for MemoryStore {
    async fn commit_redemption(&self, claim: &RedemptionClaim) -> Result<RedemptionReceipt, Error> {
        check_increment(claim.trees)?;

        let receipt = self.with_entry(claim.advertisement_id, |entry| {
            if entry.advertisement.closed {
                // Drained while this claim was in flight.
                return Err(if entry.pool.unassigned() == 0 {
                    Error::Exhausted(claim.advertisement_id)
                } else {
                    Error::Closed(claim.advertisement_id)
                });
            }
            entry.pool.assign(&claim.code, &claim.user_email)?;

            let remaining = entry.pool.unassigned() as i64;
            let advertisement_closed = remaining == 0;
            let ad = &mut entry.advertisement;
            ad.trees_planted += claim.trees;
            ad.closed = ad.closed || advertisement_closed;
            ad.updated_at = Utc::now();

            // Still under the advertisement lock, so the credit lands with the assignment.
            self.credit_user(&claim.user_email, claim.trees);

            Ok(RedemptionReceipt {
                remaining,
                advertisement_closed,
            })
        })?;

        if receipt.advertisement_closed {
            info!("Advertisement {} ran out of coupons and was closed", claim.advertisement_id);
        }
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treetap_common::models::NewAdvertisement;

    async fn approved_ad(store: &MemoryStore, codes: &[&str]) -> Uuid {
        let ad = NewAdvertisement {
            company_name: "Acme".into(),
            website: "https://acme.test".into(),
            coupon_info: "10% off".into(),
            trees_per_click: 3,
            advertisement_content: "Plant with us".into(),
            advertisement_image: None,
            created_by: "owner@acme.test".into(),
        }
        .into_advertisement();
        let id = ad.advertisement_id;
        AdvertisementRepository::create(store, &ad).await.unwrap();
        let codes: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
        store.approve(id, "GreenNGO", &codes, false).await.unwrap();
        id
    }

    fn claim(id: Uuid, code: &str, user: &str) -> RedemptionClaim {
        RedemptionClaim {
            advertisement_id: id,
            code: code.to_string(),
            user_email: user.to_string(),
            trees: 3,
        }
    }

    #[tokio::test]
    async fn commit_credits_both_counters_and_closes_on_last_coupon() {
        let store = MemoryStore::new();
        let id = approved_ad(&store, &["A", "B"]).await;

        let first = store.commit_redemption(&claim(id, "A", "u1@x.test")).await.unwrap();
        assert_eq!(first.remaining, 1);
        assert!(!first.advertisement_closed);

        let second = store.commit_redemption(&claim(id, "B", "u2@x.test")).await.unwrap();
        assert_eq!(second.remaining, 0);
        assert!(second.advertisement_closed);

        let ad = AdvertisementRepository::get(&store, id).await.unwrap().unwrap();
        assert!(ad.closed);
        assert_eq!(ad.trees_planted, 6);
        let u1 = UserRepository::get(&store, "u1@x.test").await.unwrap().unwrap();
        assert_eq!(u1.trees_planted, 3);
    }

    #[tokio::test]
    async fn failed_commit_changes_nothing() {
        let store = MemoryStore::new();
        let id = approved_ad(&store, &["A", "B"]).await;
        store.commit_redemption(&claim(id, "A", "u1@x.test")).await.unwrap();

        let err = store.commit_redemption(&claim(id, "A", "u2@x.test")).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyAssigned { .. }));
        let err = store.commit_redemption(&claim(id, "B", "u1@x.test")).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyRedeemed { .. }));

        assert_eq!(store.count_unassigned(id).await.unwrap(), 1);
        assert!(UserRepository::get(&store, "u2@x.test").await.unwrap().is_none());
        let ad = AdvertisementRepository::get(&store, id).await.unwrap().unwrap();
        assert_eq!(ad.trees_planted, 3);
    }

    #[tokio::test]
    async fn commit_on_closed_or_unknown_advertisement_fails() {
        let store = MemoryStore::new();
        let id = approved_ad(&store, &["A", "B"]).await;
        store.close(id).await.unwrap();

        let err = store.commit_redemption(&claim(id, "A", "u1@x.test")).await.unwrap_err();
        assert!(matches!(err, Error::Closed(closed) if closed == id));

        // Closed because the pool ran dry reads as exhaustion.
        let drained = approved_ad(&store, &["C"]).await;
        store.commit_redemption(&claim(drained, "C", "u1@x.test")).await.unwrap();
        let err = store.commit_redemption(&claim(drained, "C", "u2@x.test")).await.unwrap_err();
        assert!(matches!(err, Error::Exhausted(exhausted) if exhausted == drained));

        let err = store.commit_redemption(&claim(Uuid::new_v4(), "A", "u1@x.test")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn listings_are_filtered_and_ordered() {
        let store = MemoryStore::new();
        let first = approved_ad(&store, &["A"]).await;
        let second = approved_ad(&store, &["B"]).await;
        store.close(second).await.unwrap();

        let open = store.list_approved(true).await.unwrap();
        assert_eq!(open.iter().map(|a| a.advertisement_id).collect::<Vec<_>>(), vec![first]);
        assert_eq!(store.list_approved(false).await.unwrap().len(), 2);

        let by_ids = store.list_by_ids(&[second, Uuid::new_v4()]).await.unwrap();
        assert_eq!(by_ids.len(), 1);
        assert_eq!(by_ids[0].advertisement_id, second);
    }

    #[tokio::test]
    async fn user_increment_upserts() {
        let store = MemoryStore::new();
        UserRepository::increment_trees(&store, "new@x.test", 4).await.unwrap();
        UserRepository::increment_trees(&store, "new@x.test", 2).await.unwrap();
        let user = UserRepository::get(&store, "new@x.test").await.unwrap().unwrap();
        assert_eq!(user.trees_planted, 6);

        assert!(matches!(
            UserRepository::increment_trees(&store, "new@x.test", -1).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn second_approval_is_refused_and_leaves_pool_alone() {
        let store = MemoryStore::new();
        let id = approved_ad(&store, &["A"]).await;
        store.commit_redemption(&claim(id, "A", "u1@x.test")).await.unwrap();

        let err = store.approve(id, "OtherNGO", &["B".to_string()], false).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyApproved(a) if a == id));

        let ad = AdvertisementRepository::get(&store, id).await.unwrap().unwrap();
        assert_eq!(ad.ngo.as_deref(), Some("GreenNGO"));
        assert_eq!(ad.trees_planted, 3);
        assert_eq!(store.list_for_advertisement(id).await.unwrap().len(), 1);

        store.approve(id, "OtherNGO", &["B".to_string()], true).await.unwrap();
        let ad = AdvertisementRepository::get(&store, id).await.unwrap().unwrap();
        assert_eq!(ad.ngo.as_deref(), Some("OtherNGO"));
        assert_eq!(ad.trees_planted, 0);
        assert_eq!(store.count_unassigned(id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn approval_with_colliding_codes_stays_unapproved() {
        let store = MemoryStore::new();
        let ad = NewAdvertisement {
            company_name: "Acme".into(),
            website: "https://acme.test".into(),
            coupon_info: "10% off".into(),
            trees_per_click: 3,
            advertisement_content: "Plant with us".into(),
            advertisement_image: None,
            created_by: "owner@acme.test".into(),
        }
        .into_advertisement();
        let id = ad.advertisement_id;
        AdvertisementRepository::create(&store, &ad).await.unwrap();

        let codes = vec!["A".to_string(), "A".to_string()];
        let err = store.approve(id, "GreenNGO", &codes, false).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateCode { .. }));
        let ad = AdvertisementRepository::get(&store, id).await.unwrap().unwrap();
        assert!(!ad.approved);
        assert_eq!(store.count_unassigned(id).await.unwrap(), 0);

        let missing = store.approve(Uuid::new_v4(), "GreenNGO", &[], false).await.unwrap_err();
        assert!(matches!(missing, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn assign_hands_each_code_to_one_user() {
        let store = MemoryStore::new();
        let id = approved_ad(&store, &["A", "B", "C"]).await;

        store.assign(id, "A", "u1@x.test").await.unwrap();
        assert!(store.has_assignment(id, "u1@x.test").await.unwrap());
        assert_eq!(store.count_unassigned(id).await.unwrap(), 2);

        let taken = store.assign(id, "A", "u2@x.test").await.unwrap_err();
        assert!(matches!(taken, Error::AlreadyAssigned { ref code, .. } if code == "A"));
        let twice = store.assign(id, "B", "u1@x.test").await.unwrap_err();
        assert!(matches!(twice, Error::AlreadyRedeemed { ref user_email, .. } if user_email == "u1@x.test"));
        let unknown = store.assign(id, "nope", "u2@x.test").await.unwrap_err();
        assert!(matches!(unknown, Error::NotFound(_)));
        let no_ad = store.assign(Uuid::new_v4(), "A", "u2@x.test").await.unwrap_err();
        assert!(matches!(no_ad, Error::NotFound(_)));

        assert_eq!(store.count_unassigned(id).await.unwrap(), 2);
        assert!(!store.has_assignment(id, "u2@x.test").await.unwrap());
        let held = store.list_for_user("u1@x.test").await.unwrap();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].code, "A");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn advertisement_increment_adds_without_lost_updates() {
        let store = MemoryStore::new();
        let id = approved_ad(&store, &[]).await;

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                AdvertisementRepository::increment_trees(&store, id, 2).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let ad = AdvertisementRepository::get(&store, id).await.unwrap().unwrap();
        assert_eq!(ad.trees_planted, 100);

        assert!(matches!(
            AdvertisementRepository::increment_trees(&store, id, -1).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            AdvertisementRepository::increment_trees(&store, Uuid::new_v4(), 1).await,
            Err(Error::NotFound(_))
        ));
        let ad = AdvertisementRepository::get(&store, id).await.unwrap().unwrap();
        assert_eq!(ad.trees_planted, 100);
    }
}
