// File: treetap-core/tests/test_utils/mod.rs
//
// In-memory fixtures shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;
use treetap_common::models::{NewAdvertisement, Notification};
use treetap_common::traits::{AdvertisementRepository, CouponRepository};
use treetap_core::notifications::Notifier;
use treetap_core::repositories::MemoryStore;
use treetap_core::services::{AdvertisementService, ProfileService, RedemptionService};
use treetap_core::{CoreConfig, Error};

pub const ADMIN: &str = "admin@treetap.test";
pub const ADVERTISER: &str = "owner@acme.test";

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn subjects(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|n| n.subject.clone()).collect()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), Error> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

pub fn codes(list: &[&str]) -> Vec<String> {
    list.iter().map(|c| c.to_string()).collect()
}

pub fn numbered_codes(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|n| format!("{prefix}-{n:03}")).collect()
}

pub fn submission(trees_per_click: i32) -> NewAdvertisement {
    NewAdvertisement {
        company_name: "Acme".into(),
        website: "https://acme.test".into(),
        coupon_info: "10% off your next order".into(),
        trees_per_click,
        advertisement_content: "Plant a tree\\nwith Acme".into(),
        advertisement_image: Some("advertisement_images/acme.png".into()),
        created_by: ADVERTISER.into(),
    }
}

/// Every service wired to one shared `MemoryStore`.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub ads: AdvertisementService,
    pub redemption: Arc<RedemptionService>,
    pub profiles: ProfileService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(CoreConfig::new(ADMIN))
    }

    pub fn with_config(config: CoreConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let config = Arc::new(config);

        let ads = AdvertisementService::new(store.clone(), store.clone(), notifier.clone(), config.clone());
        let redemption = Arc::new(RedemptionService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            config,
        ));
        let profiles = ProfileService::new(store.clone(), store.clone());

        Self {
            store,
            notifier,
            ads,
            redemption,
            profiles,
        }
    }

    /// Submits and approves an advertisement seeded with `initial`.
    pub async fn approved_ad(&self, trees_per_click: i32, initial: &[String]) -> Uuid {
        let ad = self.ads.create_advertisement(submission(trees_per_click)).await.unwrap();
        self.ads
            .approve_advertisement(ADMIN, ad.advertisement_id, "GreenNGO", initial)
            .await
            .unwrap();
        ad.advertisement_id
    }

    pub async fn trees_on(&self, advertisement_id: Uuid) -> i64 {
        AdvertisementRepository::get(self.store.as_ref(), advertisement_id)
            .await
            .unwrap()
            .unwrap()
            .trees_planted
    }

    pub async fn is_closed(&self, advertisement_id: Uuid) -> bool {
        AdvertisementRepository::get(self.store.as_ref(), advertisement_id)
            .await
            .unwrap()
            .unwrap()
            .closed
    }

    pub async fn unassigned(&self, advertisement_id: Uuid) -> i64 {
        self.store.count_unassigned(advertisement_id).await.unwrap()
    }
}
