// File: treetap-server/src/context.rs

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;
use treetap_core::notifications::{spawn_notifier_task, LogNotifier};
use treetap_core::repositories::postgres::{
    PostgresAdvertisementRepository, PostgresCouponRepository, PostgresRedemptionLedger,
    PostgresUserRepository,
};
use treetap_core::services::{AdvertisementService, ProfileService, RedemptionService};
use treetap_core::{CoreConfig, Database, Error};

const NOTIFICATION_QUEUE: usize = 64;

/// Services wired against one Postgres pool, plus the notification task that has to be
/// flushed before exit.
pub struct AppContext {
    pub advertisements: AdvertisementService,
    pub redemption: RedemptionService,
    pub profiles: ProfileService,
    notifier_task: JoinHandle<()>,
}

impl AppContext {
    pub async fn new(database_url: &str, migrate: bool, config: CoreConfig) -> Result<Self, Error> {
        let db = Database::new(database_url).await?;
        if migrate {
            db.migrate().await?;
        }

        let pool = db.pool().clone();
        let ad_repo = Arc::new(PostgresAdvertisementRepository::new(pool.clone()));
        let coupon_repo = Arc::new(PostgresCouponRepository::new(pool.clone()));
        let user_repo = Arc::new(PostgresUserRepository::new(pool.clone()));
        let ledger = Arc::new(PostgresRedemptionLedger::new(pool));

        let (notifier, notifier_task) =
            spawn_notifier_task(LogNotifier::new(&config.notify_from), NOTIFICATION_QUEUE);
        let config = Arc::new(config);

        Ok(Self {
            advertisements: AdvertisementService::new(
                ad_repo.clone(),
                coupon_repo.clone(),
                Arc::new(notifier),
                config.clone(),
            ),
            redemption: RedemptionService::new(ad_repo, coupon_repo.clone(), ledger, config),
            profiles: ProfileService::new(user_repo, coupon_repo),
            notifier_task,
        })
    }

    /// Drops the services (and with them the queue sender) and waits for queued
    /// notifications to be delivered.
    pub async fn shutdown(self) {
        let AppContext {
            advertisements,
            redemption,
            profiles,
            notifier_task,
        } = self;
        drop(advertisements);
        drop(redemption);
        drop(profiles);

        if let Err(e) = notifier_task.await {
            tracing::error!("Notification task ended abnormally: {:?}", e);
        }
        info!("Shutdown complete.");
    }
}
