// src/repositories/postgres/mod.rs

pub mod advertisements;
pub mod coupons;
pub mod ledger;
pub mod users;

pub use advertisements::PostgresAdvertisementRepository;
pub use coupons::PostgresCouponRepository;
pub use ledger::PostgresRedemptionLedger;
pub use users::PostgresUserRepository;
