// src/repositories/mod.rs

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::{
    PostgresAdvertisementRepository, PostgresCouponRepository, PostgresRedemptionLedger,
    PostgresUserRepository,
};
