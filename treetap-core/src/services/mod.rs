// File: src/services/mod.rs

pub mod advertisement_service;
pub mod profile_service;
pub mod redemption_service;

pub use advertisement_service::AdvertisementService;
pub use profile_service::ProfileService;
pub use redemption_service::RedemptionService;
