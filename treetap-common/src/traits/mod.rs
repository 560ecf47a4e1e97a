pub mod repository_traits;

pub use repository_traits::{AdvertisementRepository, CouponRepository, RedemptionLedger, UserRepository};
