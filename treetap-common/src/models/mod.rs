// File: treetap-common/src/models/mod.rs
pub mod advertisement;
pub mod coupon;
pub mod notification;
pub mod redemption;
pub mod user;

pub use advertisement::{Advertisement, AdvertisementListing, NewAdvertisement};
pub use coupon::{Coupon, CouponState};
pub use notification::Notification;
pub use redemption::{PlantedTree, RedemptionClaim, RedemptionReceipt};
pub use user::{UserAccount, UserProfile, CARBON_CREDIT_PER_TREE};
