// File: treetap-common/src/models/advertisement.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// A sponsored campaign. Starts unapproved and open; the admin approves it (attaching an NGO and
/// the first batch of coupon codes) and it closes once its coupon pool runs dry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Advertisement {
    pub advertisement_id: Uuid,
    pub company_name: String,
    pub website: String,
    pub coupon_info: String,
    pub trees_per_click: i32,
    pub advertisement_content: String,

    /// Reference into blob storage; the bytes themselves never pass through here.
    pub advertisement_image: Option<String>,

    /// Identity of the submitting advertiser.
    pub created_by: String,

    pub approved: bool,
    pub closed: bool,
    pub ngo: Option<String>,

    /// Aggregate across all redemptions. Never decreases during normal operation.
    pub trees_planted: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Advertiser-supplied fields for a new submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAdvertisement {
    pub company_name: String,
    pub website: String,
    pub coupon_info: String,
    pub trees_per_click: i32,
    pub advertisement_content: String,
    pub advertisement_image: Option<String>,
    pub created_by: String,
}

impl NewAdvertisement {
    pub fn validate(&self) -> Result<(), Error> {
        if self.trees_per_click <= 0 {
            return Err(Error::InvalidInput(format!(
                "trees_per_click must be positive, got {}",
                self.trees_per_click
            )));
        }
        if self.created_by.trim().is_empty() {
            return Err(Error::InvalidInput("created_by must not be empty".into()));
        }
        if self.company_name.trim().is_empty() {
            return Err(Error::InvalidInput("company_name must not be empty".into()));
        }
        Ok(())
    }

    /// Materializes the submission as an unapproved, open record with a zero counter.
    pub fn into_advertisement(self) -> Advertisement {
        let now = Utc::now();
        Advertisement {
            advertisement_id: Uuid::new_v4(),
            company_name: self.company_name,
            website: self.website,
            coupon_info: self.coupon_info,
            trees_per_click: self.trees_per_click,
            advertisement_content: self.advertisement_content,
            advertisement_image: self.advertisement_image,
            created_by: self.created_by,
            approved: false,
            closed: false,
            ngo: None,
            trees_planted: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Advertisement {
    /// Redemptions are only possible on approved, open advertisements.
    pub fn accepts_redemptions(&self) -> bool {
        self.approved && !self.closed
    }

    /// Content with escaped newlines stripped, the way the public listing shows it.
    pub fn display_content(&self) -> String {
        self.advertisement_content.replace("\\n", "")
    }
}

/// An approved advertisement as seen by one viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvertisementListing {
    #[serde(flatten)]
    pub advertisement: Advertisement,
    /// Whether the viewer already holds a coupon for this advertisement.
    pub already_done: bool,
}
