// ================================================================
// File: treetap-common/src/error.rs
// ================================================================

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Not found error: {0}")]
    NotFound(String),

    #[error("Advertisement {0} is closed")]
    Closed(Uuid),

    #[error("User '{user_email}' already holds a coupon for advertisement {advertisement_id}")]
    AlreadyRedeemed {
        advertisement_id: Uuid,
        user_email: String,
    },

    #[error("No coupon codes left for advertisement {0}")]
    Exhausted(Uuid),

    #[error("Duplicate coupon codes for advertisement {advertisement_id}: {}", codes.join(", "))]
    DuplicateCode {
        advertisement_id: Uuid,
        codes: Vec<String>,
    },

    /// Lost a race for a single code. Only the redemption retry loop should ever see this.
    #[error("Coupon '{code}' of advertisement {advertisement_id} is already assigned")]
    AlreadyAssigned {
        advertisement_id: Uuid,
        code: String,
    },

    #[error("Advertisement {0} is already approved")]
    AlreadyApproved(Uuid),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True for the internal assignment race signal, which callers retry with another code.
    pub fn is_retryable_race(&self) -> bool {
        matches!(self, Error::AlreadyAssigned { .. })
    }

    /// Builds a `DuplicateCode` with the colliding codes sorted and de-duplicated,
    /// so the message is stable no matter how the batch was ordered.
    pub fn duplicate_codes<I, S>(advertisement_id: Uuid, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut codes: Vec<String> = codes.into_iter().map(Into::into).collect();
        codes.sort();
        codes.dedup();
        Error::DuplicateCode { advertisement_id, codes }
    }
}
