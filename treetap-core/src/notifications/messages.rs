// File: treetap-core/src/notifications/messages.rs

use treetap_common::models::{Advertisement, Notification};

pub const SUBJECT_CREATED: &str = "New Advertisement Created";
pub const SUBJECT_RECEIVED: &str = "Advertisement Request Received";
pub const SUBJECT_APPROVED: &str = "Advertisement Approved";

const SIGNATURE: &str = "Best regards,\nTree Tap YYY";

/// Tells the admin a new submission is waiting for review.
pub fn advertisement_created(admin_email: &str, ad: &Advertisement) -> Notification {
    let body = format!(
        "Dear Admin,\n\nA new advertisement has been created by {}.\n\n\
         Company Name: {}\nWebsite: {}\nCoupon Info: {}\nTrees per Click: {}\n\
         Advertisement Content: {}\n\n{}",
        ad.created_by,
        ad.company_name,
        ad.website,
        ad.coupon_info,
        ad.trees_per_click,
        ad.advertisement_content,
        SIGNATURE,
    );
    Notification::new(admin_email, SUBJECT_CREATED, body)
}

pub fn request_received(ad: &Advertisement) -> Notification {
    let body = format!(
        "Dear {},\n\nThank you for submitting your advertisement request. We have received your \
         request and will review your advertisement soon. We will be in contact with you shortly \
         regarding the status of your request.\n\n{}",
        ad.created_by, SIGNATURE,
    );
    Notification::new(&ad.created_by, SUBJECT_RECEIVED, body)
}

pub fn advertisement_approved(ad: &Advertisement) -> Notification {
    let body = format!(
        "Dear Advertiser,\n\nYour advertisement for {} has been approved and is now live. \
         Thank you for using our service!\n\n{}",
        ad.company_name, SIGNATURE,
    );
    Notification::new(&ad.created_by, SUBJECT_APPROVED, body)
}
