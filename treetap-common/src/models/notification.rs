use serde::{Deserialize, Serialize};

/// A plain-text message for the notification sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn new(recipient: &str, subject: &str, body: String) -> Self {
        Self {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body,
        }
    }
}
