// File: treetap-core/src/notifications/log_notifier.rs

use async_trait::async_trait;
use tracing::info;
use treetap_common::error::Error;
use treetap_common::models::Notification;

use super::Notifier;

/// Writes every notification to the log instead of delivering it.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    from: String,
}

impl LogNotifier {
    pub fn new(from: &str) -> Self {
        Self { from: from.to_string() }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), Error> {
        info!(
            from = %self.from,
            to = %notification.recipient,
            subject = %notification.subject,
            "notification:\n{}",
            notification.body
        );
        Ok(())
    }
}
