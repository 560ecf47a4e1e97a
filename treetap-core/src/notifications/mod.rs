//! treetap-core/src/notifications/mod.rs
//!
//! Best-effort outbound messages. Nothing in here may fail the operation that triggered it.

pub mod log_notifier;
pub mod messages;
pub mod queued;

use async_trait::async_trait;
use treetap_common::error::Error;
use treetap_common::models::Notification;

pub use log_notifier::LogNotifier;
pub use queued::{spawn_notifier_task, QueuedNotifier};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), Error>;
}
