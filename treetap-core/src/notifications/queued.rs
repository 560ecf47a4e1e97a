//! treetap-core/src/notifications/queued.rs
//!
//! Hands notifications to a background task over a bounded queue so callers never wait on
//! delivery. The task drains whatever is queued once every sender is gone.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use treetap_common::error::Error;
use treetap_common::models::Notification;

use super::Notifier;

#[derive(Clone)]
pub struct QueuedNotifier {
    tx: mpsc::Sender<Notification>,
}

/// Spawns the delivery task. Drop every `QueuedNotifier` clone and await the handle to flush.
pub fn spawn_notifier_task<N>(inner: N, capacity: usize) -> (QueuedNotifier, JoinHandle<()>)
where
    N: Notifier + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Notification>(capacity.max(1));

    let handle = tokio::spawn(async move {
        info!("Notification task started with capacity={}", capacity);
        while let Some(notification) = rx.recv().await {
            if let Err(e) = inner.send(&notification).await {
                error!("Delivering '{}' to {} failed: {}", notification.subject, notification.recipient, e);
            }
        }
        info!("Notification task exited.");
    });

    (QueuedNotifier { tx }, handle)
}

#[async_trait]
impl Notifier for QueuedNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), Error> {
        match self.tx.try_send(notification.clone()) {
            Ok(()) => {
                debug!("Queued '{}' for {}", notification.subject, notification.recipient);
                Ok(())
            }
            Err(TrySendError::Full(dropped)) => {
                warn!("Notification queue full; dropping '{}' for {}", dropped.subject, dropped.recipient);
                Err(Error::Notification("notification queue is full".into()))
            }
            Err(TrySendError::Closed(_)) => {
                Err(Error::Notification("notification task is not running".into()))
            }
        }
    }
}
