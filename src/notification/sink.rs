//! Notification delivery port

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::notification::NewNotification;
use crate::store::MarketStore;

/// Where the trade engine sends its notices
///
/// Delivery failures are reported to the caller, which logs and swallows
/// them; a failed notice never fails the mutation that produced it.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, notice: NewNotification) -> Result<()>;
}

/// Sink that persists notices into the user's in-app inbox
pub struct StoreNotificationSink {
    store: Arc<dyn MarketStore>,
}

impl StoreNotificationSink {
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl NotificationSink for StoreNotificationSink {
    async fn send(&self, notice: NewNotification) -> Result<()> {
        self.store
            .insert_notification(notice.into_notification())
            .await?;
        Ok(())
    }
}

/// Best-effort delivery shared by the services
pub(crate) async fn deliver(sink: &dyn NotificationSink, notice: NewNotification) {
    let user_id = notice.user_id;
    let kind = notice.kind;
    if let Err(e) = sink.send(notice).await {
        tracing::warn!(
            user_id = %user_id,
            kind = ?kind,
            error = %e,
            "Failed to deliver notification"
        );
    }
}
