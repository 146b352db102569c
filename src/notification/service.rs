//! Notification inbox service

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::notification::Notification;
use crate::store::MarketStore;

pub struct NotificationService {
    store: Arc<dyn MarketStore>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    /// Caller's notifications, newest first
    pub async fn list(&self, user_id: Uuid, unread_only: bool) -> DomainResult<Vec<Notification>> {
        Ok(self.store.find_notifications(user_id, unread_only).await?)
    }

    pub async fn mark_read(&self, user_id: Uuid, id: Uuid) -> DomainResult<Notification> {
        self.store
            .mark_notification_read(id, user_id)
            .await?
            .ok_or_else(|| DomainError::NotFound("Notification".to_string()))
    }
}
