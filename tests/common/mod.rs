//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use bartr_server::bartr::BartrService;
use bartr_server::listing::{Listing, ListingStatus, ListingType};
use bartr_server::messaging::ConversationService;
use bartr_server::models::{User, UserRole};
use bartr_server::notification::{NotificationSink, StoreNotificationSink};
use bartr_server::review::ReviewService;
use bartr_server::store::{ListingRepository, MarketStore, MemoryStore};

/// Services wired against one in-memory store
pub struct Market {
    pub store: Arc<MemoryStore>,
    pub bartrs: Arc<BartrService>,
    pub conversations: ConversationService,
    pub reviews: ReviewService,
}

impl Market {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let notifier: Arc<dyn NotificationSink> =
            Arc::new(StoreNotificationSink::new(store.clone()));
        Self::with_notifier(store, notifier)
    }

    pub fn with_notifier(store: Arc<MemoryStore>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self::build(store, notifier, true)
    }

    /// Accepting a proposal leaves competing ones PENDING
    pub fn without_auto_decline() -> Self {
        let store = Arc::new(MemoryStore::new());
        let notifier: Arc<dyn NotificationSink> =
            Arc::new(StoreNotificationSink::new(store.clone()));
        Self::build(store, notifier, false)
    }

    fn build(
        store: Arc<MemoryStore>,
        notifier: Arc<dyn NotificationSink>,
        auto_decline_competing: bool,
    ) -> Self {
        let dyn_store: Arc<dyn MarketStore> = store.clone();
        let bartrs = Arc::new(
            BartrService::new(dyn_store.clone(), notifier)
                .with_auto_decline(auto_decline_competing),
        );

        Self {
            conversations: ConversationService::new(dyn_store.clone(), bartrs.clone()),
            reviews: ReviewService::new(dyn_store),
            bartrs,
            store,
        }
    }

    pub async fn user(&self, name: &str) -> User {
        self.user_with_role(name, UserRole::User).await
    }

    pub async fn user_with_role(&self, name: &str, role: UserRole) -> User {
        let now = Utc::now();
        self.store
            .insert_user(User {
                id: Uuid::new_v4(),
                name: Some(name.to_string()),
                email: format!("{}@example.com", name.to_lowercase()),
                email_verified: true,
                image: None,
                role,
                bartr_count: 0,
                created_at: now,
                updated_at: now,
            })
            .await
    }

    pub async fn listing(&self, owner: &User, title: &str) -> Listing {
        let now = Utc::now();
        self.store
            .insert_listing(Listing {
                id: Uuid::new_v4(),
                title: title.to_string(),
                description: format!("{} in good shape", title),
                category: "General".to_string(),
                condition: "Good".to_string(),
                listing_type: ListingType::Barter,
                swap_preferences: None,
                image_url: None,
                user_id: owner.id,
                status: ListingStatus::Active,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap()
    }
}
