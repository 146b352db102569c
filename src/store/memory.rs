//! In-process store for tests and local demos
//!
//! All state sits behind one `RwLock`, so every trait method is atomic with
//! respect to the others, matching the conditional-update semantics of
//! `PgStore`.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    BartrRepository, ListingRepository, MessageRepository, NotificationRepository,
    ReviewRepository, StoreHealth, UserRepository,
};
use crate::bartr::{Bartr, BartrStatus, Party};
use crate::listing::{Listing, ListingFilter, ListingStatus};
use crate::messaging::Message;
use crate::models::{Profile, User, UserSummary};
use crate::notification::Notification;
use crate::review::Review;

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    profiles: HashMap<Uuid, Profile>,
    listings: HashMap<Uuid, Listing>,
    bartrs: HashMap<Uuid, Bartr>,
    messages: Vec<Message>,
    notifications: Vec<Notification>,
    reviews: Vec<Review>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Users come from the identity provider in production
    pub async fn insert_user(&self, user: User) -> User {
        self.inner.write().await.users.insert(user.id, user.clone());
        user
    }

    pub async fn insert_profile(&self, profile: Profile) -> Profile {
        self.inner
            .write()
            .await
            .profiles
            .insert(profile.user_id, profile.clone());
        profile
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        Ok(self.inner.read().await.profiles.get(&user_id).cloned())
    }

    async fn find_user_summaries(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| inner.users.get(id))
            .map(UserSummary::from)
            .collect())
    }
}

#[async_trait]
impl ListingRepository for MemoryStore {
    async fn insert_listing(&self, listing: Listing) -> Result<Listing> {
        let mut inner = self.inner.write().await;
        inner.listings.insert(listing.id, listing.clone());
        Ok(listing)
    }

    async fn find_listing(&self, id: Uuid) -> Result<Option<Listing>> {
        Ok(self.inner.read().await.listings.get(&id).cloned())
    }

    async fn find_listings(&self, filter: &ListingFilter) -> Result<Vec<Listing>> {
        let inner = self.inner.read().await;
        let mut listings: Vec<Listing> = inner
            .listings
            .values()
            .filter(|listing| filter.matches(listing))
            .cloned()
            .collect();
        listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(listings)
    }

    async fn update_listing(&self, listing: &Listing) -> Result<Option<Listing>> {
        let mut inner = self.inner.write().await;
        let Some(stored) = inner.listings.get_mut(&listing.id) else {
            return Ok(None);
        };
        if stored.status.is_locked() {
            return Ok(None);
        }

        stored.title = listing.title.clone();
        stored.description = listing.description.clone();
        stored.category = listing.category.clone();
        stored.condition = listing.condition.clone();
        stored.listing_type = listing.listing_type;
        stored.swap_preferences = listing.swap_preferences.clone();
        stored.image_url = listing.image_url.clone();
        stored.status = listing.status;
        stored.updated_at = Utc::now();
        Ok(Some(stored.clone()))
    }
}

#[async_trait]
impl BartrRepository for MemoryStore {
    async fn insert_bartr(&self, bartr: Bartr) -> Result<Bartr> {
        let mut inner = self.inner.write().await;
        inner.bartrs.insert(bartr.id, bartr.clone());
        Ok(bartr)
    }

    async fn find_bartr(&self, id: Uuid) -> Result<Option<Bartr>> {
        Ok(self.inner.read().await.bartrs.get(&id).cloned())
    }

    async fn find_bartrs_for_user(&self, user_id: Uuid) -> Result<Vec<Bartr>> {
        let inner = self.inner.read().await;
        let mut bartrs: Vec<Bartr> = inner
            .bartrs
            .values()
            .filter(|bartr| bartr.is_party(user_id))
            .cloned()
            .collect();
        bartrs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bartrs)
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: BartrStatus,
        to: BartrStatus,
    ) -> Result<Option<Bartr>> {
        let mut inner = self.inner.write().await;
        match inner.bartrs.get_mut(&id) {
            Some(bartr) if bartr.status == from => {
                bartr.status = to;
                bartr.updated_at = Utc::now();
                Ok(Some(bartr.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn decline_competing(
        &self,
        listing_ids: &[Uuid],
        accepted_id: Uuid,
    ) -> Result<Vec<Bartr>> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let declined = inner
            .bartrs
            .values_mut()
            .filter(|b| {
                b.id != accepted_id
                    && b.status == BartrStatus::Pending
                    && b.listing_ids().iter().any(|id| listing_ids.contains(id))
            })
            .map(|bartr| {
                bartr.status = BartrStatus::Declined;
                bartr.updated_at = now;
                bartr.clone()
            })
            .collect();
        Ok(declined)
    }

    async fn set_confirmation(&self, id: Uuid, party: Party) -> Result<Option<Bartr>> {
        let mut inner = self.inner.write().await;
        match inner.bartrs.get_mut(&id) {
            Some(bartr) if bartr.status == BartrStatus::Accepted => {
                match party {
                    Party::Initiator => bartr.initiator_confirmed = true,
                    Party::Receiver => bartr.receiver_confirmed = true,
                }
                bartr.updated_at = Utc::now();
                Ok(Some(bartr.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn reset_confirmations(&self, id: Uuid) -> Result<Option<Bartr>> {
        let mut inner = self.inner.write().await;
        match inner.bartrs.get_mut(&id) {
            Some(bartr) => {
                bartr.initiator_confirmed = false;
                bartr.receiver_confirmed = false;
                bartr.updated_at = Utc::now();
                Ok(Some(bartr.clone()))
            }
            None => Ok(None),
        }
    }

    async fn complete_bartr(&self, id: Uuid) -> Result<Option<Bartr>> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();

        let listing_ids = match inner.bartrs.get(&id) {
            Some(bartr) if bartr.status == BartrStatus::Accepted && bartr.both_confirmed() => {
                bartr.listing_ids()
            }
            _ => return Ok(None),
        };
        let all_active = listing_ids.iter().all(|listing_id| {
            inner
                .listings
                .get(listing_id)
                .is_some_and(|listing| listing.status == ListingStatus::Active)
        });
        if !all_active {
            return Ok(None);
        }

        for listing_id in &listing_ids {
            if let Some(listing) = inner.listings.get_mut(listing_id) {
                listing.status = ListingStatus::Traded;
                listing.updated_at = now;
            }
        }
        let bartr = match inner.bartrs.get_mut(&id) {
            Some(bartr) => {
                bartr.status = BartrStatus::Completed;
                bartr.completed_at = Some(now);
                bartr.updated_at = now;
                bartr.clone()
            }
            None => return Ok(None),
        };
        for user_id in [bartr.initiator_id, bartr.receiver_id] {
            if let Some(user) = inner.users.get_mut(&user_id) {
                user.bartr_count += 1;
                user.updated_at = now;
            }
        }

        Ok(Some(bartr))
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn append_message(&self, mut message: Message) -> Result<Message> {
        let mut inner = self.inner.write().await;

        // Keep created_at non-decreasing within a conversation
        if let Some(last) = inner
            .messages
            .iter()
            .filter(|m| m.bartr_id == message.bartr_id)
            .map(|m| m.created_at)
            .max()
        {
            if message.created_at < last {
                message.created_at = last;
            }
        }

        if let Some(bartr) = inner.bartrs.get_mut(&message.bartr_id) {
            bartr.updated_at = message.created_at.max(bartr.updated_at);
        }
        inner.messages.push(message.clone());
        Ok(message)
    }

    async fn find_messages(&self, bartr_id: Uuid) -> Result<Vec<Message>> {
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .iter()
            .filter(|m| m.bartr_id == bartr_id)
            .cloned()
            .collect())
    }

    async fn latest_message(&self, bartr_id: Uuid) -> Result<Option<Message>> {
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .iter()
            .rev()
            .find(|m| m.bartr_id == bartr_id)
            .cloned())
    }

    async fn latest_control_message(&self, bartr_id: Uuid) -> Result<Option<Message>> {
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .iter()
            .rev()
            .find(|m| m.bartr_id == bartr_id && m.message_type.is_control())
            .cloned())
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn insert_notification(&self, notification: Notification) -> Result<Notification> {
        let mut inner = self.inner.write().await;
        inner.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn find_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
    ) -> Result<Vec<Notification>> {
        let inner = self.inner.read().await;
        Ok(inner
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id && !(unread_only && n.read))
            .cloned()
            .collect())
    }

    async fn mark_notification_read(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Notification>> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
            .map(|n| {
                n.read = true;
                n.clone()
            }))
    }
}

#[async_trait]
impl ReviewRepository for MemoryStore {
    async fn insert_review(&self, review: Review) -> Result<Option<Review>> {
        let mut inner = self.inner.write().await;
        let duplicate = inner
            .reviews
            .iter()
            .any(|r| r.reviewer_id == review.reviewer_id && r.bartr_id == review.bartr_id);
        if duplicate {
            return Ok(None);
        }
        inner.reviews.push(review.clone());
        Ok(Some(review))
    }

    async fn find_reviews_for_user(&self, reviewee_id: Uuid) -> Result<Vec<Review>> {
        let inner = self.inner.read().await;
        Ok(inner
            .reviews
            .iter()
            .rev()
            .filter(|r| r.reviewee_id == reviewee_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
