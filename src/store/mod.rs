//! Persistence ports for the marketplace
//!
//! Services depend on these traits only. `PgStore` is the production
//! implementation; `MemoryStore` backs tests and local demos. Conditional
//! updates return `Ok(None)` when the row exists but is not in the state the
//! update requires, so callers can tell a lost race from a missing row.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::bartr::{Bartr, BartrStatus, Party};
use crate::listing::{Listing, ListingFilter};
use crate::messaging::Message;
use crate::models::{Profile, User, UserSummary};
use crate::notification::Notification;
use crate::review::Review;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>>;

    async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>>;

    /// Summaries for the given ids; unknown ids are skipped
    async fn find_user_summaries(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>>;
}

#[async_trait]
pub trait ListingRepository: Send + Sync {
    async fn insert_listing(&self, listing: Listing) -> Result<Listing>;

    async fn find_listing(&self, id: Uuid) -> Result<Option<Listing>>;

    /// ACTIVE listings matching the filter, newest first
    async fn find_listings(&self, filter: &ListingFilter) -> Result<Vec<Listing>>;

    /// Persist editable fields and status unless the stored listing is
    /// TRADED or COMPLETED.
    async fn update_listing(&self, listing: &Listing) -> Result<Option<Listing>>;
}

#[async_trait]
pub trait BartrRepository: Send + Sync {
    async fn insert_bartr(&self, bartr: Bartr) -> Result<Bartr>;

    async fn find_bartr(&self, id: Uuid) -> Result<Option<Bartr>>;

    /// Bartrs the user is a party to, newest first
    async fn find_bartrs_for_user(&self, user_id: Uuid) -> Result<Vec<Bartr>>;

    /// Move `id` from `from` to `to`; `None` if it is no longer in `from`
    async fn transition_status(
        &self,
        id: Uuid,
        from: BartrStatus,
        to: BartrStatus,
    ) -> Result<Option<Bartr>>;

    /// Decline every other PENDING bartr that requests or offers one of
    /// `listing_ids`, returning them
    async fn decline_competing(&self, listing_ids: &[Uuid], accepted_id: Uuid)
        -> Result<Vec<Bartr>>;

    /// Set one party's confirmation flag while the bartr is ACCEPTED
    async fn set_confirmation(&self, id: Uuid, party: Party) -> Result<Option<Bartr>>;

    /// Clear both flags in any status; status and `completed_at` are kept
    async fn reset_confirmations(&self, id: Uuid) -> Result<Option<Bartr>>;

    /// Run the completion side effects as one unit: status COMPLETED with
    /// `completed_at`, both listings TRADED, both parties' `bartr_count`
    /// incremented. Applies only while the bartr is ACCEPTED with both flags
    /// set and every listing it trades is still ACTIVE, so concurrent confirms
    /// complete it exactly once and no listing is traded twice.
    async fn complete_bartr(&self, id: Uuid) -> Result<Option<Bartr>>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Append a message and bump the parent bartr's `updated_at`. Neither
    /// the message timestamps of a bartr nor its `updated_at` ever decrease.
    async fn append_message(&self, message: Message) -> Result<Message>;

    /// Messages of a bartr, oldest first
    async fn find_messages(&self, bartr_id: Uuid) -> Result<Vec<Message>>;

    async fn latest_message(&self, bartr_id: Uuid) -> Result<Option<Message>>;

    /// Most recent CLOSE_DEAL_* message of a bartr
    async fn latest_control_message(&self, bartr_id: Uuid) -> Result<Option<Message>>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert_notification(&self, notification: Notification) -> Result<Notification>;

    /// Notifications addressed to the user, newest first
    async fn find_notifications(&self, user_id: Uuid, unread_only: bool)
        -> Result<Vec<Notification>>;

    /// Mark read; `None` if no such notification belongs to the user
    async fn mark_notification_read(&self, id: Uuid, user_id: Uuid)
        -> Result<Option<Notification>>;
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Insert unless (reviewer, bartr) already has a review
    async fn insert_review(&self, review: Review) -> Result<Option<Review>>;

    /// Reviews received by the user, newest first
    async fn find_reviews_for_user(&self, reviewee_id: Uuid) -> Result<Vec<Review>>;
}

#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self) -> Result<()>;
}

/// Everything the services need from persistence
pub trait MarketStore:
    UserRepository
    + ListingRepository
    + BartrRepository
    + MessageRepository
    + NotificationRepository
    + ReviewRepository
    + StoreHealth
{
}

impl<T> MarketStore for T where
    T: UserRepository
        + ListingRepository
        + BartrRepository
        + MessageRepository
        + NotificationRepository
        + ReviewRepository
        + StoreHealth
{
}
