//! PostgreSQL implementation of the persistence ports

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    BartrRepository, ListingRepository, MessageRepository, NotificationRepository,
    ReviewRepository, StoreHealth, UserRepository,
};
use crate::bartr::{Bartr, BartrStatus, Party};
use crate::db;
use crate::listing::{Listing, ListingFilter};
use crate::messaging::Message;
use crate::models::{Profile, User, UserSummary};
use crate::notification::Notification;
use crate::review::Review;

/// Store backed by a PostgreSQL pool created once at start-up
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Escape LIKE wildcards in user input
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl UserRepository for PgStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load user")?;

        Ok(user)
    }

    async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load profile")?;

        Ok(profile)
    }

    async fn find_user_summaries(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>> {
        let users =
            sqlx::query_as::<_, UserSummary>("SELECT id, name, image FROM users WHERE id = ANY($1)")
                .bind(ids)
                .fetch_all(&self.pool)
                .await
                .context("Failed to load user summaries")?;

        Ok(users)
    }
}

#[async_trait]
impl ListingRepository for PgStore {
    async fn insert_listing(&self, listing: Listing) -> Result<Listing> {
        let listing = sqlx::query_as::<_, Listing>(
            r#"
            INSERT INTO listings (
                id, title, description, category, condition, listing_type,
                swap_preferences, image_url, user_id, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(listing.id)
        .bind(&listing.title)
        .bind(&listing.description)
        .bind(&listing.category)
        .bind(&listing.condition)
        .bind(listing.listing_type)
        .bind(&listing.swap_preferences)
        .bind(&listing.image_url)
        .bind(listing.user_id)
        .bind(listing.status)
        .bind(listing.created_at)
        .bind(listing.updated_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert listing")?;

        Ok(listing)
    }

    async fn find_listing(&self, id: Uuid) -> Result<Option<Listing>> {
        let listing = sqlx::query_as::<_, Listing>("SELECT * FROM listings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load listing")?;

        Ok(listing)
    }

    async fn find_listings(&self, filter: &ListingFilter) -> Result<Vec<Listing>> {
        let mut query_builder: sqlx::QueryBuilder<sqlx::Postgres> =
            sqlx::QueryBuilder::new("SELECT * FROM listings WHERE status = 'ACTIVE'");

        if let Some(category) = filter.category() {
            query_builder.push(" AND category = ");
            query_builder.push_bind(category.to_string());
        }
        if let Some(search) = filter.search() {
            let pattern = like_pattern(search);
            query_builder.push(" AND (title ILIKE ");
            query_builder.push_bind(pattern.clone());
            query_builder.push(" OR description ILIKE ");
            query_builder.push_bind(pattern);
            query_builder.push(")");
        }

        query_builder.push(" ORDER BY created_at DESC");

        let listings = query_builder
            .build_query_as::<Listing>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list listings")?;

        Ok(listings)
    }

    async fn update_listing(&self, listing: &Listing) -> Result<Option<Listing>> {
        let updated = sqlx::query_as::<_, Listing>(
            r#"
            UPDATE listings
            SET title = $2, description = $3, category = $4, condition = $5,
                listing_type = $6, swap_preferences = $7, image_url = $8,
                status = $9, updated_at = $10
            WHERE id = $1 AND status NOT IN ('TRADED', 'COMPLETED')
            RETURNING *
            "#,
        )
        .bind(listing.id)
        .bind(&listing.title)
        .bind(&listing.description)
        .bind(&listing.category)
        .bind(&listing.condition)
        .bind(listing.listing_type)
        .bind(&listing.swap_preferences)
        .bind(&listing.image_url)
        .bind(listing.status)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update listing")?;

        Ok(updated)
    }
}

#[async_trait]
impl BartrRepository for PgStore {
    async fn insert_bartr(&self, bartr: Bartr) -> Result<Bartr> {
        let bartr = sqlx::query_as::<_, Bartr>(
            r#"
            INSERT INTO bartrs (
                id, initiator_id, receiver_id, listing_id, offered_listing_id, status,
                message, initiator_confirmed, receiver_confirmed, completed_at,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(bartr.id)
        .bind(bartr.initiator_id)
        .bind(bartr.receiver_id)
        .bind(bartr.listing_id)
        .bind(bartr.offered_listing_id)
        .bind(bartr.status)
        .bind(&bartr.message)
        .bind(bartr.initiator_confirmed)
        .bind(bartr.receiver_confirmed)
        .bind(bartr.completed_at)
        .bind(bartr.created_at)
        .bind(bartr.updated_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert bartr")?;

        Ok(bartr)
    }

    async fn find_bartr(&self, id: Uuid) -> Result<Option<Bartr>> {
        let bartr = sqlx::query_as::<_, Bartr>("SELECT * FROM bartrs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load bartr")?;

        Ok(bartr)
    }

    async fn find_bartrs_for_user(&self, user_id: Uuid) -> Result<Vec<Bartr>> {
        let bartrs = sqlx::query_as::<_, Bartr>(
            r#"
            SELECT * FROM bartrs
            WHERE initiator_id = $1 OR receiver_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list bartrs")?;

        Ok(bartrs)
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: BartrStatus,
        to: BartrStatus,
    ) -> Result<Option<Bartr>> {
        let bartr = sqlx::query_as::<_, Bartr>(
            r#"
            UPDATE bartrs
            SET status = $3, updated_at = $4
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update bartr status")?;

        Ok(bartr)
    }

    async fn decline_competing(
        &self,
        listing_ids: &[Uuid],
        accepted_id: Uuid,
    ) -> Result<Vec<Bartr>> {
        let declined = sqlx::query_as::<_, Bartr>(
            r#"
            UPDATE bartrs
            SET status = 'DECLINED', updated_at = $3
            WHERE id <> $2
              AND status = 'PENDING'
              AND (listing_id = ANY($1) OR offered_listing_id = ANY($1))
            RETURNING *
            "#,
        )
        .bind(listing_ids)
        .bind(accepted_id)
        .bind(Utc::now())
        .fetch_all(&self.pool)
        .await
        .context("Failed to decline competing bartrs")?;

        Ok(declined)
    }

    async fn set_confirmation(&self, id: Uuid, party: Party) -> Result<Option<Bartr>> {
        let sql = match party {
            Party::Initiator => {
                r#"
                UPDATE bartrs SET initiator_confirmed = TRUE, updated_at = $2
                WHERE id = $1 AND status = 'ACCEPTED'
                RETURNING *
                "#
            }
            Party::Receiver => {
                r#"
                UPDATE bartrs SET receiver_confirmed = TRUE, updated_at = $2
                WHERE id = $1 AND status = 'ACCEPTED'
                RETURNING *
                "#
            }
        };

        let bartr = sqlx::query_as::<_, Bartr>(sql)
            .bind(id)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to set confirmation")?;

        Ok(bartr)
    }

    async fn reset_confirmations(&self, id: Uuid) -> Result<Option<Bartr>> {
        let bartr = sqlx::query_as::<_, Bartr>(
            r#"
            UPDATE bartrs
            SET initiator_confirmed = FALSE, receiver_confirmed = FALSE, updated_at = $2
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to reset confirmations")?;

        Ok(bartr)
    }

    async fn complete_bartr(&self, id: Uuid) -> Result<Option<Bartr>> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to open completion transaction")?;

        let completed = sqlx::query_as::<_, Bartr>(
            r#"
            UPDATE bartrs
            SET status = 'COMPLETED', completed_at = $2, updated_at = $2
            WHERE id = $1
              AND status = 'ACCEPTED'
              AND initiator_confirmed
              AND receiver_confirmed
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to mark bartr completed")?;

        let Some(bartr) = completed else {
            tx.rollback().await.ok();
            return Ok(None);
        };

        for listing_id in bartr.listing_ids() {
            let traded = sqlx::query(
                r#"
                UPDATE listings SET status = 'TRADED', updated_at = $2
                WHERE id = $1 AND status = 'ACTIVE'
                "#,
            )
            .bind(listing_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to mark listing traded")?;

            // Already traded in another bartr, or withdrawn
            if traded.rows_affected() != 1 {
                tx.rollback().await.ok();
                return Ok(None);
            }
        }

        for user_id in [bartr.initiator_id, bartr.receiver_id] {
            sqlx::query(
                "UPDATE users SET bartr_count = bartr_count + 1, updated_at = $2 WHERE id = $1",
            )
            .bind(user_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to increment bartr count")?;
        }

        tx.commit()
            .await
            .context("Failed to commit completion transaction")?;

        Ok(Some(bartr))
    }
}

#[async_trait]
impl MessageRepository for PgStore {
    async fn append_message(&self, message: Message) -> Result<Message> {
        let mut tx = self.pool.begin().await.context("Failed to open transaction")?;

        // Serialize appends per bartr so the clamp below sees the latest message
        sqlx::query("SELECT id FROM bartrs WHERE id = $1 FOR UPDATE")
            .bind(message.bartr_id)
            .execute(&mut *tx)
            .await
            .context("Failed to lock bartr")?;

        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (id, bartr_id, sender_id, content, message_type, created_at)
            VALUES (
                $1, $2, $3, $4, $5,
                GREATEST($6, COALESCE((SELECT MAX(created_at) FROM messages WHERE bartr_id = $2), $6))
            )
            RETURNING *
            "#,
        )
        .bind(message.id)
        .bind(message.bartr_id)
        .bind(message.sender_id)
        .bind(&message.content)
        .bind(message.message_type)
        .bind(message.created_at)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to insert message")?;

        sqlx::query("UPDATE bartrs SET updated_at = GREATEST(updated_at, $2) WHERE id = $1")
            .bind(message.bartr_id)
            .bind(message.created_at)
            .execute(&mut *tx)
            .await
            .context("Failed to touch bartr")?;

        tx.commit().await.context("Failed to commit message")?;

        Ok(message)
    }

    async fn find_messages(&self, bartr_id: Uuid) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE bartr_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(bartr_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load messages")?;

        Ok(messages)
    }

    async fn latest_message(&self, bartr_id: Uuid) -> Result<Option<Message>> {
        let message = sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE bartr_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(bartr_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load latest message")?;

        Ok(message)
    }

    async fn latest_control_message(&self, bartr_id: Uuid) -> Result<Option<Message>> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE bartr_id = $1 AND message_type <> 'TEXT'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(bartr_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load latest control message")?;

        Ok(message)
    }
}

#[async_trait]
impl NotificationRepository for PgStore {
    async fn insert_notification(&self, notification: Notification) -> Result<Notification> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (id, user_id, kind, title, message, read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(notification.kind)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.read)
        .bind(notification.created_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert notification")?;

        Ok(notification)
    }

    async fn find_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
    ) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR NOT read)
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list notifications")?;

        Ok(notifications)
    }

    async fn mark_notification_read(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Notification>> {
        let notification = sqlx::query_as::<_, Notification>(
            "UPDATE notifications SET read = TRUE WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to mark notification read")?;

        Ok(notification)
    }
}

#[async_trait]
impl ReviewRepository for PgStore {
    async fn insert_review(&self, review: Review) -> Result<Option<Review>> {
        let review = sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (id, reviewer_id, reviewee_id, bartr_id, rating, comment, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (reviewer_id, bartr_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(review.id)
        .bind(review.reviewer_id)
        .bind(review.reviewee_id)
        .bind(review.bartr_id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.created_at)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to insert review")?;

        Ok(review)
    }

    async fn find_reviews_for_user(&self, reviewee_id: Uuid) -> Result<Vec<Review>> {
        let reviews = sqlx::query_as::<_, Review>(
            "SELECT * FROM reviews WHERE reviewee_id = $1 ORDER BY created_at DESC",
        )
        .bind(reviewee_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list reviews")?;

        Ok(reviews)
    }
}

#[async_trait]
impl StoreHealth for PgStore {
    async fn ping(&self) -> Result<()> {
        db::check_health(&self.pool).await?;
        Ok(())
    }
}
