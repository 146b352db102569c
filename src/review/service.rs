//! Review service layer

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::bartr::BartrStatus;
use crate::error::{DomainError, DomainResult};
use crate::review::{CreateReviewRequest, Review};
use crate::store::MarketStore;

pub struct ReviewService {
    store: Arc<dyn MarketStore>,
}

impl ReviewService {
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    /// Review the other party of a completed bartr, once per reviewer
    pub async fn create(
        &self,
        bartr_id: Uuid,
        reviewer_id: Uuid,
        request: CreateReviewRequest,
    ) -> DomainResult<Review> {
        let bartr = self
            .store
            .find_bartr(bartr_id)
            .await?
            .ok_or_else(|| DomainError::NotFound("Bartr".to_string()))?;

        if !bartr.is_party(reviewer_id) {
            return Err(DomainError::PermissionDenied(
                "Only the parties of a bartr can review it".to_string(),
            ));
        }
        if bartr.status != BartrStatus::Completed {
            return Err(DomainError::InvalidOperation(
                "Only completed bartrs can be reviewed".to_string(),
            ));
        }

        let review = Review {
            id: Uuid::new_v4(),
            reviewer_id,
            reviewee_id: bartr.counterpart_of(reviewer_id),
            bartr_id,
            rating: request.rating,
            comment: request
                .comment
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            created_at: Utc::now(),
        };

        let review = self.store.insert_review(review).await?.ok_or_else(|| {
            DomainError::Conflict("You have already reviewed this bartr".to_string())
        })?;

        tracing::info!(
            bartr_id = %bartr_id,
            user_id = %reviewer_id,
            rating = review.rating,
            "Review created"
        );
        Ok(review)
    }

    pub async fn for_user(&self, reviewee_id: Uuid) -> DomainResult<Vec<Review>> {
        Ok(self.store.find_reviews_for_user(reviewee_id).await?)
    }
}
