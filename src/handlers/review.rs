//! Review handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiResult;
use crate::middleware::AuthenticatedUser;
use crate::review::{CreateReviewRequest, Review, ReviewService};

/// POST /bartrs/:id/reviews
pub async fn create_review(
    State(reviews): State<Arc<ReviewService>>,
    user: AuthenticatedUser,
    Path(bartr_id): Path<Uuid>,
    Json(request): Json<CreateReviewRequest>,
) -> ApiResult<(StatusCode, Json<Review>)> {
    user.ensure_can_trade()?;
    request.validate()?;

    let review = reviews.create(bartr_id, user.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// GET /users/:id/reviews
pub async fn list_user_reviews(
    State(reviews): State<Arc<ReviewService>>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Review>>> {
    Ok(Json(reviews.for_user(user_id).await?))
}
