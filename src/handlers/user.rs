//! User profile handlers

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult, DomainError};
use crate::models::UserProfile;
use crate::store::MarketStore;

/// GET /users/:id
pub async fn get_user_profile(
    State(store): State<Arc<dyn MarketStore>>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<UserProfile>> {
    let (user, profile) = tokio::try_join!(store.find_user(user_id), store.find_profile(user_id))
        .map_err(DomainError::from)?;
    let user = user.ok_or_else(|| ApiError::NotFound("User".to_string()))?;

    Ok(Json(UserProfile::new(user, profile)))
}
