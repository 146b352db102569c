//! Listing handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiResult;
use crate::listing::{
    CreateListingRequest, Listing, ListingFilter, ListingService, ListingWithOwner,
    UpdateListingRequest,
};
use crate::middleware::AuthenticatedUser;

/// POST /listings
pub async fn create_listing(
    State(listings): State<Arc<ListingService>>,
    user: AuthenticatedUser,
    Json(request): Json<CreateListingRequest>,
) -> ApiResult<(StatusCode, Json<Listing>)> {
    user.ensure_can_trade()?;
    request.validate()?;

    let listing = listings.create(user.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(listing)))
}

/// GET /listings?category=&search=
pub async fn list_listings(
    State(listings): State<Arc<ListingService>>,
    Query(filter): Query<ListingFilter>,
) -> ApiResult<Json<Vec<ListingWithOwner>>> {
    Ok(Json(listings.browse(&filter).await?))
}

/// GET /listings/:id
pub async fn get_listing(
    State(listings): State<Arc<ListingService>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ListingWithOwner>> {
    Ok(Json(listings.get(id).await?))
}

/// PATCH /listings/:id
pub async fn update_listing(
    State(listings): State<Arc<ListingService>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateListingRequest>,
) -> ApiResult<Json<Listing>> {
    user.ensure_can_trade()?;
    request.validate()?;

    Ok(Json(listings.update(user.user_id, id, request).await?))
}

/// DELETE /listings/:id (logical delete)
pub async fn delete_listing(
    State(listings): State<Arc<ListingService>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Listing>> {
    user.ensure_can_trade()?;

    Ok(Json(listings.deactivate(user.user_id, id).await?))
}
