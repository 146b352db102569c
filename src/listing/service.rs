//! Listing service layer - CRUD for tradeable items

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::listing::model::{non_blank, patch_optional};
use crate::listing::{
    CreateListingRequest, Listing, ListingFilter, ListingStatus, ListingWithOwner,
    UpdateListingRequest,
};
use crate::store::MarketStore;

pub struct ListingService {
    store: Arc<dyn MarketStore>,
}

impl ListingService {
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    /// Create an ACTIVE listing owned by the caller
    pub async fn create(&self, owner_id: Uuid, request: CreateListingRequest) -> DomainResult<Listing> {
        let now = Utc::now();
        let listing = Listing {
            id: Uuid::new_v4(),
            title: request.title.trim().to_string(),
            description: request.description.trim().to_string(),
            category: request.category.trim().to_string(),
            condition: request.condition.trim().to_string(),
            listing_type: request.listing_type,
            swap_preferences: non_blank(request.swap_preferences),
            image_url: non_blank(request.image_url),
            user_id: owner_id,
            status: ListingStatus::Active,
            created_at: now,
            updated_at: now,
        };

        let listing = self.store.insert_listing(listing).await?;
        tracing::info!(listing_id = %listing.id, user_id = %owner_id, "Listing created");
        Ok(listing)
    }

    /// Browse ACTIVE listings, newest first, with owner summaries
    pub async fn browse(&self, filter: &ListingFilter) -> DomainResult<Vec<ListingWithOwner>> {
        let listings = self.store.find_listings(filter).await?;

        let mut owner_ids: Vec<Uuid> = listings.iter().map(|l| l.user_id).collect();
        owner_ids.sort_unstable();
        owner_ids.dedup();

        let owners: HashMap<Uuid, _> = self
            .store
            .find_user_summaries(&owner_ids)
            .await?
            .into_iter()
            .map(|summary| (summary.id, summary))
            .collect();

        Ok(listings
            .into_iter()
            .map(|listing| ListingWithOwner {
                user: owners.get(&listing.user_id).cloned(),
                listing,
            })
            .collect())
    }

    pub async fn get(&self, id: Uuid) -> DomainResult<ListingWithOwner> {
        let listing = self.find(id).await?;
        let user = self
            .store
            .find_user_summaries(&[listing.user_id])
            .await?
            .into_iter()
            .next();

        Ok(ListingWithOwner { listing, user })
    }

    /// Edit the caller's listing; optional fields left out of the request
    /// keep their current value
    pub async fn update(
        &self,
        owner_id: Uuid,
        id: Uuid,
        request: UpdateListingRequest,
    ) -> DomainResult<Listing> {
        let mut listing = self.owned_mutable(owner_id, id).await?;

        listing.title = request.title.trim().to_string();
        listing.description = request.description.trim().to_string();
        listing.category = request.category.trim().to_string();
        listing.condition = request.condition.trim().to_string();
        listing.listing_type = request.listing_type;
        listing.swap_preferences =
            patch_optional(listing.swap_preferences.take(), request.swap_preferences);
        listing.image_url = patch_optional(listing.image_url.take(), request.image_url);

        self.persist(listing).await
    }

    /// Logical delete: the listing goes INACTIVE and stays referenced by
    /// past bartrs
    pub async fn deactivate(&self, owner_id: Uuid, id: Uuid) -> DomainResult<Listing> {
        let mut listing = self.owned_mutable(owner_id, id).await?;
        listing.status = ListingStatus::Inactive;

        let listing = self.persist(listing).await?;
        tracing::info!(listing_id = %listing.id, user_id = %owner_id, "Listing deactivated");
        Ok(listing)
    }

    async fn find(&self, id: Uuid) -> DomainResult<Listing> {
        self.store
            .find_listing(id)
            .await?
            .ok_or_else(|| DomainError::NotFound("Listing".to_string()))
    }

    async fn owned_mutable(&self, owner_id: Uuid, id: Uuid) -> DomainResult<Listing> {
        let listing = self.find(id).await?;
        if listing.user_id != owner_id {
            return Err(DomainError::PermissionDenied(
                "Only the owner can modify this listing".to_string(),
            ));
        }
        if listing.status.is_locked() {
            return Err(DomainError::InvalidOperation(format!(
                "Cannot modify a listing that has been {}",
                if listing.status == ListingStatus::Traded { "traded" } else { "completed" }
            )));
        }
        Ok(listing)
    }

    /// Write back, treating a concurrent lock (traded meanwhile) as a
    /// precondition failure
    async fn persist(&self, listing: Listing) -> DomainResult<Listing> {
        self.store.update_listing(&listing).await?.ok_or_else(|| {
            DomainError::InvalidOperation("Cannot modify a listing that has been traded".to_string())
        })
    }
}
