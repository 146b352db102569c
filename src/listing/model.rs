//! Listing models

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::UserSummary;

/// Listing model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub condition: String,
    pub listing_type: ListingType,
    pub swap_preferences: Option<String>,
    pub image_url: Option<String>,
    pub user_id: Uuid, // owner, immutable after creation
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "listing_type", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ListingType {
    Barter,
    Donation,
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "listing_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ListingStatus {
    Active,
    Inactive, // logically deleted
    Completed,
    Traded,
}

impl ListingStatus {
    /// Traded and completed listings can no longer be edited or deleted
    pub fn is_locked(&self) -> bool {
        matches!(self, ListingStatus::Traded | ListingStatus::Completed)
    }
}

/// Listing fields embedded in bartr responses
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ListingSummary {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub condition: String,
    pub image_url: Option<String>,
    pub status: ListingStatus,
}

impl From<&Listing> for ListingSummary {
    fn from(listing: &Listing) -> Self {
        Self {
            id: listing.id,
            title: listing.title.clone(),
            description: listing.description.clone(),
            category: listing.category.clone(),
            condition: listing.condition.clone(),
            image_url: listing.image_url.clone(),
            status: listing.status,
        }
    }
}

/// Listing with its owner, as returned by the browse endpoints
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ListingWithOwner {
    #[serde(flatten)]
    pub listing: Listing,
    pub user: Option<UserSummary>,
}

/// Request DTO for creating a listing
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateListingRequest {
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    #[validate(length(min = 1, max = 5000))]
    pub description: String,
    #[validate(length(min = 1, max = 60))]
    pub category: String,
    #[validate(length(min = 1, max = 60))]
    pub condition: String,
    pub listing_type: ListingType,
    #[validate(length(max = 1000))]
    pub swap_preferences: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
}

/// Request DTO for editing a listing
///
/// Required fields are replaced wholesale. For `swapPreferences` and
/// `imageUrl`, an absent field keeps the current value, a blank one clears it
/// and anything else replaces it.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateListingRequest {
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    #[validate(length(min = 1, max = 5000))]
    pub description: String,
    #[validate(length(min = 1, max = 60))]
    pub category: String,
    #[validate(length(min = 1, max = 60))]
    pub condition: String,
    pub listing_type: ListingType,
    #[validate(length(max = 1000))]
    pub swap_preferences: Option<String>,
    #[validate(custom = "clearable_url")]
    pub image_url: Option<String>,
}

/// A URL, or blank to clear the image
fn clearable_url(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() || validator::validate_url(value) {
        Ok(())
    } else {
        Err(ValidationError::new("url"))
    }
}

/// Query parameters for browsing listings
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ListingFilter {
    pub category: Option<String>,
    pub search: Option<String>,
}

impl ListingFilter {
    /// Category to filter on; "All" and blank mean no filter
    pub fn category(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("all"))
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// In-process evaluation of the filter (ACTIVE listings only)
    pub fn matches(&self, listing: &Listing) -> bool {
        if listing.status != ListingStatus::Active {
            return false;
        }
        if let Some(category) = self.category() {
            if listing.category != category {
                return false;
            }
        }
        if let Some(search) = self.search() {
            let needle = search.to_lowercase();
            return listing.title.to_lowercase().contains(&needle)
                || listing.description.to_lowercase().contains(&needle);
        }
        true
    }
}

/// Blank optional strings are stored as absent
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Edit of an optional field: absent keeps `current`, blank clears it
pub(crate) fn patch_optional(current: Option<String>, incoming: Option<String>) -> Option<String> {
    match incoming {
        None => current,
        Some(value) => non_blank(Some(value)),
    }
}
