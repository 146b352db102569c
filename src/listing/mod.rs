//! Listing domain module
//!
//! Listings are owned by their creators; the trade engine only flips them to
//! TRADED through the same store.

mod model;
mod service;

pub use model::*;
pub use service::ListingService;
