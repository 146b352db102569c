//! BARTR server library
//!
//! A peer-to-peer bartering marketplace: listings, trade proposals
//! ("bartrs") with a two-party confirmation lifecycle, per-trade chat,
//! notifications and reviews.

pub mod app_state;
pub mod auth;
pub mod bartr;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod listing;
pub mod messaging;
pub mod middleware;
pub mod models;
pub mod notification;
pub mod review;
pub mod routes;
pub mod store;
pub mod websocket;

pub use app_state::AppState;
pub use routes::api_router;
