//! Route definitions for the BARTR API

mod bartr;
mod listing;
mod notification;
mod user;

pub use bartr::bartr_routes;
pub use listing::listing_routes;
pub use notification::notification_routes;
pub use user::user_routes;

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::handlers::health_check;
use crate::middleware;
use crate::websocket;

/// Full API router with its middleware stack; CORS is added by the binary
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/ws", get(websocket::ws_handler))
        .merge(bartr_routes())
        .merge(listing_routes())
        .merge(notification_routes())
        .merge(user_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn(middleware::request_tracing))
                .layer(axum::middleware::from_fn(middleware::security_headers)),
        )
}

async fn root() -> &'static str {
    "BARTR API Server"
}
