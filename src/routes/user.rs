//! User route definitions

use axum::{routing::get, Router};

use crate::app_state::AppState;
use crate::handlers::*;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/:id", get(get_user_profile))
        .route("/users/:id/reviews", get(list_user_reviews))
}
