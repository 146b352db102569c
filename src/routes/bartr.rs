//! Bartr and conversation route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::app_state::AppState;
use crate::handlers::*;

pub fn bartr_routes() -> Router<AppState> {
    Router::new()
        .route("/bartrs", post(propose_bartr).get(list_bartrs))
        .route("/bartrs/:id", get(get_bartr))
        .route("/bartrs/:id/accept", post(accept_bartr))
        .route("/bartrs/:id/decline", post(decline_bartr))
        .route("/bartrs/:id/cancel", post(cancel_bartr))
        .route("/bartrs/:id/complete", post(complete_bartr))
        .route("/bartrs/:id/messages", get(list_messages).post(post_message))
        .route("/bartrs/:id/close-deal", post(respond_to_close_deal))
        .route("/bartrs/:id/reviews", post(create_review))
}
