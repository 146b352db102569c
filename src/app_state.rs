//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::SessionVerifier;
use crate::bartr::BartrService;
use crate::listing::ListingService;
use crate::messaging::ConversationService;
use crate::notification::{NotificationService, NotificationSink};
use crate::review::ReviewService;
use crate::store::MarketStore;
use crate::websocket::WsState;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MarketStore>,
    pub bartr_service: Arc<BartrService>,
    pub conversation_service: Arc<ConversationService>,
    pub listing_service: Arc<ListingService>,
    pub notification_service: Arc<NotificationService>,
    pub review_service: Arc<ReviewService>,
    pub sessions: Arc<SessionVerifier>,
    pub ws_state: WsState,
}

impl AppState {
    /// Wire every service against one store
    pub fn new(
        store: Arc<dyn MarketStore>,
        notifier: Arc<dyn NotificationSink>,
        sessions: Arc<SessionVerifier>,
        auto_decline_competing: bool,
    ) -> Self {
        let bartr_service = Arc::new(
            BartrService::new(store.clone(), notifier).with_auto_decline(auto_decline_competing),
        );

        Self {
            conversation_service: Arc::new(ConversationService::new(
                store.clone(),
                bartr_service.clone(),
            )),
            listing_service: Arc::new(ListingService::new(store.clone())),
            notification_service: Arc::new(NotificationService::new(store.clone())),
            review_service: Arc::new(ReviewService::new(store.clone())),
            bartr_service,
            store,
            sessions,
            ws_state: WsState::new(),
        }
    }
}

impl FromRef<AppState> for WsState {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.ws_state.clone()
    }
}

impl FromRef<AppState> for Arc<SessionVerifier> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for Arc<dyn MarketStore> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.store.clone()
    }
}

impl FromRef<AppState> for Arc<ListingService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.listing_service.clone()
    }
}

impl FromRef<AppState> for Arc<NotificationService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.notification_service.clone()
    }
}

impl FromRef<AppState> for Arc<ReviewService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.review_service.clone()
    }
}
