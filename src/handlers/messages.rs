//! Conversation handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::app_state::AppState;
use crate::bartr::{BartrEvent, BartrEventKind};
use crate::error::ApiResult;
use crate::messaging::{
    CloseDealResponseRequest, MessagePosted, MessageWithSender, PostMessageRequest,
};
use crate::middleware::AuthenticatedUser;
use crate::websocket::WsState;

/// GET /bartrs/:id/messages
pub async fn list_messages(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<MessageWithSender>>> {
    let messages = app_state
        .conversation_service
        .list_messages(id, user.user_id)
        .await?;
    Ok(Json(messages))
}

/// POST /bartrs/:id/messages
pub async fn post_message(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<PostMessageRequest>,
) -> ApiResult<(StatusCode, Json<MessageWithSender>)> {
    user.ensure_can_trade()?;
    request.validate()?;

    let posted = app_state
        .conversation_service
        .post_message(id, user.user_id, request)
        .await?;

    publish_posted(&app_state.ws_state, &posted);

    Ok((StatusCode::CREATED, Json(posted.message)))
}

/// POST /bartrs/:id/close-deal
pub async fn respond_to_close_deal(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<CloseDealResponseRequest>,
) -> ApiResult<Json<MessagePosted>> {
    user.ensure_can_trade()?;
    request.validate()?;

    let posted = app_state
        .conversation_service
        .respond_to_close_deal(id, user.user_id, request.accept, request.content)
        .await?;

    publish_posted(&app_state.ws_state, &posted);

    Ok(Json(posted))
}

fn publish_posted(ws_state: &WsState, posted: &MessagePosted) {
    ws_state.publish(BartrEvent::new(BartrEventKind::MessagePosted, &posted.bartr));
    if posted.message.message.message_type.is_control() {
        ws_state.publish(BartrEvent::after_confirmation(&posted.bartr));
    }
}
