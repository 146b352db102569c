//! Bartr lifecycle handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::app_state::AppState;
use crate::bartr::{
    Bartr, BartrDetail, BartrEvent, BartrEventKind, BartrOverview, CompleteQuery,
    ProposeBartrRequest,
};
use crate::error::ApiResult;
use crate::middleware::AuthenticatedUser;

/// POST /bartrs
pub async fn propose_bartr(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<ProposeBartrRequest>,
) -> ApiResult<(StatusCode, Json<Bartr>)> {
    user.ensure_can_trade()?;
    request.validate()?;

    let bartr = app_state
        .bartr_service
        .propose(user.user_id, request)
        .await?;

    app_state
        .ws_state
        .publish(BartrEvent::new(BartrEventKind::Proposed, &bartr));

    Ok((StatusCode::CREATED, Json(bartr)))
}

/// GET /bartrs
pub async fn list_bartrs(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<Vec<BartrOverview>>> {
    let bartrs = app_state.bartr_service.list_for_user(user.user_id).await?;
    Ok(Json(bartrs))
}

/// GET /bartrs/:id
pub async fn get_bartr(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BartrDetail>> {
    let detail = app_state.bartr_service.get_detail(id, user.user_id).await?;
    Ok(Json(detail))
}

/// POST /bartrs/:id/accept
pub async fn accept_bartr(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Bartr>> {
    user.ensure_can_trade()?;

    let outcome = app_state.bartr_service.accept(id, user.user_id).await?;

    app_state
        .ws_state
        .publish(BartrEvent::new(BartrEventKind::Accepted, &outcome.bartr));
    for declined in &outcome.auto_declined {
        app_state
            .ws_state
            .publish(BartrEvent::new(BartrEventKind::Declined, declined));
    }

    Ok(Json(outcome.bartr))
}

/// POST /bartrs/:id/decline
pub async fn decline_bartr(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Bartr>> {
    user.ensure_can_trade()?;

    let bartr = app_state.bartr_service.decline(id, user.user_id).await?;

    app_state
        .ws_state
        .publish(BartrEvent::new(BartrEventKind::Declined, &bartr));

    Ok(Json(bartr))
}

/// POST /bartrs/:id/cancel
pub async fn cancel_bartr(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Bartr>> {
    user.ensure_can_trade()?;

    let bartr = app_state.bartr_service.cancel(id, user.user_id).await?;

    app_state
        .ws_state
        .publish(BartrEvent::new(BartrEventKind::Cancelled, &bartr));

    Ok(Json(bartr))
}

/// POST /bartrs/:id/complete, or `?reset=true` to retract confirmations
pub async fn complete_bartr(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Query(query): Query<CompleteQuery>,
) -> ApiResult<Json<Bartr>> {
    user.ensure_can_trade()?;

    let bartr = if query.reset {
        app_state
            .bartr_service
            .reset_confirmations(id, user.user_id)
            .await?
    } else {
        app_state.bartr_service.confirm(id, user.user_id).await?
    };

    app_state
        .ws_state
        .publish(BartrEvent::after_confirmation(&bartr));

    Ok(Json(bartr))
}
