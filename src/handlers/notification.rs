//! Notification inbox handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::middleware::AuthenticatedUser;
use crate::notification::{ListNotificationsQuery, Notification, NotificationService};

/// GET /notifications?unread=true
pub async fn list_notifications(
    State(notifications): State<Arc<NotificationService>>,
    user: AuthenticatedUser,
    Query(query): Query<ListNotificationsQuery>,
) -> ApiResult<Json<Vec<Notification>>> {
    Ok(Json(notifications.list(user.user_id, query.unread).await?))
}

/// POST /notifications/:id/read
pub async fn mark_notification_read(
    State(notifications): State<Arc<NotificationService>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Notification>> {
    Ok(Json(notifications.mark_read(user.user_id, id).await?))
}
