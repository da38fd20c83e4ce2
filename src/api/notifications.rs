//! Inbox listing and read/archive mutations for the authenticated user.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::notification::{Context, FlagUpdate, Notification, Priority, Provider};
use crate::preferences::InboxView;
use crate::server::AppState;
use crate::store::{NotificationQuery, DEFAULT_QUERY_LIMIT, MAX_QUERY_LIMIT};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub view: Option<InboxView>,
    pub priority: Option<Priority>,
    pub provider: Option<Provider>,
    #[serde(default)]
    pub unread_only: bool,
    /// Defaults to hiding archived notifications
    pub archived: Option<bool>,
    pub before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl ListParams {
    fn into_query(self) -> NotificationQuery {
        let view = self.view.unwrap_or_default();
        let contexts = match view {
            InboxView::Work => Some(vec![Context::Work, Context::Both]),
            InboxView::Personal => Some(vec![Context::Personal, Context::Both]),
            InboxView::All | InboxView::Critical => None,
        };
        let priorities = match (view, self.priority) {
            (InboxView::Critical, Some(p)) if p != Priority::Critical => Some(Vec::new()),
            (InboxView::Critical, _) => Some(vec![Priority::Critical]),
            (_, Some(p)) => Some(vec![p]),
            (_, None) => None,
        };

        NotificationQuery {
            contexts,
            priorities,
            providers: self.provider.map(|p| vec![p]),
            read: self.unread_only.then_some(false),
            archived: Some(self.archived.unwrap_or(false)),
            before: self.before,
            limit: self.limit.unwrap_or(DEFAULT_QUERY_LIMIT),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationListResponse {
    pub notifications: Vec<Notification>,
    /// Pass as `before` to fetch the next page; absent on the last page
    pub next_before: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchAction {
    Read,
    Unread,
    Archive,
}

impl BatchAction {
    fn update(self) -> FlagUpdate {
        match self {
            BatchAction::Read => FlagUpdate::read(true),
            BatchAction::Unread => FlagUpdate::read(false),
            BatchAction::Archive => FlagUpdate::archived(true),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub ids: Vec<Uuid>,
    pub action: BatchAction,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub updated: usize,
}

/// GET /api/v1/notifications
#[tracing::instrument(name = "http.list_notifications", skip(state, user, params), fields(user_id = %user.user_id))]
pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<ListParams>,
) -> Result<Json<NotificationListResponse>> {
    let query = params.into_query();
    let notifications = state
        .store
        .query_notifications(&user.user_id, &query)
        .await?;

    let next_before = if notifications.len() == query.effective_limit() {
        notifications.last().map(|n| n.created_at)
    } else {
        None
    };

    Ok(Json(NotificationListResponse {
        notifications,
        next_before,
    }))
}

async fn apply_one(state: &AppState, user_id: &str, id: Uuid, update: FlagUpdate) -> Result<Notification> {
    let found = state.store.update_flags(user_id, &[id], update).await?;
    if found == 0 {
        return Err(AppError::NotFound(format!("Notification {} not found", id)));
    }
    state
        .store
        .get_notification(user_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", id)))
}

/// POST /api/v1/notifications/{id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>> {
    Ok(Json(apply_one(&state, &user.user_id, id, FlagUpdate::read(true)).await?))
}

/// POST /api/v1/notifications/{id}/unread
pub async fn mark_unread(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>> {
    Ok(Json(apply_one(&state, &user.user_id, id, FlagUpdate::read(false)).await?))
}

/// POST /api/v1/notifications/{id}/archive
pub async fn archive(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>> {
    Ok(Json(apply_one(&state, &user.user_id, id, FlagUpdate::archived(true)).await?))
}

/// POST /api/v1/notifications/{id}/unarchive
pub async fn unarchive(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>> {
    Ok(Json(apply_one(&state, &user.user_id, id, FlagUpdate::archived(false)).await?))
}

/// POST /api/v1/notifications/batch
#[tracing::instrument(name = "http.batch_notifications", skip(state, user, request), fields(user_id = %user.user_id))]
pub async fn batch_update(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<BatchRequest>,
) -> Result<Json<BatchResponse>> {
    if request.ids.is_empty() {
        return Err(AppError::Validation("ids must not be empty".to_string()));
    }
    if request.ids.len() > MAX_QUERY_LIMIT {
        return Err(AppError::Validation(format!(
            "At most {} ids per batch",
            MAX_QUERY_LIMIT
        )));
    }

    let updated = state
        .store
        .update_flags(&user.user_id, &request.ids, request.action.update())
        .await?;
    Ok(Json(BatchResponse { updated }))
}
