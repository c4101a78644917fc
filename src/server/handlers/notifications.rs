//! `/notifications` handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::error::AppError;
use crate::notifications::{
    parse_since, NotificationCreateData, NotificationCreateRequest, NotificationCreatedResponse,
    NotificationResponse, NotificationStatusSummary, NotificationsBatchUpdateResponse,
    UserNotificationPreferences, UserNotificationResponse, UserNotificationsBatchUpdateRequest,
};
use crate::server::responses::{ApiJson, ApiQuery};
use crate::server::types::AppState;
use crate::storage::UserNotificationChanges;
use crate::users::Caller;

/// `?limit=&offset=` of the listing.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    /// Maximum number of notifications.
    #[serde(default)]
    pub limit: Option<i64>,
    /// Number of notifications to skip.
    #[serde(default)]
    pub offset: Option<i64>,
}

/// `?since=` of the status endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusQuery {
    /// RFC 3339 or naive UTC timestamp.
    pub since: String,
}

/// `POST /notifications`
pub async fn send(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<NotificationCreateRequest>,
) -> Result<Json<NotificationCreatedResponse>, AppError> {
    Ok(Json(
        state
            .notifications
            .send_notification_to_recipients(&caller, request)
            .await?,
    ))
}

/// `GET /notifications`
pub async fn list(
    State(state): State<AppState>,
    caller: Caller,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> Result<Json<Vec<UserNotificationResponse>>, AppError> {
    Ok(Json(
        state
            .notifications
            .get_user_notifications(&caller, page.limit, page.offset)
            .await?,
    ))
}

/// `PUT /notifications`
pub async fn update_many(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<UserNotificationsBatchUpdateRequest>,
) -> Result<Json<NotificationsBatchUpdateResponse>, AppError> {
    Ok(Json(
        state
            .notifications
            .update_user_notifications(&caller, request)
            .await?,
    ))
}

/// `GET /notifications/status`
pub async fn status(
    State(state): State<AppState>,
    caller: Caller,
    ApiQuery(query): ApiQuery<StatusQuery>,
) -> Result<Json<NotificationStatusSummary>, AppError> {
    let since = parse_since(&query.since)?;
    Ok(Json(state.notifications.get_status(&caller, since).await?))
}

/// `GET /notifications/preferences`
pub async fn get_preferences(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<UserNotificationPreferences>, AppError> {
    Ok(Json(state.notifications.get_preferences(&caller).await?))
}

/// `PUT /notifications/preferences`
pub async fn update_preferences(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<UserNotificationPreferences>,
) -> Result<Json<UserNotificationPreferences>, AppError> {
    Ok(Json(
        state
            .notifications
            .update_preferences(&caller, request)
            .await?,
    ))
}

/// `POST /notifications/broadcast`
pub async fn create_broadcast(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(data): ApiJson<NotificationCreateData>,
) -> Result<Json<NotificationCreatedResponse>, AppError> {
    Ok(Json(
        state.notifications.create_broadcast(&caller, data).await?,
    ))
}

/// `GET /notifications/broadcast`
pub async fn list_broadcasts(
    State(state): State<AppState>,
) -> Result<Json<Vec<NotificationResponse>>, AppError> {
    Ok(Json(state.notifications.get_active_broadcasts().await?))
}

/// `GET /notifications/broadcast/{id}`
pub async fn get_broadcast(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<NotificationResponse>, AppError> {
    Ok(Json(state.notifications.get_broadcast(&id).await?))
}

/// `GET /notifications/{id}`
pub async fn get_one(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<UserNotificationResponse>, AppError> {
    Ok(Json(
        state
            .notifications
            .get_user_notification(&caller, &id)
            .await?,
    ))
}

/// `PUT /notifications/{id}`
pub async fn update_one(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    ApiJson(changes): ApiJson<UserNotificationChanges>,
) -> Result<StatusCode, AppError> {
    state
        .notifications
        .update_user_notification(&caller, &id, changes)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /notifications/{id}`
pub async fn delete_one(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .notifications
        .delete_user_notification(&caller, &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
