//! Item creation and `share_with_users` handlers.
//!
//! The sharing routes are registered once per item kind; the kind reaches
//! the handler as a request extension.

use axum::extract::{Path, State};
use axum::{Extension, Json};

use crate::error::AppError;
use crate::server::responses::ApiJson;
use crate::server::types::AppState;
use crate::sharing::{
    CreateHistoryRequest, CreatePageRequest, CreateVisualizationRequest, CreatedItem,
    ShareWithUsersRequest, ShareWithUsersResponse, SharingStatus,
};
use crate::storage::ItemType;
use crate::users::Caller;

/// `PUT /{kind}/{id}/share_with_users`
pub async fn share_with_users(
    State(state): State<AppState>,
    Extension(item_type): Extension<ItemType>,
    caller: Caller,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<ShareWithUsersRequest>,
) -> Result<Json<ShareWithUsersResponse>, AppError> {
    Ok(Json(
        state
            .sharing
            .share_with_users(&caller, item_type, &id, &request)
            .await?,
    ))
}

/// `GET /{kind}/{id}/sharing`
pub async fn sharing_status(
    State(state): State<AppState>,
    Extension(item_type): Extension<ItemType>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<SharingStatus>, AppError> {
    Ok(Json(
        state
            .sharing
            .get_sharing_status(&caller, item_type, &id)
            .await?,
    ))
}

/// `POST /histories`
pub async fn create_history(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<CreateHistoryRequest>,
) -> Result<Json<CreatedItem>, AppError> {
    Ok(Json(state.sharing.create_history(&caller, request).await?))
}

/// `POST /pages`
pub async fn create_page(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<CreatePageRequest>,
) -> Result<Json<CreatedItem>, AppError> {
    Ok(Json(state.sharing.create_page(&caller, request).await?))
}

/// `POST /visualizations`
pub async fn create_visualization(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<CreateVisualizationRequest>,
) -> Result<Json<CreatedItem>, AppError> {
    Ok(Json(
        state
            .sharing
            .create_visualization(&caller, request)
            .await?,
    ))
}
