//! `/users` handlers.

use axum::extract::State;
use axum::Json;

use crate::error::AppError;
use crate::server::responses::ApiJson;
use crate::server::types::AppState;
use crate::users::{Caller, CreateUserRequest, CreatedUser, CurrentUser};

/// `POST /users`
pub async fn create_user(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> Result<Json<CreatedUser>, AppError> {
    Ok(Json(state.users.create_user(&caller, &request).await?))
}

/// `GET /users/current`
pub async fn current_user(State(state): State<AppState>, caller: Caller) -> Json<CurrentUser> {
    Json(state.users.current(&caller))
}
