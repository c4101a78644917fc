//! Caller extraction from the `x-api-key` header.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::types::AppState;
use crate::error::AppError;
use crate::users::{Caller, API_KEY_HEADER};

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let api_key = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok());
        state.users.authenticate(api_key).await
    }
}
