//! HTTP mapping of errors and request extractors with JSON rejections.
//!
//! Every failed request answers with `{"err_msg": ..., "err_code": ...}`.
//! Internal failures are logged and reported without their details.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, AppError};

/// Error body returned for every non-success response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub err_msg: String,
    /// HTTP status code.
    pub err_code: u16,
}

impl AppError {
    /// HTTP status this error is reported with.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Api(ApiError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Api(ApiError::Forbidden { .. } | ApiError::FeatureDisabled { .. }) => {
                StatusCode::FORBIDDEN
            }
            Self::Api(ApiError::BadRequest { .. } | ApiError::MalformedId { .. }) => {
                StatusCode::BAD_REQUEST
            }
            Self::ToolId(_) | Self::Storage(_) | Self::Config(_) | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err_msg = match &self {
            Self::Api(e) => {
                tracing::debug!(status = status.as_u16(), error = %e, "request rejected");
                e.to_string()
            }
            Self::ToolId(e) => {
                tracing::warn!(error = %e, "cannot process tool identifier");
                e.to_string()
            }
            Self::Storage(_) | Self::Config(_) | Self::Io(_) => {
                tracing::error!(error = %self, "request failed");
                "Internal server error".to_string()
            }
        };
        let body = ErrorBody {
            err_msg,
            err_code: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

/// JSON request body whose rejections are reported as [`ErrorBody`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query string whose rejections are reported as [`ErrorBody`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);
