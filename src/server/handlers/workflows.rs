//! `/workflows` handlers.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::Json;
use serde::Deserialize;

use crate::client::TOTAL_MATCHES_HEADER;
use crate::error::AppError;
use crate::server::responses::{ApiJson, ApiQuery};
use crate::server::types::AppState;
use crate::users::Caller;
use crate::workflows::{
    CreateWorkflowRequest, SetWorkflowMenuRequest, UpdateWorkflowRequest, WorkflowIndex,
    WorkflowIndexQuery, WorkflowMenu, WorkflowSummary, WorkflowVersionSummary,
};

/// `?instance=` of the version and count endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct InstanceQuery {
    /// The id names a single version rather than a stored workflow.
    #[serde(default)]
    pub instance: bool,
}

/// `GET /workflows`
pub async fn index(
    State(state): State<AppState>,
    caller: Caller,
    ApiQuery(query): ApiQuery<WorkflowIndexQuery>,
) -> Result<(HeaderMap, Json<WorkflowIndex>), AppError> {
    let (index, total) = state.workflows.index(&caller, &query, true).await?;
    let mut headers = HeaderMap::new();
    if let Some(total) = total {
        headers.insert(
            HeaderName::from_static(TOTAL_MATCHES_HEADER),
            HeaderValue::from(total),
        );
    }
    Ok((headers, Json(index)))
}

/// `POST /workflows`
pub async fn create(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<CreateWorkflowRequest>,
) -> Result<Json<WorkflowSummary>, AppError> {
    Ok(Json(state.workflows.create(&caller, request).await?))
}

/// `PUT /workflows/{id}`
pub async fn update(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateWorkflowRequest>,
) -> Result<Json<WorkflowSummary>, AppError> {
    Ok(Json(state.workflows.update(&caller, &id, request).await?))
}

/// `DELETE /workflows/{id}`
pub async fn delete(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.workflows.delete(&caller, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /workflows/{id}/undelete`
pub async fn undelete(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.workflows.undelete(&caller, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /workflows/{id}/versions`
pub async fn versions(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<InstanceQuery>,
) -> Result<Json<Vec<WorkflowVersionSummary>>, AppError> {
    Ok(Json(
        state
            .workflows
            .get_versions(&caller, &id, query.instance)
            .await?,
    ))
}

/// `GET /workflows/{id}/counts`
pub async fn counts(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<InstanceQuery>,
) -> Result<Json<BTreeMap<String, i64>>, AppError> {
    Ok(Json(
        state
            .workflows
            .invocation_counts(&caller, &id, query.instance)
            .await?,
    ))
}

/// `GET /workflows/menu`
pub async fn get_menu(
    State(state): State<AppState>,
    caller: Caller,
    ApiQuery(query): ApiQuery<WorkflowIndexQuery>,
) -> Result<Json<WorkflowMenu>, AppError> {
    Ok(Json(state.workflows.get_workflow_menu(&caller, &query).await?))
}

/// `PUT /workflows/menu`
pub async fn set_menu(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<SetWorkflowMenuRequest>,
) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(
        state.workflows.set_workflow_menu(&caller, &request).await?,
    ))
}
