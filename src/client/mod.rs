//! Typed HTTP client for the flowhub API.
//!
//! This module provides:
//! - [`ClientConfig`]: base URL, API key and timeout
//! - [`FlowhubClient`]: one method per endpoint, returning the service's
//!   own request/response types
//!
//! Non-success responses become [`ClientError::Status`] carrying the status
//! code and body, so callers can assert on 403/404 without parsing.

#![allow(clippy::missing_errors_doc)]

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::error::ClientError;
use crate::notifications::{
    NotificationCreateData, NotificationCreateRequest, NotificationCreatedResponse,
    NotificationResponse, NotificationStatusSummary, NotificationsBatchUpdateResponse,
    UserNotificationPreferences, UserNotificationResponse, UserNotificationsBatchUpdateRequest,
};
use crate::sharing::{
    CreateHistoryRequest, CreatePageRequest, CreateVisualizationRequest, CreatedItem,
    ShareWithUsersRequest, ShareWithUsersResponse, SharingStatus,
};
use crate::storage::{ItemType, UserNotificationChanges};
use crate::users::{CreateUserRequest, CreatedUser, CurrentUser, API_KEY_HEADER};
use crate::workflows::{
    CreateWorkflowRequest, SetWorkflowMenuRequest, UpdateWorkflowRequest, WorkflowIndex,
    WorkflowIndexQuery, WorkflowMenu, WorkflowSummary, WorkflowVersionSummary,
};

/// Default request timeout (30 seconds).
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Response header carrying the total size of a workflow listing.
pub const TOTAL_MATCHES_HEADER: &str = "total_matches";

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server root, e.g. `http://127.0.0.1:8080`.
    pub base_url: String,
    /// API key sent in the `x-api-key` header.
    pub api_key: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl ClientConfig {
    /// Anonymous configuration for a server.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Set the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the timeout.
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// flowhub API client.
#[derive(Debug, Clone)]
pub struct FlowhubClient {
    client: Client,
    config: ClientConfig,
}

impl FlowhubClient {
    /// Create a client.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ClientError::Network {
                message: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self { client, config })
    }

    /// The same server, authenticated with another key (or anonymous).
    #[must_use]
    pub fn as_key(&self, api_key: Option<&str>) -> Self {
        Self {
            client: self.client.clone(),
            config: ClientConfig {
                api_key: api_key.map(ToString::to_string),
                ..self.config.clone()
            },
        }
    }

    /// Get the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    // Users

    /// `POST /users`
    pub async fn create_user(&self, username: &str, email: &str) -> Result<CreatedUser, ClientError> {
        let body = CreateUserRequest {
            username: username.to_string(),
            email: email.to_string(),
        };
        self.json(self.request(Method::POST, "users").json(&body)).await
    }

    /// `GET /users/current`
    pub async fn current_user(&self) -> Result<CurrentUser, ClientError> {
        self.json(self.request(Method::GET, "users/current")).await
    }

    // Notifications

    /// `POST /notifications`
    pub async fn send_notification(
        &self,
        request: &NotificationCreateRequest,
    ) -> Result<NotificationCreatedResponse, ClientError> {
        self.json(self.request(Method::POST, "notifications").json(request))
            .await
    }

    /// `POST /notifications/broadcast`
    pub async fn create_broadcast(
        &self,
        notification: &NotificationCreateData,
    ) -> Result<NotificationCreatedResponse, ClientError> {
        self.json(
            self.request(Method::POST, "notifications/broadcast")
                .json(notification),
        )
        .await
    }

    /// `GET /notifications/status?since=`
    pub async fn notification_status(
        &self,
        since: DateTime<Utc>,
    ) -> Result<NotificationStatusSummary, ClientError> {
        let since = since.to_rfc3339_opts(SecondsFormat::Micros, true);
        self.json(
            self.request(Method::GET, "notifications/status")
                .query(&[("since", since)]),
        )
        .await
    }

    /// `GET /notifications`
    pub async fn notifications(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<UserNotificationResponse>, ClientError> {
        let mut params = Vec::new();
        if let Some(limit) = limit {
            params.push(("limit", limit));
        }
        if let Some(offset) = offset {
            params.push(("offset", offset));
        }
        self.json(self.request(Method::GET, "notifications").query(&params))
            .await
    }

    /// `GET /notifications/{id}`
    pub async fn notification(&self, id: &str) -> Result<UserNotificationResponse, ClientError> {
        self.json(self.request(Method::GET, &format!("notifications/{id}")))
            .await
    }

    /// `PUT /notifications/{id}`
    pub async fn update_notification(
        &self,
        id: &str,
        changes: UserNotificationChanges,
    ) -> Result<(), ClientError> {
        self.empty(
            self.request(Method::PUT, &format!("notifications/{id}"))
                .json(&changes),
        )
        .await
    }

    /// `PUT /notifications`
    pub async fn update_notifications(
        &self,
        request: &UserNotificationsBatchUpdateRequest,
    ) -> Result<NotificationsBatchUpdateResponse, ClientError> {
        self.json(self.request(Method::PUT, "notifications").json(request))
            .await
    }

    /// `DELETE /notifications/{id}`
    pub async fn delete_notification(&self, id: &str) -> Result<(), ClientError> {
        self.empty(self.request(Method::DELETE, &format!("notifications/{id}")))
            .await
    }

    /// `GET /notifications/broadcast`
    pub async fn broadcasts(&self) -> Result<Vec<NotificationResponse>, ClientError> {
        self.json(self.request(Method::GET, "notifications/broadcast"))
            .await
    }

    /// `GET /notifications/broadcast/{id}`
    pub async fn broadcast(&self, id: &str) -> Result<NotificationResponse, ClientError> {
        self.json(self.request(Method::GET, &format!("notifications/broadcast/{id}")))
            .await
    }

    /// `GET /notifications/preferences`
    pub async fn preferences(&self) -> Result<UserNotificationPreferences, ClientError> {
        self.json(self.request(Method::GET, "notifications/preferences"))
            .await
    }

    /// `PUT /notifications/preferences`
    pub async fn update_preferences(
        &self,
        preferences: &UserNotificationPreferences,
    ) -> Result<UserNotificationPreferences, ClientError> {
        self.json(
            self.request(Method::PUT, "notifications/preferences")
                .json(preferences),
        )
        .await
    }

    // Shareable items

    /// `POST /histories`
    pub async fn create_history(&self, name: &str) -> Result<CreatedItem, ClientError> {
        let body = CreateHistoryRequest {
            name: Some(name.to_string()),
        };
        self.json(self.request(Method::POST, "histories").json(&body))
            .await
    }

    /// `POST /pages`
    pub async fn create_page(&self, request: &CreatePageRequest) -> Result<CreatedItem, ClientError> {
        self.json(self.request(Method::POST, "pages").json(request))
            .await
    }

    /// `POST /visualizations`
    pub async fn create_visualization(
        &self,
        request: &CreateVisualizationRequest,
    ) -> Result<CreatedItem, ClientError> {
        self.json(self.request(Method::POST, "visualizations").json(request))
            .await
    }

    /// `PUT /{kind}/{id}/share_with_users`
    pub async fn share_with_users(
        &self,
        item_type: ItemType,
        id: &str,
        user_ids: &[&str],
    ) -> Result<ShareWithUsersResponse, ClientError> {
        let body = ShareWithUsersRequest {
            user_ids: user_ids.iter().map(ToString::to_string).collect(),
        };
        let path = format!("{}/{id}/share_with_users", item_type.collection());
        self.json(self.request(Method::PUT, &path).json(&body)).await
    }

    /// `GET /{kind}/{id}/sharing`
    pub async fn sharing_status(
        &self,
        item_type: ItemType,
        id: &str,
    ) -> Result<SharingStatus, ClientError> {
        let path = format!("{}/{id}/sharing", item_type.collection());
        self.json(self.request(Method::GET, &path)).await
    }

    // Workflows

    /// `GET /workflows`; also returns the `total_matches` header.
    pub async fn workflows(
        &self,
        query: &WorkflowIndexQuery,
    ) -> Result<(WorkflowIndex, Option<i64>), ClientError> {
        let response = self
            .send(self.request(Method::GET, "workflows").query(query))
            .await?;
        let total = response
            .headers()
            .get(TOTAL_MATCHES_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let index = Self::decode(response).await?;
        Ok((index, total))
    }

    /// `POST /workflows`
    pub async fn create_workflow(
        &self,
        request: &CreateWorkflowRequest,
    ) -> Result<WorkflowSummary, ClientError> {
        self.json(self.request(Method::POST, "workflows").json(request))
            .await
    }

    /// `PUT /workflows/{id}`
    pub async fn update_workflow(
        &self,
        id: &str,
        request: &UpdateWorkflowRequest,
    ) -> Result<WorkflowSummary, ClientError> {
        self.json(self.request(Method::PUT, &format!("workflows/{id}")).json(request))
            .await
    }

    /// `DELETE /workflows/{id}`
    pub async fn delete_workflow(&self, id: &str) -> Result<(), ClientError> {
        self.empty(self.request(Method::DELETE, &format!("workflows/{id}")))
            .await
    }

    /// `POST /workflows/{id}/undelete`
    pub async fn undelete_workflow(&self, id: &str) -> Result<(), ClientError> {
        self.empty(self.request(Method::POST, &format!("workflows/{id}/undelete")))
            .await
    }

    /// `GET /workflows/{id}/versions`
    pub async fn workflow_versions(
        &self,
        id: &str,
        instance: bool,
    ) -> Result<Vec<WorkflowVersionSummary>, ClientError> {
        self.json(
            self.request(Method::GET, &format!("workflows/{id}/versions"))
                .query(&[("instance", instance)]),
        )
        .await
    }

    /// `GET /workflows/{id}/counts`
    pub async fn workflow_counts(
        &self,
        id: &str,
        instance: bool,
    ) -> Result<BTreeMap<String, i64>, ClientError> {
        self.json(
            self.request(Method::GET, &format!("workflows/{id}/counts"))
                .query(&[("instance", instance)]),
        )
        .await
    }

    /// `GET /workflows/menu`
    pub async fn workflow_menu(&self, query: &WorkflowIndexQuery) -> Result<WorkflowMenu, ClientError> {
        self.json(self.request(Method::GET, "workflows/menu").query(query))
            .await
    }

    /// `PUT /workflows/menu`
    pub async fn set_workflow_menu(&self, workflow_ids: &[&str]) -> Result<Vec<String>, ClientError> {
        let body = SetWorkflowMenuRequest {
            workflow_ids: workflow_ids.iter().map(ToString::to_string).collect(),
        };
        self.json(self.request(Method::PUT, "workflows/menu").json(&body))
            .await
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<(), ClientError> {
        self.empty(self.request(Method::GET, "health")).await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.config.base_url, path.trim_start_matches('/'));
        let builder = self.client.request(method, url);
        match &self.config.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ClientError> {
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout {
                    timeout_ms: self.config.timeout_ms,
                }
            } else {
                ClientError::Network {
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), body = %body, "request failed");
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let response = self.send(builder).await?;
        Self::decode(response).await
    }

    async fn empty(&self, builder: RequestBuilder) -> Result<(), ClientError> {
        self.send(builder).await.map(|_| ())
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        response
            .json()
            .await
            .map_err(|e| ClientError::UnexpectedResponse {
                message: e.to_string(),
            })
    }
}
