//! Workflow listing and management.
//!
//! This module provides:
//! - [`WorkflowsService`]: listing, missing-tool aggregation, soft deletion,
//!   versions, invocation counts and the per-user workflow menu
//! - [`WorkflowIndexQuery`]: filter, sort and pagination of listings
//! - [`WorkflowContents`]: tool enumeration over a workflow version
//! - [`group_by_repository`]: regrouping of missing tools per tool-shed
//!   repository
//!
//! # Missing tools
//!
//! With `missing_tools` set, a listing is replaced by one
//! [`RepositoryGroup`] per tool-shed repository that provides a tool some
//! listed workflow needs but the local toolbox lacks.

mod contents;
mod missing_tools;
mod query;

pub use contents::{StepToolCollector, WorkflowContents, WorkflowTool};
pub use missing_tools::{group_by_repository, RepositoryGroup};
pub use query::{parse_search, SearchTerm, WorkflowIndexQuery, WorkflowSortBy};

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::security::IdEncoder;
use crate::storage::{ItemType, NewWorkflow, StoredWorkflow, WorkflowStep, WorkflowUpdate};
use crate::toolshed::{ToolShedRegistry, Toolbox};
use crate::traits::{SharingStore, WorkflowStore};
use crate::users::Caller;

/// Display record of a stored workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct WorkflowSummary {
    /// Encoded stored workflow id.
    pub id: String,
    /// Workflow name.
    pub name: String,
    /// Owner's username.
    pub owner: String,
    /// Annotation texts.
    pub annotations: Vec<String>,
    /// Canonical URL.
    pub url: String,
    /// Steps of the latest version, absent with `skip_step_counts`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_steps: Option<usize>,
    /// Origin of the latest version.
    pub source_metadata: Option<Value>,
    /// Whether the caller has this workflow in their menu.
    pub show_in_tool_panel: bool,
    /// Encoded id of the latest version.
    pub latest_workflow_id: String,
    /// Soft-delete flag.
    pub deleted: bool,
    /// Hidden flag.
    pub hidden: bool,
    /// Published flag.
    pub published: bool,
    /// Importable flag.
    pub importable: bool,
    /// Creation timestamp.
    pub create_time: DateTime<Utc>,
    /// Last update timestamp.
    pub update_time: DateTime<Utc>,
    /// Uninstalled tool-shed tools, only set in missing-tools listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_tools: Option<Vec<String>>,
}

/// Result of a workflow listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkflowIndex {
    /// One summary per workflow.
    Summaries(Vec<WorkflowSummary>),
    /// Missing tools grouped by repository.
    MissingTools(Vec<RepositoryGroup>),
}

impl WorkflowIndex {
    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Summaries(s) => s.len(),
            Self::MissingTools(g) => g.len(),
        }
    }

    /// Whether there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One entry of a version listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowVersionSummary {
    /// Zero-based position, newest first.
    pub version: usize,
    /// Last update of this version.
    pub update_time: DateTime<Utc>,
    /// Number of steps.
    pub steps: usize,
}

/// Response of `GET /workflows/menu`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMenu {
    /// Encoded ids of the workflows in the caller's menu.
    pub ids_in_menu: Vec<String>,
    /// Listing for the given query.
    pub workflows: WorkflowIndex,
}

/// Request body of `PUT /workflows/menu`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SetWorkflowMenuRequest {
    /// Encoded stored workflow ids, in menu order.
    #[serde(default)]
    pub workflow_ids: Vec<String>,
}

/// Request body of `POST /workflows`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateWorkflowRequest {
    /// Workflow name.
    pub name: String,
    /// Optional annotation.
    pub annotation: Option<String>,
    /// Steps.
    pub steps: Vec<WorkflowStep>,
    /// Origin metadata.
    pub source_metadata: Option<Value>,
    /// Hidden flag.
    pub hidden: bool,
    /// Published flag.
    pub published: bool,
    /// Importable flag.
    pub importable: bool,
}

/// Request body of `PUT /workflows/{id}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateWorkflowRequest {
    /// New name.
    pub name: Option<String>,
    /// Steps of the new version.
    pub steps: Option<Vec<WorkflowStep>>,
    /// Origin metadata of the new version.
    pub source_metadata: Option<Value>,
}

/// Workflow operations on behalf of a caller.
pub struct WorkflowsService {
    store: Arc<dyn WorkflowStore>,
    sharing: Arc<dyn SharingStore>,
    contents: Arc<dyn WorkflowContents>,
    toolbox: Arc<dyn Toolbox>,
    registry: ToolShedRegistry,
    encoder: IdEncoder,
}

impl WorkflowsService {
    /// Create the service.
    #[must_use]
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        sharing: Arc<dyn SharingStore>,
        contents: Arc<dyn WorkflowContents>,
        toolbox: Arc<dyn Toolbox>,
        registry: ToolShedRegistry,
        encoder: IdEncoder,
    ) -> Self {
        Self {
            store,
            sharing,
            contents,
            toolbox,
            registry,
            encoder,
        }
    }

    /// List workflows visible to the caller.
    ///
    /// The total match count is only computed when `include_total_count` is
    /// set. With `query.missing_tools` the listing is regrouped by tool-shed
    /// repository.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] on database failure and
    /// [`AppError::ToolId`] if a missing tool has a malformed guid.
    pub async fn index(
        &self,
        caller: &Caller,
        query: &WorkflowIndexQuery,
        include_total_count: bool,
    ) -> Result<(WorkflowIndex, Option<i64>), AppError> {
        let user_id = caller.user_id();
        let (workflows, total) = self
            .store
            .index_query(user_id, query, include_total_count)
            .await?;
        let menu = self.menu_ids(user_id).await?;

        let summaries = workflows
            .iter()
            .map(|wf| self.summarize(wf, query.skip_step_counts, &menu))
            .collect::<Vec<_>>();

        if !query.missing_tools {
            return Ok((WorkflowIndex::Summaries(summaries), total));
        }

        let with_missing: Vec<WorkflowSummary> = workflows
            .iter()
            .zip(summaries)
            .filter_map(|(wf, mut summary)| {
                let missing: Vec<String> = self
                    .contents
                    .get_all_tools(&wf.latest)
                    .into_iter()
                    .map(|tool| tool.tool_id)
                    .filter(|id| self.toolbox.is_missing_shed_tool(id))
                    .collect();
                if missing.is_empty() {
                    None
                } else {
                    summary.missing_tools = Some(missing);
                    Some(summary)
                }
            })
            .collect();

        let groups = group_by_repository(
            with_missing
                .iter()
                .map(|s| (s.name.as_str(), s.missing_tools.iter().flatten())),
            &self.registry,
        )
        .inspect_err(|e| tracing::warn!(error = %e, "cannot group missing tools"))?;

        tracing::debug!(
            workflows = with_missing.len(),
            repositories = groups.len(),
            "missing tools grouped"
        );
        Ok((WorkflowIndex::MissingTools(groups), total))
    }

    /// Create a stored workflow owned by the caller.
    ///
    /// # Errors
    ///
    /// Returns 403 for anonymous callers and 400 for an empty name.
    pub async fn create(
        &self,
        caller: &Caller,
        request: CreateWorkflowRequest,
    ) -> Result<WorkflowSummary, AppError> {
        let user = caller.require_user()?;
        if request.name.trim().is_empty() {
            return Err(AppError::bad_request("Workflow name must not be empty"));
        }

        let stored = self
            .store
            .create_stored_workflow(&NewWorkflow {
                user_id: user.id,
                name: request.name,
                annotation: request.annotation,
                steps: request.steps,
                source_metadata: request.source_metadata,
                hidden: request.hidden,
                published: request.published,
                importable: request.importable,
            })
            .await?;

        tracing::info!(stored_workflow_id = stored.id, user_id = user.id, "workflow created");
        let menu = self.menu_ids(Some(user.id)).await?;
        Ok(self.summarize(&stored, false, &menu))
    }

    /// Save a new version of an owned workflow.
    ///
    /// # Errors
    ///
    /// Returns 404/403 per [`Self::delete`] and 400 when nothing changes.
    pub async fn update(
        &self,
        caller: &Caller,
        workflow_id: &str,
        request: UpdateWorkflowRequest,
    ) -> Result<WorkflowSummary, AppError> {
        let stored = self.get_owned(caller, workflow_id).await?;
        if request.name.is_none() && request.steps.is_none() && request.source_metadata.is_none() {
            return Err(AppError::bad_request("Nothing to update"));
        }
        if request.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(AppError::bad_request("Workflow name must not be empty"));
        }

        let updated = self
            .store
            .add_workflow_version(
                stored.id,
                &WorkflowUpdate {
                    name: request.name,
                    steps: request.steps,
                    source_metadata: request.source_metadata,
                },
            )
            .await?;

        let menu = self.menu_ids(caller.user_id()).await?;
        Ok(self.summarize(&updated, false, &menu))
    }

    /// Soft-delete a workflow.
    ///
    /// # Errors
    ///
    /// Returns 400 for a malformed id, 404 for an unknown workflow and 403
    /// unless the caller owns it or is an admin.
    pub async fn delete(&self, caller: &Caller, workflow_id: &str) -> Result<(), AppError> {
        let stored = self.get_owned(caller, workflow_id).await?;
        self.store.set_workflow_deleted(stored.id, true).await?;
        tracing::info!(stored_workflow_id = stored.id, "workflow deleted");
        Ok(())
    }

    /// Restore a soft-deleted workflow.
    ///
    /// # Errors
    ///
    /// Same as [`Self::delete`].
    pub async fn undelete(&self, caller: &Caller, workflow_id: &str) -> Result<(), AppError> {
        let stored = self.get_owned(caller, workflow_id).await?;
        self.store.set_workflow_deleted(stored.id, false).await?;
        tracing::info!(stored_workflow_id = stored.id, "workflow undeleted");
        Ok(())
    }

    /// List versions of an accessible workflow, newest first.
    ///
    /// With `instance` the id names one version rather than the stored
    /// workflow.
    ///
    /// # Errors
    ///
    /// Returns 400 for a malformed id, 404 for an unknown workflow and 403
    /// if it is not accessible.
    pub async fn get_versions(
        &self,
        caller: &Caller,
        workflow_id: &str,
        instance: bool,
    ) -> Result<Vec<WorkflowVersionSummary>, AppError> {
        let stored = self.get_accessible(caller, workflow_id, instance).await?;
        let versions = self.store.get_workflow_versions(stored.id).await?;
        Ok(versions
            .iter()
            .rev()
            .enumerate()
            .map(|(version, w)| WorkflowVersionSummary {
                version,
                update_time: w.update_time,
                steps: w.step_count(),
            })
            .collect())
    }

    /// Invocation state counts of an accessible workflow.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get_versions`].
    pub async fn invocation_counts(
        &self,
        caller: &Caller,
        workflow_id: &str,
        instance: bool,
    ) -> Result<BTreeMap<String, i64>, AppError> {
        let stored = self.get_accessible(caller, workflow_id, instance).await?;
        Ok(self.store.get_invocation_counts(stored.id).await?)
    }

    /// The caller's menu together with a listing.
    ///
    /// # Errors
    ///
    /// Returns 403 for anonymous callers.
    pub async fn get_workflow_menu(
        &self,
        caller: &Caller,
        query: &WorkflowIndexQuery,
    ) -> Result<WorkflowMenu, AppError> {
        let user = caller.require_user()?;
        let ids_in_menu = self
            .store
            .get_menu_entries(user.id)
            .await?
            .into_iter()
            .map(|id| self.encoder.encode(id))
            .collect();
        let (workflows, _) = self.index(caller, query, false).await?;
        Ok(WorkflowMenu {
            ids_in_menu,
            workflows,
        })
    }

    /// Replace the caller's menu.
    ///
    /// Every workflow must be accessible to the caller. Returns the encoded
    /// ids now in the menu.
    ///
    /// # Errors
    ///
    /// Returns 403 for anonymous callers and the errors of
    /// [`Self::get_versions`] for each id.
    pub async fn set_workflow_menu(
        &self,
        caller: &Caller,
        request: &SetWorkflowMenuRequest,
    ) -> Result<Vec<String>, AppError> {
        let user = caller.require_user()?;
        let mut ids = Vec::with_capacity(request.workflow_ids.len());
        for encoded in &request.workflow_ids {
            ids.push(self.get_accessible(caller, encoded, false).await?.id);
        }
        self.store.set_menu_entries(user.id, ids).await?;

        Ok(self
            .store
            .get_menu_entries(user.id)
            .await?
            .into_iter()
            .map(|id| self.encoder.encode(id))
            .collect())
    }

    fn summarize(
        &self,
        wf: &StoredWorkflow,
        skip_step_counts: bool,
        menu: &HashSet<i64>,
    ) -> WorkflowSummary {
        let id = self.encoder.encode(wf.id);
        WorkflowSummary {
            url: format!("/workflows/{id}"),
            id,
            name: wf.name.clone(),
            owner: wf.owner.clone(),
            annotations: wf.annotations.clone(),
            number_of_steps: (!skip_step_counts).then(|| wf.latest.step_count()),
            source_metadata: wf.latest.source_metadata.clone(),
            show_in_tool_panel: menu.contains(&wf.id),
            latest_workflow_id: self.encoder.encode(wf.latest.id),
            deleted: wf.deleted,
            hidden: wf.hidden,
            published: wf.published,
            importable: wf.importable,
            create_time: wf.create_time,
            update_time: wf.update_time,
            missing_tools: None,
        }
    }

    async fn menu_ids(&self, user_id: Option<i64>) -> Result<HashSet<i64>, AppError> {
        match user_id {
            Some(uid) => Ok(self.store.get_menu_entries(uid).await?.into_iter().collect()),
            None => Ok(HashSet::new()),
        }
    }

    async fn get_owned(&self, caller: &Caller, workflow_id: &str) -> Result<StoredWorkflow, AppError> {
        let id = self.encoder.decode(workflow_id)?;
        let stored = self
            .store
            .get_stored_workflow(id)
            .await?
            .ok_or_else(|| AppError::not_found("Workflow"))?;
        if caller.is_admin || caller.user_id() == Some(stored.user_id) {
            Ok(stored)
        } else {
            Err(AppError::forbidden("Workflow is not owned by the current user"))
        }
    }

    async fn get_accessible(
        &self,
        caller: &Caller,
        workflow_id: &str,
        instance: bool,
    ) -> Result<StoredWorkflow, AppError> {
        let id = self.encoder.decode(workflow_id)?;
        let stored = if instance {
            self.store.get_stored_workflow_by_version(id).await?
        } else {
            self.store.get_stored_workflow(id).await?
        }
        .ok_or_else(|| AppError::not_found("Workflow"))?;

        if caller.is_admin || stored.published || stored.importable {
            return Ok(stored);
        }
        if let Some(uid) = caller.user_id() {
            if uid == stored.user_id
                || self
                    .sharing
                    .is_shared_with(ItemType::Workflow, stored.id, uid)
                    .await?
            {
                return Ok(stored);
            }
        }
        Err(AppError::forbidden("Workflow is not accessible by the current user"))
    }
}
