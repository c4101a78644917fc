//! Workflow storage operations.

#![allow(clippy::missing_errors_doc)]

use std::collections::{BTreeMap, HashMap};

use crate::error::StorageError;
use crate::workflows::{SearchTerm, WorkflowIndexQuery, WorkflowSortBy};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

use super::core::SqliteStorage;
use super::types::{NewWorkflow, StoredWorkflow, StoredWorkflowVersion, WorkflowStep, WorkflowUpdate};

const VERSION_COLUMNS: &str =
    "id, stored_workflow_id, steps, source_metadata, create_time, update_time";

const STORED_COLUMNS: &str = "sw.id, sw.user_id, u.username AS owner, sw.name, sw.slug, sw.deleted, \
     sw.hidden, sw.published, sw.importable, sw.latest_workflow_id, sw.create_time, sw.update_time";

/// Ids bound per `IN (...)` list, well under SQLite's variable limit.
const IN_CHUNK: usize = 500;

impl SqliteStorage {
    /// Run a workflow listing query.
    ///
    /// `user_id` of `None` is an anonymous caller, who only sees published,
    /// live workflows.
    pub async fn index_query(
        &self,
        user_id: Option<i64>,
        query: &WorkflowIndexQuery,
        include_total_count: bool,
    ) -> Result<(Vec<StoredWorkflow>, Option<i64>), StorageError> {
        let terms = query.search_terms();

        let mut select = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {STORED_COLUMNS} FROM stored_workflows sw JOIN users u ON u.id = sw.user_id WHERE 1 = 1"
        ));
        push_index_filters(&mut select, user_id, query, &terms);

        let order_column = match query.sort_by {
            WorkflowSortBy::CreateTime => "sw.create_time",
            WorkflowSortBy::UpdateTime => "sw.update_time",
            WorkflowSortBy::Name => "lower(sw.name)",
        };
        let direction = if query.sort_desc { "DESC" } else { "ASC" };
        select.push(format!(" ORDER BY {order_column} {direction}, sw.id {direction}"));
        select.push(" LIMIT ");
        select.push_bind(query.limit.unwrap_or(-1));
        select.push(" OFFSET ");
        select.push_bind(query.offset.unwrap_or(0).max(0));

        let rows = select
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Self::query_error("SELECT stored_workflows index", format!("{e}")))?;
        let workflows = self.assemble_workflows(&rows).await?;

        let total = if include_total_count {
            let mut count = QueryBuilder::<Sqlite>::new(
                "SELECT COUNT(*) AS total FROM stored_workflows sw JOIN users u ON u.id = sw.user_id WHERE 1 = 1",
            );
            push_index_filters(&mut count, user_id, query, &terms);
            let total: i64 = count
                .build()
                .fetch_one(&self.pool)
                .await
                .map_err(|e| Self::query_error("COUNT stored_workflows index", format!("{e}")))?
                .get("total");
            Some(total)
        } else {
            None
        };

        tracing::debug!(?user_id, returned = workflows.len(), ?total, "workflow index query");
        Ok((workflows, total))
    }

    /// Get a stored workflow with its latest version and annotations.
    pub async fn get_stored_workflow(&self, id: i64) -> Result<Option<StoredWorkflow>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {STORED_COLUMNS} FROM stored_workflows sw JOIN users u ON u.id = sw.user_id
             WHERE sw.id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Self::query_error("SELECT stored_workflows", format!("{e}")))?;

        match row {
            Some(row) => Ok(self.assemble_workflows(&[row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Attach latest versions and annotations to stored workflow rows, with
    /// one query per batch of ids rather than per workflow.
    async fn assemble_workflows(&self, rows: &[SqliteRow]) -> Result<Vec<StoredWorkflow>, StorageError> {
        let stored_ids: Vec<i64> = rows.iter().map(|r| r.get("id")).collect();
        let latest_ids: Vec<i64> = rows
            .iter()
            .filter_map(|r| r.get::<Option<i64>, _>("latest_workflow_id"))
            .collect();

        let mut versions: HashMap<i64, StoredWorkflowVersion> = HashMap::with_capacity(latest_ids.len());
        for chunk in latest_ids.chunks(IN_CHUNK) {
            let mut qb = QueryBuilder::<Sqlite>::new(format!(
                "SELECT {VERSION_COLUMNS} FROM workflows WHERE id IN ("
            ));
            let mut ids = qb.separated(", ");
            for id in chunk {
                ids.push_bind(*id);
            }
            ids.push_unseparated(")");
            for row in qb
                .build()
                .fetch_all(&self.pool)
                .await
                .map_err(|e| Self::query_error("SELECT workflows latest", format!("{e}")))?
            {
                let version = Self::row_to_version(&row)?;
                versions.insert(version.id, version);
            }
        }

        let mut annotations: HashMap<i64, Vec<String>> = HashMap::new();
        for chunk in stored_ids.chunks(IN_CHUNK) {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "SELECT stored_workflow_id, annotation FROM workflow_annotations WHERE stored_workflow_id IN (",
            );
            let mut ids = qb.separated(", ");
            for id in chunk {
                ids.push_bind(*id);
            }
            ids.push_unseparated(")");
            qb.push(" ORDER BY id");
            for row in qb
                .build()
                .fetch_all(&self.pool)
                .await
                .map_err(|e| Self::query_error("SELECT workflow_annotations", format!("{e}")))?
            {
                annotations
                    .entry(row.get("stored_workflow_id"))
                    .or_default()
                    .push(row.get("annotation"));
            }
        }

        rows.iter()
            .map(|row| {
                let id: i64 = row.get("id");
                let latest = row
                    .get::<Option<i64>, _>("latest_workflow_id")
                    .and_then(|version_id| versions.remove(&version_id))
                    .ok_or_else(|| StorageError::Internal {
                        message: format!("Stored workflow {id} has no latest version"),
                    })?;
                let create_time: String = row.get("create_time");
                let update_time: String = row.get("update_time");

                Ok(StoredWorkflow {
                    id,
                    user_id: row.get("user_id"),
                    owner: row.get("owner"),
                    name: row.get("name"),
                    slug: row.get("slug"),
                    deleted: row.get("deleted"),
                    hidden: row.get("hidden"),
                    published: row.get("published"),
                    importable: row.get("importable"),
                    annotations: annotations.remove(&id).unwrap_or_default(),
                    latest,
                    create_time: Self::parse_datetime(&create_time)?,
                    update_time: Self::parse_datetime(&update_time)?,
                })
            })
            .collect()
    }

    /// Get the stored workflow owning a specific version.
    pub async fn get_stored_workflow_by_version(
        &self,
        workflow_id: i64,
    ) -> Result<Option<StoredWorkflow>, StorageError> {
        let stored_id: Option<i64> =
            sqlx::query("SELECT stored_workflow_id FROM workflows WHERE id = ?")
                .bind(workflow_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| Self::query_error("SELECT workflows owner", format!("{e}")))?
                .map(|r| r.get("stored_workflow_id"));

        match stored_id {
            Some(id) => self.get_stored_workflow(id).await,
            None => Ok(None),
        }
    }

    /// Create a stored workflow and its first version.
    pub async fn create_stored_workflow(
        &self,
        workflow: &NewWorkflow,
    ) -> Result<StoredWorkflow, StorageError> {
        let now = Self::format_datetime(&Utc::now());
        let steps = Self::to_json("steps", &workflow.steps)?;
        let source_metadata = workflow
            .source_metadata
            .as_ref()
            .map(|m| Self::to_json("source_metadata", m))
            .transpose()?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Self::query_error("BEGIN create workflow", format!("{e}")))?;

        let stored_id: i64 = sqlx::query(
            "INSERT INTO stored_workflows (user_id, name, hidden, published, importable, create_time, update_time)
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(workflow.user_id)
        .bind(&workflow.name)
        .bind(workflow.hidden)
        .bind(workflow.published)
        .bind(workflow.importable || workflow.published)
        .bind(&now)
        .bind(&now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Self::query_error("INSERT stored_workflows", format!("{e}")))?
        .get("id");

        let version_id: i64 = sqlx::query(
            "INSERT INTO workflows (stored_workflow_id, steps, source_metadata, create_time, update_time)
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(stored_id)
        .bind(&steps)
        .bind(&source_metadata)
        .bind(&now)
        .bind(&now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Self::query_error("INSERT workflows", format!("{e}")))?
        .get("id");

        sqlx::query("UPDATE stored_workflows SET latest_workflow_id = ? WHERE id = ?")
            .bind(version_id)
            .bind(stored_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Self::query_error("UPDATE stored_workflows latest", format!("{e}")))?;

        if let Some(annotation) = workflow.annotation.as_deref().filter(|a| !a.is_empty()) {
            sqlx::query(
                "INSERT INTO workflow_annotations (stored_workflow_id, user_id, annotation) VALUES (?, ?, ?)",
            )
            .bind(stored_id)
            .bind(workflow.user_id)
            .bind(annotation)
            .execute(&mut *tx)
            .await
            .map_err(|e| Self::query_error("INSERT workflow_annotations", format!("{e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| Self::query_error("COMMIT create workflow", format!("{e}")))?;

        tracing::debug!(stored_workflow_id = stored_id, name = %workflow.name, "workflow created");

        self.get_stored_workflow(stored_id)
            .await?
            .ok_or_else(|| StorageError::Internal {
                message: format!("Stored workflow {stored_id} vanished after creation"),
            })
    }

    /// Append a version to a stored workflow, optionally renaming it.
    ///
    /// When `update.steps` is `None` the latest steps are carried over.
    pub async fn add_workflow_version(
        &self,
        stored_workflow_id: i64,
        update: &WorkflowUpdate,
    ) -> Result<StoredWorkflow, StorageError> {
        let current = self
            .get_stored_workflow(stored_workflow_id)
            .await?
            .ok_or_else(|| StorageError::Internal {
                message: format!("Stored workflow {stored_workflow_id} does not exist"),
            })?;

        let steps = update.steps.as_ref().unwrap_or(&current.latest.steps);
        let steps = Self::to_json("steps", steps)?;
        let source_metadata = update
            .source_metadata
            .as_ref()
            .or(current.latest.source_metadata.as_ref())
            .map(|m| Self::to_json("source_metadata", m))
            .transpose()?;
        let now = Self::format_datetime(&Utc::now());

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Self::query_error("BEGIN add version", format!("{e}")))?;

        let version_id: i64 = sqlx::query(
            "INSERT INTO workflows (stored_workflow_id, steps, source_metadata, create_time, update_time)
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(stored_workflow_id)
        .bind(&steps)
        .bind(&source_metadata)
        .bind(&now)
        .bind(&now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Self::query_error("INSERT workflows", format!("{e}")))?
        .get("id");

        sqlx::query(
            "UPDATE stored_workflows SET latest_workflow_id = ?, name = COALESCE(?, name), update_time = ?
             WHERE id = ?",
        )
        .bind(version_id)
        .bind(&update.name)
        .bind(&now)
        .bind(stored_workflow_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Self::query_error("UPDATE stored_workflows version", format!("{e}")))?;

        tx.commit()
            .await
            .map_err(|e| Self::query_error("COMMIT add version", format!("{e}")))?;

        self.get_stored_workflow(stored_workflow_id)
            .await?
            .ok_or_else(|| StorageError::Internal {
                message: format!("Stored workflow {stored_workflow_id} vanished after update"),
            })
    }

    /// Set the soft-delete flag of a stored workflow.
    pub async fn set_workflow_deleted(&self, id: i64, deleted: bool) -> Result<(), StorageError> {
        sqlx::query("UPDATE stored_workflows SET deleted = ?, update_time = ? WHERE id = ?")
            .bind(deleted)
            .bind(Self::format_datetime(&Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Self::query_error("UPDATE stored_workflows deleted", format!("{e}")))?;
        Ok(())
    }

    /// All versions of a stored workflow, oldest first.
    pub async fn get_workflow_versions(
        &self,
        stored_workflow_id: i64,
    ) -> Result<Vec<StoredWorkflowVersion>, StorageError> {
        sqlx::query(&format!(
            "SELECT {VERSION_COLUMNS} FROM workflows WHERE stored_workflow_id = ? ORDER BY id"
        ))
        .bind(stored_workflow_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::query_error("SELECT workflows versions", format!("{e}")))?
        .iter()
        .map(Self::row_to_version)
        .collect()
    }

    /// Invocation counts per state across all versions.
    pub async fn get_invocation_counts(
        &self,
        stored_workflow_id: i64,
    ) -> Result<BTreeMap<String, i64>, StorageError> {
        let rows = sqlx::query(
            "SELECT wi.state, COUNT(*) AS n
             FROM workflow_invocations wi JOIN workflows w ON w.id = wi.workflow_id
             WHERE w.stored_workflow_id = ?
             GROUP BY wi.state",
        )
        .bind(stored_workflow_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::query_error("SELECT workflow_invocations counts", format!("{e}")))?;

        Ok(rows
            .iter()
            .map(|r| (r.get::<String, _>("state"), r.get::<i64, _>("n")))
            .collect())
    }

    /// Record an invocation of a workflow version.
    pub async fn record_invocation(&self, workflow_id: i64, state: &str) -> Result<i64, StorageError> {
        let id: i64 = sqlx::query(
            "INSERT INTO workflow_invocations (workflow_id, state, create_time) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(workflow_id)
        .bind(state)
        .bind(Self::format_datetime(&Utc::now()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Self::query_error("INSERT workflow_invocations", format!("{e}")))?
        .get("id");
        Ok(id)
    }

    /// Stored workflow ids in a user's menu, in menu order.
    pub async fn get_menu_entries(&self, user_id: i64) -> Result<Vec<i64>, StorageError> {
        Ok(sqlx::query(
            "SELECT stored_workflow_id FROM workflow_menu_entries WHERE user_id = ? ORDER BY order_index",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::query_error("SELECT workflow_menu_entries", format!("{e}")))?
        .iter()
        .map(|r| r.get("stored_workflow_id"))
        .collect())
    }

    /// Replace a user's menu entries. Duplicate ids keep their first position.
    pub async fn set_menu_entries(
        &self,
        user_id: i64,
        stored_workflow_ids: Vec<i64>,
    ) -> Result<(), StorageError> {
        let mut seen = std::collections::HashSet::new();
        let ids: Vec<i64> = stored_workflow_ids
            .into_iter()
            .filter(|id| seen.insert(*id))
            .collect();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Self::query_error("BEGIN set menu", format!("{e}")))?;

        sqlx::query("DELETE FROM workflow_menu_entries WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Self::query_error("DELETE workflow_menu_entries", format!("{e}")))?;

        for (index, id) in ids.iter().enumerate() {
            sqlx::query(
                "INSERT INTO workflow_menu_entries (user_id, stored_workflow_id, order_index) VALUES (?, ?, ?)",
            )
            .bind(user_id)
            .bind(id)
            .bind(i64::try_from(index).unwrap_or(i64::MAX))
            .execute(&mut *tx)
            .await
            .map_err(|e| Self::query_error("INSERT workflow_menu_entries", format!("{e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| Self::query_error("COMMIT set menu", format!("{e}")))
    }

    fn row_to_version(row: &SqliteRow) -> Result<StoredWorkflowVersion, StorageError> {
        let steps: String = row.get("steps");
        let source_metadata: Option<String> = row.get("source_metadata");
        let create_time: String = row.get("create_time");
        let update_time: String = row.get("update_time");

        Ok(StoredWorkflowVersion {
            id: row.get("id"),
            stored_workflow_id: row.get("stored_workflow_id"),
            steps: Self::parse_json::<Vec<WorkflowStep>>("steps", &steps)?,
            source_metadata: source_metadata
                .as_deref()
                .map(|m| Self::parse_json("source_metadata", m))
                .transpose()?,
            create_time: Self::parse_datetime(&create_time)?,
            update_time: Self::parse_datetime(&update_time)?,
        })
    }
}

/// Append the access and search predicates shared by the listing and its count.
fn push_index_filters(
    qb: &mut QueryBuilder<'_, Sqlite>,
    user_id: Option<i64>,
    query: &WorkflowIndexQuery,
    terms: &[SearchTerm],
) {
    let wants_deleted = query.show_deleted || terms.contains(&SearchTerm::Deleted);

    match user_id {
        None => {
            qb.push(" AND sw.published = 1 AND sw.deleted = 0");
        }
        Some(uid) => {
            qb.push(" AND (sw.user_id = ");
            qb.push_bind(uid);
            if query.show_published {
                qb.push(" OR sw.published = 1");
            }
            if query.show_shared {
                qb.push(
                    " OR EXISTS (SELECT 1 FROM item_shares s WHERE s.item_type = 'workflow' AND s.item_id = sw.id AND s.user_id = ",
                );
                qb.push_bind(uid);
                qb.push(")");
            }
            qb.push(")");
            qb.push(" AND sw.deleted = ");
            qb.push_bind(wants_deleted);
        }
    }

    if !query.show_hidden {
        qb.push(" AND sw.hidden = 0");
    }

    for term in terms {
        match term {
            SearchTerm::Name(text) | SearchTerm::Text(text) => {
                qb.push(" AND instr(lower(sw.name), lower(");
                qb.push_bind(text.clone());
                qb.push(")) > 0");
            }
            SearchTerm::Owner(name) => {
                qb.push(" AND lower(u.username) = lower(");
                qb.push_bind(name.clone());
                qb.push(")");
            }
            SearchTerm::Published => {
                qb.push(" AND sw.published = 1");
            }
            SearchTerm::SharedWithMe => {
                qb.push(
                    " AND EXISTS (SELECT 1 FROM item_shares s WHERE s.item_type = 'workflow' AND s.item_id = sw.id AND s.user_id = ",
                );
                qb.push_bind(user_id.unwrap_or(0));
                qb.push(")");
            }
            SearchTerm::Bookmarked => {
                qb.push(
                    " AND EXISTS (SELECT 1 FROM workflow_menu_entries m WHERE m.stored_workflow_id = sw.id AND m.user_id = ",
                );
                qb.push_bind(user_id.unwrap_or(0));
                qb.push(")");
            }
            SearchTerm::Deleted => {}
        }
    }
}
