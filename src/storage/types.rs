//! Storage types for database operations.
//!
//! This module defines the types stored in the database:
//! - [`StoredUser`]: User accounts
//! - [`StoredWorkflow`] / [`StoredWorkflowVersion`]: Workflows and their versions
//! - [`StoredItem`]: Shareable items (histories, workflows, pages, visualizations)
//! - [`StoredNotification`] / [`StoredUserNotification`]: Notifications and
//!   per-recipient state
//! - [`StoredPreference`]: Per-user notification preferences

#![allow(clippy::should_implement_trait)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// User account stored in database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredUser {
    /// Database id.
    pub id: i64,
    /// Public user name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// API key used to authenticate requests.
    pub api_key: String,
    /// Creation timestamp.
    pub create_time: DateTime<Utc>,
}

/// A single step of a workflow definition.
///
/// Only the fields needed for listing and tool analysis are modelled;
/// anything else in the stored JSON is kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WorkflowStep {
    /// Step type (`tool`, `subworkflow`, `data_input`, ...).
    #[serde(rename = "type", default = "default_step_type")]
    pub step_type: String,
    /// Tool id for tool steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<String>,
    /// Tool version for tool steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_version: Option<String>,
    /// Optional step label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Nested steps for subworkflow steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subworkflow: Option<Vec<WorkflowStep>>,
    /// Unmodelled step fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn default_step_type() -> String {
    "tool".to_string()
}

impl WorkflowStep {
    /// A tool step.
    #[must_use]
    pub fn tool(tool_id: impl Into<String>, tool_version: impl Into<String>) -> Self {
        Self {
            step_type: "tool".to_string(),
            tool_id: Some(tool_id.into()),
            tool_version: Some(tool_version.into()),
            ..Self::default()
        }
    }

    /// A subworkflow step.
    #[must_use]
    pub fn subworkflow(steps: Vec<Self>) -> Self {
        Self {
            step_type: "subworkflow".to_string(),
            subworkflow: Some(steps),
            ..Self::default()
        }
    }

    /// A data input step.
    #[must_use]
    pub fn data_input(label: impl Into<String>) -> Self {
        Self {
            step_type: "data_input".to_string(),
            label: Some(label.into()),
            ..Self::default()
        }
    }
}

/// One version of a stored workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredWorkflowVersion {
    /// Database id of this version.
    pub id: i64,
    /// Owning stored workflow.
    pub stored_workflow_id: i64,
    /// Steps of this version.
    pub steps: Vec<WorkflowStep>,
    /// Where the workflow came from (TRS, URL import...), if known.
    pub source_metadata: Option<Value>,
    /// Creation timestamp.
    pub create_time: DateTime<Utc>,
    /// Last update timestamp.
    pub update_time: DateTime<Utc>,
}

impl StoredWorkflowVersion {
    /// Number of top-level steps.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

/// Stored workflow with its latest version loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredWorkflow {
    /// Database id.
    pub id: i64,
    /// Owner's user id.
    pub user_id: i64,
    /// Owner's username.
    pub owner: String,
    /// Workflow name.
    pub name: String,
    /// Optional URL slug.
    pub slug: Option<String>,
    /// Soft-delete flag.
    pub deleted: bool,
    /// Hidden from default listings.
    pub hidden: bool,
    /// Listed publicly.
    pub published: bool,
    /// Accessible by link.
    pub importable: bool,
    /// Annotation texts, oldest first.
    pub annotations: Vec<String>,
    /// Latest version.
    pub latest: StoredWorkflowVersion,
    /// Creation timestamp.
    pub create_time: DateTime<Utc>,
    /// Last update timestamp.
    pub update_time: DateTime<Utc>,
}

/// Input for creating a stored workflow.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewWorkflow {
    /// Owner's user id.
    pub user_id: i64,
    /// Workflow name.
    pub name: String,
    /// Optional annotation.
    pub annotation: Option<String>,
    /// Steps of the first version.
    pub steps: Vec<WorkflowStep>,
    /// Source metadata of the first version.
    pub source_metadata: Option<Value>,
    /// Hidden flag.
    pub hidden: bool,
    /// Published flag.
    pub published: bool,
    /// Importable flag.
    pub importable: bool,
}

/// Input for creating a new workflow version.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkflowUpdate {
    /// New name, if renaming.
    pub name: Option<String>,
    /// Steps of the new version; `None` copies the latest steps.
    pub steps: Option<Vec<WorkflowStep>>,
    /// Source metadata of the new version.
    pub source_metadata: Option<Value>,
}

/// Kind of shareable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// A history.
    History,
    /// A stored workflow.
    Workflow,
    /// A page.
    Page,
    /// A visualization.
    Visualization,
}

impl ItemType {
    /// Convert to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::History => "history",
            Self::Workflow => "workflow",
            Self::Page => "page",
            Self::Visualization => "visualization",
        }
    }

    /// URL collection of this kind (`/histories`, `/workflows`, ...).
    #[must_use]
    pub const fn collection(&self) -> &'static str {
        match self {
            Self::History => "histories",
            Self::Workflow => "workflows",
            Self::Page => "pages",
            Self::Visualization => "visualizations",
        }
    }

    /// Table holding items of this kind.
    #[must_use]
    pub const fn table(&self) -> &'static str {
        match self {
            Self::History => "histories",
            Self::Workflow => "stored_workflows",
            Self::Page => "pages",
            Self::Visualization => "visualizations",
        }
    }
}

/// A shareable item as seen by the sharing service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredItem {
    /// Kind of item.
    pub item_type: ItemType,
    /// Database id.
    pub id: i64,
    /// Owner's user id.
    pub user_id: i64,
    /// Owner's username.
    pub owner: String,
    /// Name or title.
    pub name: String,
    /// Optional URL slug.
    pub slug: Option<String>,
    /// Accessible by link.
    pub importable: bool,
    /// Listed publicly.
    pub published: bool,
}

/// Input for creating a shareable item other than a workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewItem {
    /// A history.
    History {
        /// Owner's user id.
        user_id: i64,
        /// History name.
        name: String,
    },
    /// A page.
    Page {
        /// Owner's user id.
        user_id: i64,
        /// Page title.
        title: String,
        /// URL slug.
        slug: String,
    },
    /// A visualization.
    Visualization {
        /// Owner's user id.
        user_id: i64,
        /// Visualization title.
        title: String,
        /// URL slug.
        slug: Option<String>,
        /// Visualization plugin type.
        vis_type: String,
        /// Genome build.
        dbkey: Option<String>,
    },
}

impl NewItem {
    /// Kind of item being created.
    #[must_use]
    pub const fn item_type(&self) -> ItemType {
        match self {
            Self::History { .. } => ItemType::History,
            Self::Page { .. } => ItemType::Page,
            Self::Visualization { .. } => ItemType::Visualization,
        }
    }
}

/// Notification category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    /// Free-form message.
    Message,
    /// Someone shared an item with the recipient.
    NewSharedItem,
    /// Broadcast to everyone.
    Broadcast,
}

impl NotificationCategory {
    /// Categories users may opt out of.
    pub const PERSONAL: [Self; 2] = [Self::Message, Self::NewSharedItem];

    /// Convert to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::NewSharedItem => "new_shared_item",
            Self::Broadcast => "broadcast",
        }
    }

    /// Parse from string.
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "message" => Some(Self::Message),
            "new_shared_item" => Some(Self::NewSharedItem),
            "broadcast" => Some(Self::Broadcast),
            _ => None,
        }
    }
}

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationVariant {
    /// Informational.
    #[default]
    Info,
    /// Needs attention.
    Warning,
    /// Needs immediate attention.
    Urgent,
}

impl NotificationVariant {
    /// Convert to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Urgent => "urgent",
        }
    }

    /// Parse from string.
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Self::Info),
            "warning" => Some(Self::Warning),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

/// Notification stored in database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredNotification {
    /// Database id.
    pub id: i64,
    /// Free-form origin tag.
    pub source: String,
    /// Category.
    pub category: NotificationCategory,
    /// Severity.
    pub variant: NotificationVariant,
    /// Category-specific content (JSON).
    pub content: Value,
    /// When the notification becomes visible.
    pub publication_time: DateTime<Utc>,
    /// When the notification disappears.
    pub expiration_time: DateTime<Utc>,
    /// Creation timestamp.
    pub create_time: DateTime<Utc>,
    /// Last update timestamp.
    pub update_time: DateTime<Utc>,
}

/// Input for creating a notification.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    /// Free-form origin tag.
    pub source: String,
    /// Category.
    pub category: NotificationCategory,
    /// Severity.
    pub variant: NotificationVariant,
    /// Category-specific content (JSON).
    pub content: Value,
    /// When the notification becomes visible.
    pub publication_time: DateTime<Utc>,
    /// When the notification disappears.
    pub expiration_time: DateTime<Utc>,
}

/// A notification together with one recipient's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredUserNotification {
    /// The notification.
    pub notification: StoredNotification,
    /// Recipient.
    pub user_id: i64,
    /// When the recipient marked it seen.
    pub seen_time: Option<DateTime<Utc>>,
    /// Whether the recipient deleted it.
    pub deleted: bool,
    /// Last change of the recipient's state.
    pub update_time: DateTime<Utc>,
}

/// Changes a recipient can apply to their notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserNotificationChanges {
    /// Mark seen (`true`) or unseen (`false`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seen: Option<bool>,
    /// Mark deleted (`true`) or restore (`false`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
}

impl UserNotificationChanges {
    /// Whether nothing would change.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.seen.is_none() && self.deleted.is_none()
    }
}

/// One notification preference row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPreference {
    /// Category the preference applies to.
    pub category: NotificationCategory,
    /// Whether notifications of this category are delivered.
    pub enabled: bool,
    /// Whether the push channel is enabled.
    pub push: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_type_names() {
        for item_type in [
            ItemType::History,
            ItemType::Workflow,
            ItemType::Page,
            ItemType::Visualization,
        ] {
            assert_eq!(serde_json::to_value(item_type).unwrap(), json!(item_type.as_str()));
        }
        assert_eq!(ItemType::Visualization.collection(), "visualizations");
        assert_eq!(ItemType::Workflow.table(), "stored_workflows");
    }

    #[test]
    fn test_notification_category_strings() {
        assert_eq!(NotificationCategory::NewSharedItem.as_str(), "new_shared_item");
        assert_eq!(
            NotificationCategory::from_str("broadcast"),
            Some(NotificationCategory::Broadcast)
        );
        assert_eq!(NotificationCategory::from_str("unknown"), None);
        assert_eq!(
            serde_json::to_value(NotificationCategory::NewSharedItem).unwrap(),
            json!("new_shared_item")
        );
    }

    #[test]
    fn test_notification_variant_default() {
        assert_eq!(NotificationVariant::default(), NotificationVariant::Info);
        assert_eq!(NotificationVariant::from_str("urgent"), Some(NotificationVariant::Urgent));
    }

    #[test]
    fn test_workflow_step_keeps_unknown_fields() {
        let step: WorkflowStep = serde_json::from_value(json!({
            "type": "tool",
            "tool_id": "cat1",
            "position": {"left": 10, "top": 20}
        }))
        .unwrap();
        assert_eq!(step.tool_id.as_deref(), Some("cat1"));
        assert!(step.extra.contains_key("position"));

        let back = serde_json::to_value(&step).unwrap();
        assert_eq!(back["position"]["left"], 10);
    }

    #[test]
    fn test_workflow_step_type_defaults_to_tool() {
        let step: WorkflowStep = serde_json::from_value(json!({"tool_id": "cat1"})).unwrap();
        assert_eq!(step.step_type, "tool");
    }

    #[test]
    fn test_user_notification_changes_is_empty() {
        assert!(UserNotificationChanges::default().is_empty());
        assert!(!UserNotificationChanges {
            seen: Some(true),
            deleted: None
        }
        .is_empty());
    }

    #[test]
    fn test_new_item_type() {
        let item = NewItem::Page {
            user_id: 1,
            title: "t".into(),
            slug: "s".into(),
        };
        assert_eq!(item.item_type(), ItemType::Page);
    }
}
