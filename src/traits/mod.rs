//! Trait definitions for mockable dependencies.
//!
//! This module defines traits for:
//! - [`UserStore`]: user account lookups
//! - [`WorkflowStore`]: workflow queries, access data and soft deletion
//! - [`SharingStore`]: shareable items and their share lists
//! - [`NotificationStore`]: notification persistence
//! - [`TimeProvider`]: time abstraction for testing
//!
//! # Mocking
//!
//! All traits are annotated with `#[cfg_attr(test, mockall::automock)]`
//! which generates mock implementations automatically for testing.
//!
//! # Example
//!
//! ```
//! use flowhub::traits::{TimeProvider, RealTimeProvider};
//!
//! let time_provider = RealTimeProvider;
//! let now = time_provider.now();
//! println!("Current time: {now}");
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::storage::{
    ItemType, NewItem, NewNotification, NewWorkflow, NotificationCategory, StoredItem,
    StoredNotification, StoredPreference, StoredUser, StoredUserNotification, StoredWorkflow,
    StoredWorkflowVersion, UserNotificationChanges, WorkflowUpdate,
};
use crate::workflows::WorkflowIndexQuery;

/// User account storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create a user with a fresh API key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails (including
    /// duplicate username or email).
    async fn create_user(&self, username: &str, email: &str) -> Result<StoredUser, StorageError>;

    /// Get a user by id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn get_user(&self, id: i64) -> Result<Option<StoredUser>, StorageError>;

    /// Get a user by email (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<StoredUser>, StorageError>;

    /// Get the user owning an API key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn get_user_by_api_key(&self, api_key: &str)
        -> Result<Option<StoredUser>, StorageError>;
}

/// Workflow storage and query execution.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Run an index query with access control applied for `user_id`
    /// (`None` = anonymous). The total is only computed when requested.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn index_query(
        &self,
        user_id: Option<i64>,
        query: &WorkflowIndexQuery,
        include_total_count: bool,
    ) -> Result<(Vec<StoredWorkflow>, Option<i64>), StorageError>;

    /// Get a stored workflow by id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn get_stored_workflow(&self, id: i64) -> Result<Option<StoredWorkflow>, StorageError>;

    /// Get the stored workflow owning a specific version.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn get_stored_workflow_by_version(
        &self,
        workflow_id: i64,
    ) -> Result<Option<StoredWorkflow>, StorageError>;

    /// Create a stored workflow with its first version.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn create_stored_workflow(
        &self,
        workflow: &NewWorkflow,
    ) -> Result<StoredWorkflow, StorageError>;

    /// Append a version to a stored workflow.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn add_workflow_version(
        &self,
        stored_workflow_id: i64,
        update: &WorkflowUpdate,
    ) -> Result<StoredWorkflow, StorageError>;

    /// Set the soft-delete flag.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn set_workflow_deleted(&self, id: i64, deleted: bool) -> Result<(), StorageError>;

    /// All versions of a stored workflow, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn get_workflow_versions(
        &self,
        stored_workflow_id: i64,
    ) -> Result<Vec<StoredWorkflowVersion>, StorageError>;

    /// Invocation state → count, across all versions.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn get_invocation_counts(
        &self,
        stored_workflow_id: i64,
    ) -> Result<BTreeMap<String, i64>, StorageError>;

    /// Record an invocation of a specific version.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn record_invocation(&self, workflow_id: i64, state: &str) -> Result<i64, StorageError>;

    /// Stored workflow ids in a user's tool-panel menu, in menu order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn get_menu_entries(&self, user_id: i64) -> Result<Vec<i64>, StorageError>;

    /// Replace a user's menu entries.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn set_menu_entries(
        &self,
        user_id: i64,
        stored_workflow_ids: Vec<i64>,
    ) -> Result<(), StorageError>;
}

/// Shareable items and share lists.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SharingStore: Send + Sync {
    /// Create a history, page or visualization.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn create_item(&self, item: &NewItem) -> Result<StoredItem, StorageError>;

    /// Get any shareable item, workflows included.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn get_item(
        &self,
        item_type: ItemType,
        id: i64,
    ) -> Result<Option<StoredItem>, StorageError>;

    /// Users an item is shared with, in share order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn get_shared_users(
        &self,
        item_type: ItemType,
        id: i64,
    ) -> Result<Vec<StoredUser>, StorageError>;

    /// Replace the share list of an item.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn set_shared_users(
        &self,
        item_type: ItemType,
        id: i64,
        user_ids: Vec<i64>,
    ) -> Result<(), StorageError>;

    /// Whether an item is shared with a user.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn is_shared_with(
        &self,
        item_type: ItemType,
        id: i64,
        user_id: i64,
    ) -> Result<bool, StorageError>;
}

/// Notification persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Create a notification and one association per recipient.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn create_notification(
        &self,
        notification: &NewNotification,
        recipient_ids: Vec<i64>,
    ) -> Result<StoredNotification, StorageError>;

    /// One non-deleted, published, unexpired notification of a user.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn get_user_notification(
        &self,
        user_id: i64,
        notification_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<StoredUserNotification>, StorageError>;

    /// A user's non-deleted, published, unexpired notifications, newest
    /// first, optionally only those changed since a point in time.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn get_user_notifications(
        &self,
        user_id: i64,
        since: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<StoredUserNotification>, StorageError>;

    /// Number of unseen, non-deleted, published, unexpired notifications.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn count_unread(&self, user_id: i64, now: DateTime<Utc>) -> Result<i64, StorageError>;

    /// Apply changes to some of a user's notifications; returns how many
    /// associations were updated.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn update_user_notifications(
        &self,
        user_id: i64,
        notification_ids: Vec<i64>,
        changes: UserNotificationChanges,
        now: DateTime<Utc>,
    ) -> Result<u64, StorageError>;

    /// One active broadcast.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn get_broadcast(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<StoredNotification>, StorageError>;

    /// Active broadcasts, optionally only those changed since a point in time.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn get_active_broadcasts(
        &self,
        since: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Vec<StoredNotification>, StorageError>;

    /// A user's stored preferences (categories never set are absent).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn get_preferences(&self, user_id: i64) -> Result<Vec<StoredPreference>, StorageError>;

    /// Insert or replace preferences.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn upsert_preferences(
        &self,
        user_id: i64,
        preferences: Vec<StoredPreference>,
    ) -> Result<(), StorageError>;

    /// Which of `user_ids` disabled `category`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn users_with_category_disabled(
        &self,
        user_ids: Vec<i64>,
        category: NotificationCategory,
    ) -> Result<Vec<i64>, StorageError>;

    /// Delete expired notifications; returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, StorageError>;
}

/// Time provider trait for deterministic testing.
///
/// This trait abstracts time operations to allow for
/// deterministic testing by providing fixed timestamps.
#[cfg_attr(test, mockall::automock)]
pub trait TimeProvider: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Real time provider using system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealTimeProvider;

impl TimeProvider for RealTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
