//! Store trait implementations for `SqliteStorage`.

#![allow(clippy::missing_errors_doc)]

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::traits::{NotificationStore, SharingStore, UserStore, WorkflowStore};
use crate::workflows::WorkflowIndexQuery;

use super::core::SqliteStorage;
use super::types::{
    ItemType, NewItem, NewNotification, NewWorkflow, NotificationCategory, StoredItem,
    StoredNotification, StoredPreference, StoredUser, StoredUserNotification, StoredWorkflow,
    StoredWorkflowVersion, UserNotificationChanges, WorkflowUpdate,
};

#[async_trait]
impl UserStore for SqliteStorage {
    async fn create_user(&self, username: &str, email: &str) -> Result<StoredUser, StorageError> {
        Self::create_user(self, username, email).await
    }

    async fn get_user(&self, id: i64) -> Result<Option<StoredUser>, StorageError> {
        Self::get_user(self, id).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<StoredUser>, StorageError> {
        Self::get_user_by_email(self, email).await
    }

    async fn get_user_by_api_key(
        &self,
        api_key: &str,
    ) -> Result<Option<StoredUser>, StorageError> {
        Self::get_user_by_api_key(self, api_key).await
    }
}

#[async_trait]
impl WorkflowStore for SqliteStorage {
    async fn index_query(
        &self,
        user_id: Option<i64>,
        query: &WorkflowIndexQuery,
        include_total_count: bool,
    ) -> Result<(Vec<StoredWorkflow>, Option<i64>), StorageError> {
        Self::index_query(self, user_id, query, include_total_count).await
    }

    async fn get_stored_workflow(&self, id: i64) -> Result<Option<StoredWorkflow>, StorageError> {
        Self::get_stored_workflow(self, id).await
    }

    async fn get_stored_workflow_by_version(
        &self,
        workflow_id: i64,
    ) -> Result<Option<StoredWorkflow>, StorageError> {
        Self::get_stored_workflow_by_version(self, workflow_id).await
    }

    async fn create_stored_workflow(
        &self,
        workflow: &NewWorkflow,
    ) -> Result<StoredWorkflow, StorageError> {
        Self::create_stored_workflow(self, workflow).await
    }

    async fn add_workflow_version(
        &self,
        stored_workflow_id: i64,
        update: &WorkflowUpdate,
    ) -> Result<StoredWorkflow, StorageError> {
        Self::add_workflow_version(self, stored_workflow_id, update).await
    }

    async fn set_workflow_deleted(&self, id: i64, deleted: bool) -> Result<(), StorageError> {
        Self::set_workflow_deleted(self, id, deleted).await
    }

    async fn get_workflow_versions(
        &self,
        stored_workflow_id: i64,
    ) -> Result<Vec<StoredWorkflowVersion>, StorageError> {
        Self::get_workflow_versions(self, stored_workflow_id).await
    }

    async fn get_invocation_counts(
        &self,
        stored_workflow_id: i64,
    ) -> Result<BTreeMap<String, i64>, StorageError> {
        Self::get_invocation_counts(self, stored_workflow_id).await
    }

    async fn record_invocation(&self, workflow_id: i64, state: &str) -> Result<i64, StorageError> {
        Self::record_invocation(self, workflow_id, state).await
    }

    async fn get_menu_entries(&self, user_id: i64) -> Result<Vec<i64>, StorageError> {
        Self::get_menu_entries(self, user_id).await
    }

    async fn set_menu_entries(
        &self,
        user_id: i64,
        stored_workflow_ids: Vec<i64>,
    ) -> Result<(), StorageError> {
        Self::set_menu_entries(self, user_id, stored_workflow_ids).await
    }
}

#[async_trait]
impl SharingStore for SqliteStorage {
    async fn create_item(&self, item: &NewItem) -> Result<StoredItem, StorageError> {
        Self::create_item(self, item).await
    }

    async fn get_item(
        &self,
        item_type: ItemType,
        id: i64,
    ) -> Result<Option<StoredItem>, StorageError> {
        Self::get_item(self, item_type, id).await
    }

    async fn get_shared_users(
        &self,
        item_type: ItemType,
        id: i64,
    ) -> Result<Vec<StoredUser>, StorageError> {
        Self::get_shared_users(self, item_type, id).await
    }

    async fn set_shared_users(
        &self,
        item_type: ItemType,
        id: i64,
        user_ids: Vec<i64>,
    ) -> Result<(), StorageError> {
        Self::set_shared_users(self, item_type, id, user_ids).await
    }

    async fn is_shared_with(
        &self,
        item_type: ItemType,
        id: i64,
        user_id: i64,
    ) -> Result<bool, StorageError> {
        Self::is_shared_with(self, item_type, id, user_id).await
    }
}

#[async_trait]
impl NotificationStore for SqliteStorage {
    async fn create_notification(
        &self,
        notification: &NewNotification,
        recipient_ids: Vec<i64>,
    ) -> Result<StoredNotification, StorageError> {
        Self::create_notification(self, notification, recipient_ids).await
    }

    async fn get_user_notification(
        &self,
        user_id: i64,
        notification_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<StoredUserNotification>, StorageError> {
        Self::get_user_notification(self, user_id, notification_id, now).await
    }

    async fn get_user_notifications(
        &self,
        user_id: i64,
        since: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<StoredUserNotification>, StorageError> {
        Self::get_user_notifications(self, user_id, since, now, limit, offset).await
    }

    async fn count_unread(&self, user_id: i64, now: DateTime<Utc>) -> Result<i64, StorageError> {
        Self::count_unread(self, user_id, now).await
    }

    async fn update_user_notifications(
        &self,
        user_id: i64,
        notification_ids: Vec<i64>,
        changes: UserNotificationChanges,
        now: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        Self::update_user_notifications(self, user_id, notification_ids, changes, now).await
    }

    async fn get_broadcast(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<StoredNotification>, StorageError> {
        Self::get_broadcast(self, id, now).await
    }

    async fn get_active_broadcasts(
        &self,
        since: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Vec<StoredNotification>, StorageError> {
        Self::get_active_broadcasts(self, since, now).await
    }

    async fn get_preferences(&self, user_id: i64) -> Result<Vec<StoredPreference>, StorageError> {
        Self::get_preferences(self, user_id).await
    }

    async fn upsert_preferences(
        &self,
        user_id: i64,
        preferences: Vec<StoredPreference>,
    ) -> Result<(), StorageError> {
        Self::upsert_preferences(self, user_id, preferences).await
    }

    async fn users_with_category_disabled(
        &self,
        user_ids: Vec<i64>,
        category: NotificationCategory,
    ) -> Result<Vec<i64>, StorageError> {
        Self::users_with_category_disabled(self, user_ids, category).await
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        Self::cleanup_expired(self, now).await
    }
}
