//! Request and response bodies of the notification API.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::{
    NotificationCategory, NotificationVariant, StoredNotification, StoredPreference,
    StoredUserNotification, UserNotificationChanges,
};

/// Content of a `message` notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent {
    /// Subject line.
    pub subject: String,
    /// Body, may contain Markdown.
    pub message: String,
}

/// Content of a `new_shared_item` notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSharedItemContent {
    /// `history`, `workflow`, `page` or `visualization`.
    pub item_type: String,
    /// Name or title of the item.
    pub item_name: String,
    /// Username of whoever shared it.
    pub owner_name: String,
    /// Item slug, used to build a link.
    pub slug: String,
}

/// A link offered by a broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLink {
    /// Button label.
    pub action_name: String,
    /// Target URL.
    pub link: String,
}

/// Content of a `broadcast` notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastContent {
    /// Subject line.
    pub subject: String,
    /// Body, may contain Markdown.
    pub message: String,
    /// Optional action links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_links: Option<Vec<ActionLink>>,
}

/// Category-specific notification content, tagged by `category`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum NotificationContent {
    /// A free-form message.
    Message(MessageContent),
    /// An item was shared with the recipient.
    NewSharedItem(NewSharedItemContent),
    /// A broadcast.
    Broadcast(BroadcastContent),
}

impl NotificationContent {
    /// Category this content belongs to.
    #[must_use]
    pub const fn category(&self) -> NotificationCategory {
        match self {
            Self::Message(_) => NotificationCategory::Message,
            Self::NewSharedItem(_) => NotificationCategory::NewSharedItem,
            Self::Broadcast(_) => NotificationCategory::Broadcast,
        }
    }
}

/// A notification to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationCreateData {
    /// Free-form origin tag.
    pub source: String,
    /// Category, must match `content`.
    pub category: NotificationCategory,
    /// Severity.
    #[serde(default)]
    pub variant: NotificationVariant,
    /// Content.
    pub content: NotificationContent,
    /// Defaults to now.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_time: Option<DateTime<Utc>>,
    /// Defaults to publication time plus the configured lifetime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<DateTime<Utc>>,
}

/// Recipients of a targeted notification.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotificationRecipients {
    /// Encoded user ids.
    #[serde(default)]
    pub user_ids: Vec<String>,
}

/// Request body of `POST /notifications`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationCreateRequest {
    /// Who receives it.
    pub recipients: NotificationRecipients,
    /// What they receive.
    pub notification: NotificationCreateData,
}

/// A notification as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationResponse {
    /// Encoded id.
    pub id: String,
    /// Origin tag.
    pub source: String,
    /// Category.
    pub category: NotificationCategory,
    /// Severity.
    pub variant: NotificationVariant,
    /// Content.
    pub content: Value,
    /// Visible from.
    pub publication_time: DateTime<Utc>,
    /// Visible until.
    pub expiration_time: DateTime<Utc>,
    /// Creation time.
    pub create_time: DateTime<Utc>,
    /// Last update time.
    pub update_time: DateTime<Utc>,
}

impl NotificationResponse {
    pub(crate) fn from_stored(stored: StoredNotification, id: String) -> Self {
        Self {
            id,
            source: stored.source,
            category: stored.category,
            variant: stored.variant,
            content: stored.content,
            publication_time: stored.publication_time,
            expiration_time: stored.expiration_time,
            create_time: stored.create_time,
            update_time: stored.update_time,
        }
    }
}

/// A notification together with the caller's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserNotificationResponse {
    /// The notification.
    #[serde(flatten)]
    pub notification: NotificationResponse,
    /// When the caller marked it seen.
    pub seen_time: Option<DateTime<Utc>>,
    /// Whether the caller deleted it.
    pub deleted: bool,
}

impl UserNotificationResponse {
    pub(crate) fn from_stored(stored: StoredUserNotification, id: String) -> Self {
        Self {
            notification: NotificationResponse::from_stored(stored.notification, id),
            seen_time: stored.seen_time,
            deleted: stored.deleted,
        }
    }
}

/// Response of the create endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationCreatedResponse {
    /// Number of recipients (1 for a broadcast).
    pub total_notifications_sent: usize,
    /// The created notification; `null` when no recipient was left and
    /// nothing was stored.
    pub notification: Option<NotificationResponse>,
}

/// Response of `GET /notifications/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationStatusSummary {
    /// All unseen notifications of the caller, regardless of `since`.
    pub total_unread_count: i64,
    /// The caller's notifications changed since the given time.
    pub notifications: Vec<UserNotificationResponse>,
    /// Active broadcasts published or changed since the given time.
    pub broadcasts: Vec<NotificationResponse>,
}

/// Request body of `PUT /notifications`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserNotificationsBatchUpdateRequest {
    /// Encoded notification ids.
    pub notification_ids: Vec<String>,
    /// Changes to apply to each.
    pub changes: UserNotificationChanges,
}

/// Response of `PUT /notifications`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationsBatchUpdateResponse {
    /// Number of notifications updated.
    pub total_updated: u64,
}

/// Delivery channels of one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationChannelSettings {
    /// In-app push.
    #[serde(default = "enabled_by_default")]
    pub push: bool,
}

impl Default for NotificationChannelSettings {
    fn default() -> Self {
        Self { push: true }
    }
}

/// Settings of one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationCategorySettings {
    /// Whether notifications of this category are delivered.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Delivery channels.
    #[serde(default)]
    pub channels: NotificationChannelSettings,
}

impl Default for NotificationCategorySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            channels: NotificationChannelSettings::default(),
        }
    }
}

const fn enabled_by_default() -> bool {
    true
}

/// A user's notification preferences, keyed by category.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserNotificationPreferences {
    /// Settings per category.
    pub preferences: IndexMap<NotificationCategory, NotificationCategorySettings>,
}

impl UserNotificationPreferences {
    /// Fill in every configurable category, defaulting to enabled.
    pub(crate) fn from_stored(stored: &[StoredPreference]) -> Self {
        let preferences = NotificationCategory::PERSONAL
            .iter()
            .map(|category| {
                let settings = stored
                    .iter()
                    .find(|p| p.category == *category)
                    .map_or_else(NotificationCategorySettings::default, |p| {
                        NotificationCategorySettings {
                            enabled: p.enabled,
                            channels: NotificationChannelSettings { push: p.push },
                        }
                    });
                (*category, settings)
            })
            .collect();
        Self { preferences }
    }
}
