//! Notification delivery and per-user notification state.
//!
//! Two kinds of notifications exist:
//! - personal notifications (`message`, `new_shared_item`) addressed to a set
//!   of users, each recipient having its own seen/deleted state;
//! - broadcasts, visible to everyone (anonymous callers included) between
//!   their publication and expiration times.
//!
//! Every operation fails with [`ApiError::FeatureDisabled`] while the
//! notification system is switched off, except [`NotificationManager::send_to_users`]
//! which silently delivers nothing so that callers like sharing keep working.

mod schema;

pub use schema::{
    ActionLink, BroadcastContent, MessageContent, NewSharedItemContent,
    NotificationCategorySettings, NotificationChannelSettings, NotificationContent,
    NotificationCreateData, NotificationCreateRequest, NotificationCreatedResponse,
    NotificationRecipients, NotificationResponse, NotificationStatusSummary,
    NotificationsBatchUpdateResponse, UserNotificationPreferences, UserNotificationResponse,
    UserNotificationsBatchUpdateRequest,
};

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use crate::config::Config;
use crate::error::{ApiError, AppError};
use crate::security::IdEncoder;
use crate::storage::{
    NewNotification, NotificationCategory, StoredNotification, StoredPreference,
    StoredUserNotification, UserNotificationChanges,
};
use crate::traits::{NotificationStore, TimeProvider, UserStore};
use crate::users::Caller;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse a `since` query value.
///
/// Accepts RFC 3339 as well as naive `YYYY-MM-DD HH:MM:SS[.ffffff]`
/// timestamps (space or `T` separated), which are taken as UTC.
///
/// # Errors
///
/// Returns [`ApiError::BadRequest`] if the value matches neither form.
pub fn parse_since(value: &str) -> Result<DateTime<Utc>, AppError> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| AppError::bad_request(format!("Invalid datetime '{value}'")))
}

/// Creates notifications and manages recipients' view of them.
pub struct NotificationManager {
    store: Arc<dyn NotificationStore>,
    users: Arc<dyn UserStore>,
    clock: Arc<dyn TimeProvider>,
    encoder: IdEncoder,
    expiration_days: u32,
    enabled: bool,
}

impl NotificationManager {
    /// Create the manager.
    #[must_use]
    pub fn new(
        store: Arc<dyn NotificationStore>,
        users: Arc<dyn UserStore>,
        clock: Arc<dyn TimeProvider>,
        encoder: IdEncoder,
        config: &Config,
    ) -> Self {
        Self {
            store,
            users,
            clock,
            encoder,
            expiration_days: config.notification_expiration_days,
            enabled: config.enable_notification_system,
        }
    }

    /// Whether the notification system is switched on.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Send a personal notification to users. Admin only.
    ///
    /// Recipients are de-duplicated, unknown users are dropped and users who
    /// disabled the category do not receive it.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] for non-admins, [`ApiError::BadRequest`]
    /// for invalid content and [`ApiError::MalformedId`] for undecodable
    /// recipient ids.
    pub async fn send_notification_to_recipients(
        &self,
        caller: &Caller,
        request: NotificationCreateRequest,
    ) -> Result<NotificationCreatedResponse, AppError> {
        self.ensure_enabled()?;
        caller.require_admin()?;
        if request.notification.category == NotificationCategory::Broadcast {
            return Err(AppError::bad_request(
                "Broadcasts must be sent through the broadcast endpoint",
            ));
        }

        let user_ids = request
            .recipients
            .user_ids
            .iter()
            .map(|id| self.encoder.decode(id))
            .collect::<Result<Vec<_>, _>>()?;

        let mut known = Vec::with_capacity(user_ids.len());
        for user_id in user_ids {
            if known.contains(&user_id) {
                continue;
            }
            if self.users.get_user(user_id).await?.is_some() {
                known.push(user_id);
            } else {
                tracing::warn!(user_id, "dropping unknown notification recipient");
            }
        }

        let (notification, sent) = self.deliver(request.notification, known).await?;
        Ok(NotificationCreatedResponse {
            total_notifications_sent: sent,
            notification,
        })
    }

    /// Send a personal notification on behalf of the system. Returns the
    /// number of recipients; 0 when the notification system is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::BadRequest`] for invalid content and
    /// [`AppError::Storage`] if persisting fails.
    pub async fn send_to_users(
        &self,
        data: NotificationCreateData,
        user_ids: Vec<i64>,
    ) -> Result<usize, AppError> {
        if !self.enabled {
            tracing::debug!("notification system disabled, nothing sent");
            return Ok(0);
        }
        let (_, sent) = self.deliver(data, user_ids).await?;
        Ok(sent)
    }

    /// Create a broadcast. Admin only.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] for non-admins and
    /// [`ApiError::BadRequest`] unless the category is `broadcast`.
    pub async fn create_broadcast(
        &self,
        caller: &Caller,
        data: NotificationCreateData,
    ) -> Result<NotificationCreatedResponse, AppError> {
        self.ensure_enabled()?;
        caller.require_admin()?;
        if data.category != NotificationCategory::Broadcast {
            return Err(AppError::bad_request(
                "Only notifications of category 'broadcast' can be broadcast",
            ));
        }

        let new = self.prepare(data)?;
        let stored = self.store.create_notification(&new, Vec::new()).await?;
        tracing::info!(notification_id = stored.id, "broadcast created");

        let id = self.encoder.encode(stored.id);
        Ok(NotificationCreatedResponse {
            total_notifications_sent: 1,
            notification: Some(NotificationResponse::from_stored(stored, id)),
        })
    }

    /// One of the caller's notifications.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] unless the caller is a recipient who
    /// has not deleted it.
    pub async fn get_user_notification(
        &self,
        caller: &Caller,
        notification_id: &str,
    ) -> Result<UserNotificationResponse, AppError> {
        self.ensure_enabled()?;
        let id = self.encoder.decode(notification_id)?;
        let Some(user_id) = caller.user_id() else {
            return Err(AppError::not_found("Notification"));
        };
        let stored = self
            .store
            .get_user_notification(user_id, id, self.clock.now())
            .await?
            .ok_or_else(|| AppError::not_found("Notification"))?;
        Ok(self.user_response(stored))
    }

    /// The caller's visible notifications, newest first. Anonymous callers
    /// have none.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] if the lookup fails.
    pub async fn get_user_notifications(
        &self,
        caller: &Caller,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<UserNotificationResponse>, AppError> {
        self.ensure_enabled()?;
        let Some(user_id) = caller.user_id() else {
            return Ok(Vec::new());
        };
        let stored = self
            .store
            .get_user_notifications(user_id, None, self.clock.now(), limit, offset)
            .await?;
        Ok(stored.into_iter().map(|n| self.user_response(n)).collect())
    }

    /// Unread count plus whatever changed since `since`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] if a lookup fails.
    pub async fn get_status(
        &self,
        caller: &Caller,
        since: DateTime<Utc>,
    ) -> Result<NotificationStatusSummary, AppError> {
        self.ensure_enabled()?;
        let now = self.clock.now();

        let (total_unread_count, notifications) = match caller.user_id() {
            Some(user_id) => {
                let unread = self.store.count_unread(user_id, now).await?;
                let changed = self
                    .store
                    .get_user_notifications(user_id, Some(since), now, None, None)
                    .await?;
                (
                    unread,
                    changed.into_iter().map(|n| self.user_response(n)).collect(),
                )
            }
            None => (0, Vec::new()),
        };

        let broadcasts = self
            .store
            .get_active_broadcasts(Some(since), now)
            .await?
            .into_iter()
            .map(|b| self.broadcast_response(b))
            .collect();

        Ok(NotificationStatusSummary {
            total_unread_count,
            notifications,
            broadcasts,
        })
    }

    /// Apply changes to one of the caller's notifications.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::BadRequest`] for empty changes and
    /// [`ApiError::NotFound`] if nothing was updated.
    pub async fn update_user_notification(
        &self,
        caller: &Caller,
        notification_id: &str,
        changes: UserNotificationChanges,
    ) -> Result<(), AppError> {
        self.ensure_enabled()?;
        if changes.is_empty() {
            return Err(AppError::bad_request("No changes requested"));
        }
        let id = self.encoder.decode(notification_id)?;
        let Some(user_id) = caller.user_id() else {
            return Err(AppError::not_found("Notification"));
        };
        let updated = self
            .store
            .update_user_notifications(user_id, vec![id], changes, self.clock.now())
            .await?;
        if updated == 0 {
            return Err(AppError::not_found("Notification"));
        }
        tracing::debug!(user_id, notification_id = id, ?changes, "notification updated");
        Ok(())
    }

    /// Apply the same changes to several of the caller's notifications.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] for anonymous callers and
    /// [`ApiError::BadRequest`] for empty changes.
    pub async fn update_user_notifications(
        &self,
        caller: &Caller,
        request: UserNotificationsBatchUpdateRequest,
    ) -> Result<NotificationsBatchUpdateResponse, AppError> {
        self.ensure_enabled()?;
        let user = caller.require_user()?;
        if request.changes.is_empty() {
            return Err(AppError::bad_request("No changes requested"));
        }
        let ids = request
            .notification_ids
            .iter()
            .map(|id| self.encoder.decode(id))
            .collect::<Result<Vec<_>, _>>()?;
        let total_updated = self
            .store
            .update_user_notifications(user.id, ids, request.changes, self.clock.now())
            .await?;
        Ok(NotificationsBatchUpdateResponse { total_updated })
    }

    /// Delete one of the caller's notifications.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if the caller has no such notification.
    pub async fn delete_user_notification(
        &self,
        caller: &Caller,
        notification_id: &str,
    ) -> Result<(), AppError> {
        self.update_user_notification(
            caller,
            notification_id,
            UserNotificationChanges {
                seen: None,
                deleted: Some(true),
            },
        )
        .await
    }

    /// One active broadcast.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if no such broadcast is active.
    pub async fn get_broadcast(&self, broadcast_id: &str) -> Result<NotificationResponse, AppError> {
        self.ensure_enabled()?;
        let id = self.encoder.decode(broadcast_id)?;
        let stored = self
            .store
            .get_broadcast(id, self.clock.now())
            .await?
            .ok_or_else(|| AppError::not_found("Broadcast"))?;
        Ok(self.broadcast_response(stored))
    }

    /// Every active broadcast.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] if the lookup fails.
    pub async fn get_active_broadcasts(&self) -> Result<Vec<NotificationResponse>, AppError> {
        self.ensure_enabled()?;
        let stored = self
            .store
            .get_active_broadcasts(None, self.clock.now())
            .await?;
        Ok(stored
            .into_iter()
            .map(|b| self.broadcast_response(b))
            .collect())
    }

    /// The caller's preferences, every configurable category included.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] for anonymous callers.
    pub async fn get_preferences(
        &self,
        caller: &Caller,
    ) -> Result<UserNotificationPreferences, AppError> {
        self.ensure_enabled()?;
        let user = caller.require_user()?;
        let stored = self.store.get_preferences(user.id).await?;
        Ok(UserNotificationPreferences::from_stored(&stored))
    }

    /// Update some of the caller's preferences; returns the full set.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] for anonymous callers and
    /// [`ApiError::BadRequest`] for categories users cannot configure.
    pub async fn update_preferences(
        &self,
        caller: &Caller,
        request: UserNotificationPreferences,
    ) -> Result<UserNotificationPreferences, AppError> {
        self.ensure_enabled()?;
        let user = caller.require_user()?;

        let mut rows = Vec::with_capacity(request.preferences.len());
        for (category, settings) in request.preferences {
            if !NotificationCategory::PERSONAL.contains(&category) {
                return Err(AppError::bad_request(format!(
                    "Preferences for category '{}' cannot be changed",
                    category.as_str()
                )));
            }
            rows.push(StoredPreference {
                category,
                enabled: settings.enabled,
                push: settings.channels.push,
            });
        }
        self.store.upsert_preferences(user.id, rows).await?;
        tracing::debug!(user_id = user.id, "notification preferences updated");

        let stored = self.store.get_preferences(user.id).await?;
        Ok(UserNotificationPreferences::from_stored(&stored))
    }

    /// Delete expired notifications; returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] if the deletion fails.
    pub async fn cleanup_expired_notifications(&self) -> Result<u64, AppError> {
        self.ensure_enabled()?;
        let removed = self.store.cleanup_expired(self.clock.now()).await?;
        if removed > 0 {
            tracing::info!(removed, "expired notifications cleaned up");
        }
        Ok(removed)
    }

    fn ensure_enabled(&self) -> Result<(), AppError> {
        if self.enabled {
            Ok(())
        } else {
            Err(ApiError::FeatureDisabled {
                feature: "notification system".to_string(),
            }
            .into())
        }
    }

    /// Store `data` for the de-duplicated, opted-in subset of `user_ids`.
    /// Nothing is stored when that subset is empty.
    async fn deliver(
        &self,
        data: NotificationCreateData,
        mut user_ids: Vec<i64>,
    ) -> Result<(Option<NotificationResponse>, usize), AppError> {
        let new = self.prepare(data)?;

        let mut seen = Vec::with_capacity(user_ids.len());
        user_ids.retain(|id| {
            let first = !seen.contains(id);
            seen.push(*id);
            first
        });
        if !user_ids.is_empty() {
            let opted_out = self
                .store
                .users_with_category_disabled(user_ids.clone(), new.category)
                .await?;
            user_ids.retain(|id| !opted_out.contains(id));
        }
        if user_ids.is_empty() {
            tracing::debug!(
                category = new.category.as_str(),
                "no recipients left, nothing stored"
            );
            return Ok((None, 0));
        }

        let sent = user_ids.len();
        let stored = self.store.create_notification(&new, user_ids).await?;
        tracing::info!(
            notification_id = stored.id,
            category = stored.category.as_str(),
            recipients = sent,
            "notification sent"
        );

        let id = self.encoder.encode(stored.id);
        Ok((Some(NotificationResponse::from_stored(stored, id)), sent))
    }

    fn prepare(&self, data: NotificationCreateData) -> Result<NewNotification, AppError> {
        if data.content.category() != data.category {
            return Err(AppError::bad_request(format!(
                "Content category '{}' does not match notification category '{}'",
                data.content.category().as_str(),
                data.category.as_str()
            )));
        }

        let publication_time = data.publication_time.unwrap_or_else(|| self.clock.now());
        let expiration_time = data.expiration_time.unwrap_or_else(|| {
            publication_time + Duration::days(i64::from(self.expiration_days))
        });
        if expiration_time <= publication_time {
            return Err(AppError::bad_request(
                "Expiration time must be after publication time",
            ));
        }

        let content = serde_json::to_value(&data.content)
            .map_err(|e| AppError::bad_request(format!("Invalid notification content: {e}")))?;

        Ok(NewNotification {
            source: data.source,
            category: data.category,
            variant: data.variant,
            content,
            publication_time,
            expiration_time,
        })
    }

    fn user_response(&self, stored: StoredUserNotification) -> UserNotificationResponse {
        let id = self.encoder.encode(stored.notification.id);
        UserNotificationResponse::from_stored(stored, id)
    }

    fn broadcast_response(&self, stored: StoredNotification) -> NotificationResponse {
        let id = self.encoder.encode(stored.id);
        NotificationResponse::from_stored(stored, id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::storage::{NotificationVariant, SqliteStorage};
    use crate::test_utils::{mock_time, test_config, test_user};
    use crate::traits::{MockNotificationStore, MockUserStore};
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn fixed_now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn clock() -> Arc<dyn TimeProvider> {
        Arc::new(mock_time(fixed_now()))
    }

    fn encoder() -> IdEncoder {
        IdEncoder::new("test-secret")
    }

    fn message(subject: &str) -> NotificationCreateData {
        NotificationCreateData {
            source: "tests".into(),
            category: NotificationCategory::Message,
            variant: NotificationVariant::Info,
            content: NotificationContent::Message(MessageContent {
                subject: subject.into(),
                message: "body".into(),
            }),
            publication_time: None,
            expiration_time: None,
        }
    }

    fn broadcast() -> NotificationCreateData {
        NotificationCreateData {
            source: "tests".into(),
            category: NotificationCategory::Broadcast,
            variant: NotificationVariant::Urgent,
            content: NotificationContent::Broadcast(BroadcastContent {
                subject: "maintenance".into(),
                message: "tonight".into(),
                action_links: None,
            }),
            publication_time: None,
            expiration_time: None,
        }
    }

    fn stored_from(new: &NewNotification) -> StoredNotification {
        StoredNotification {
            id: 42,
            source: new.source.clone(),
            category: new.category,
            variant: new.variant,
            content: new.content.clone(),
            publication_time: new.publication_time,
            expiration_time: new.expiration_time,
            create_time: fixed_now(),
            update_time: fixed_now(),
        }
    }

    fn mocked(store: MockNotificationStore, users: MockUserStore, enabled: bool) -> NotificationManager {
        let mut config = test_config();
        config.enable_notification_system = enabled;
        NotificationManager::new(Arc::new(store), Arc::new(users), clock(), encoder(), &config)
    }

    async fn real() -> (NotificationManager, Arc<SqliteStorage>) {
        let storage = Arc::new(SqliteStorage::new_in_memory().await.unwrap());
        let manager = NotificationManager::new(
            storage.clone(),
            storage.clone(),
            Arc::new(crate::traits::RealTimeProvider),
            encoder(),
            &test_config(),
        );
        (manager, storage)
    }

    fn admin() -> Caller {
        Caller::bootstrap_admin()
    }

    #[test_case("2024-01-01T10:00:00Z" ; "rfc3339 utc")]
    #[test_case("2024-01-01T11:00:00+01:00" ; "rfc3339 offset")]
    #[test_case("2024-01-01 10:00:00" ; "naive space")]
    #[test_case("2024-01-01T10:00:00" ; "naive t")]
    fn test_parse_since_whole_seconds(value: &str) {
        let expected = DateTime::parse_from_rfc3339("2024-01-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(parse_since(value).unwrap(), expected);
    }

    #[test]
    fn test_parse_since_fractional() {
        let parsed = parse_since("2024-01-01 10:00:00.123456").unwrap();
        assert_eq!(parsed.timestamp_subsec_micros(), 123_456);
    }

    #[test]
    fn test_parse_since_invalid() {
        let err = parse_since("yesterday").unwrap_err();
        assert!(matches!(err, AppError::Api(ApiError::BadRequest { .. })));
    }

    #[tokio::test]
    async fn test_disabled_system_rejects_operations() {
        let manager = mocked(MockNotificationStore::new(), MockUserStore::new(), false);
        let err = manager
            .get_status(&Caller::anonymous(), fixed_now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Api(ApiError::FeatureDisabled { .. })));

        let sent = manager.send_to_users(message("x"), vec![1]).await.unwrap();
        assert_eq!(sent, 0);
    }

    #[tokio::test]
    async fn test_send_requires_admin() {
        let manager = mocked(MockNotificationStore::new(), MockUserStore::new(), true);
        let request = NotificationCreateRequest {
            recipients: NotificationRecipients::default(),
            notification: message("x"),
        };
        let caller = Caller::user(test_user(1, "alice", "alice@example.org"), false);
        let err = manager
            .send_notification_to_recipients(&caller, request.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Api(ApiError::Forbidden { .. })));

        let err = manager
            .send_notification_to_recipients(&Caller::anonymous(), request)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Api(ApiError::Forbidden { .. })));
    }

    #[tokio::test]
    async fn test_send_rejects_mismatched_category() {
        let manager = mocked(MockNotificationStore::new(), MockUserStore::new(), true);
        let mut data = message("x");
        data.category = NotificationCategory::NewSharedItem;
        let err = manager
            .send_notification_to_recipients(
                &admin(),
                NotificationCreateRequest {
                    recipients: NotificationRecipients::default(),
                    notification: data,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Api(ApiError::BadRequest { .. })));
    }

    #[tokio::test]
    async fn test_send_dedupes_and_respects_preferences() {
        let mut users = MockUserStore::new();
        users
            .expect_get_user()
            .returning(|id| Ok((id != 9).then(|| test_user(id, "u", "u@example.org"))));

        let mut store = MockNotificationStore::new();
        store
            .expect_users_with_category_disabled()
            .withf(|ids, category| ids == &vec![1, 2, 3] && *category == NotificationCategory::Message)
            .returning(|_, _| Ok(vec![2]));
        store
            .expect_create_notification()
            .withf(|_, recipients| recipients == &vec![1, 3])
            .returning(|new, _| Ok(stored_from(new)));

        let manager = mocked(store, users, true);
        let e = encoder();
        let request = NotificationCreateRequest {
            recipients: NotificationRecipients {
                user_ids: [1, 2, 2, 3, 9].iter().map(|id| e.encode(*id)).collect(),
            },
            notification: message("hello"),
        };
        let response = manager
            .send_notification_to_recipients(&admin(), request)
            .await
            .unwrap();
        assert_eq!(response.total_notifications_sent, 2);
        let notification = response.notification.unwrap();
        assert_eq!(notification.id, e.encode(42));
        assert_eq!(
            notification.expiration_time,
            fixed_now() + Duration::days(30)
        );
    }

    #[tokio::test]
    async fn test_nothing_is_stored_without_recipients() {
        let mut users = MockUserStore::new();
        users
            .expect_get_user()
            .returning(|id| Ok(Some(test_user(id, "u", "u@example.org"))));

        let mut store = MockNotificationStore::new();
        store
            .expect_users_with_category_disabled()
            .returning(|ids, _| Ok(ids));
        store.expect_create_notification().never();

        let manager = mocked(store, users, true);
        let e = encoder();
        let response = manager
            .send_notification_to_recipients(
                &admin(),
                NotificationCreateRequest {
                    recipients: NotificationRecipients {
                        user_ids: vec![e.encode(1), e.encode(2)],
                    },
                    notification: message("hello"),
                },
            )
            .await
            .unwrap();
        assert_eq!(response.total_notifications_sent, 0);
        assert!(response.notification.is_none());

        let sent = manager.send_to_users(message("again"), Vec::new()).await.unwrap();
        assert_eq!(sent, 0);
    }

    #[tokio::test]
    async fn test_broadcast_requires_broadcast_category() {
        let manager = mocked(MockNotificationStore::new(), MockUserStore::new(), true);
        let err = manager
            .create_broadcast(&admin(), message("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Api(ApiError::BadRequest { .. })));
    }

    #[tokio::test]
    async fn test_expiration_must_follow_publication() {
        let manager = mocked(MockNotificationStore::new(), MockUserStore::new(), true);
        let mut data = broadcast();
        data.publication_time = Some(fixed_now());
        data.expiration_time = Some(fixed_now() - Duration::hours(1));
        let err = manager.create_broadcast(&admin(), data).await.unwrap_err();
        assert!(matches!(err, AppError::Api(ApiError::BadRequest { .. })));
    }

    #[tokio::test]
    async fn test_anonymous_status_only_has_broadcasts() {
        let mut store = MockNotificationStore::new();
        store.expect_get_active_broadcasts().returning(|_, _| {
            Ok(vec![StoredNotification {
                id: 5,
                source: "s".into(),
                category: NotificationCategory::Broadcast,
                variant: NotificationVariant::Urgent,
                content: serde_json::json!({}),
                publication_time: fixed_now(),
                expiration_time: fixed_now() + Duration::days(1),
                create_time: fixed_now(),
                update_time: fixed_now(),
            }])
        });
        let manager = mocked(store, MockUserStore::new(), true);
        let status = manager
            .get_status(&Caller::anonymous(), fixed_now() - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(status.total_unread_count, 0);
        assert!(status.notifications.is_empty());
        assert_eq!(status.broadcasts.len(), 1);
    }

    #[tokio::test]
    async fn test_update_preferences_rejects_broadcast() {
        let manager = mocked(MockNotificationStore::new(), MockUserStore::new(), true);
        let mut request = UserNotificationPreferences::default();
        request.preferences.insert(
            NotificationCategory::Broadcast,
            NotificationCategorySettings::default(),
        );
        let caller = Caller::user(test_user(1, "alice", "alice@example.org"), false);
        let err = manager
            .update_preferences(&caller, request)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Api(ApiError::BadRequest { .. })));
    }

    #[tokio::test]
    async fn test_full_lifecycle_against_sqlite() {
        let (manager, storage) = real().await;
        let alice = storage.create_user("alice", "alice@example.org").await.unwrap();
        let bob = storage.create_user("bob", "bob@example.org").await.unwrap();
        let before = Utc::now() - Duration::seconds(1);
        let e = encoder();

        let created = manager
            .send_notification_to_recipients(
                &admin(),
                NotificationCreateRequest {
                    recipients: NotificationRecipients {
                        user_ids: vec![e.encode(alice.id), e.encode(bob.id)],
                    },
                    notification: message("hi"),
                },
            )
            .await
            .unwrap();
        assert_eq!(created.total_notifications_sent, 2);
        let id = created.notification.unwrap().id;

        let alice_caller = Caller::user(alice.clone(), false);
        let bob_caller = Caller::user(bob.clone(), false);

        let status = manager.get_status(&alice_caller, before).await.unwrap();
        assert_eq!(status.total_unread_count, 1);
        assert_eq!(status.notifications.len(), 1);

        manager
            .update_user_notification(
                &alice_caller,
                &id,
                UserNotificationChanges {
                    seen: Some(true),
                    deleted: None,
                },
            )
            .await
            .unwrap();
        let status = manager.get_status(&alice_caller, before).await.unwrap();
        assert_eq!(status.total_unread_count, 0);
        assert_eq!(status.notifications.len(), 1);
        assert!(status.notifications[0].seen_time.is_some());

        manager.delete_user_notification(&alice_caller, &id).await.unwrap();
        let err = manager
            .get_user_notification(&alice_caller, &id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Api(ApiError::NotFound { .. })));
        assert!(manager.get_user_notification(&bob_caller, &id).await.is_ok());
    }

    #[tokio::test]
    async fn test_opted_out_user_receives_nothing() {
        let (manager, storage) = real().await;
        let alice = storage.create_user("alice", "alice@example.org").await.unwrap();
        let bob = storage.create_user("bob", "bob@example.org").await.unwrap();

        let mut prefs = UserNotificationPreferences::default();
        prefs.preferences.insert(
            NotificationCategory::Message,
            NotificationCategorySettings {
                enabled: false,
                channels: NotificationChannelSettings { push: false },
            },
        );
        let updated = manager
            .update_preferences(&Caller::user(bob.clone(), false), prefs)
            .await
            .unwrap();
        assert!(!updated.preferences[&NotificationCategory::Message].enabled);
        assert!(updated.preferences[&NotificationCategory::NewSharedItem].enabled);

        let sent = manager
            .send_to_users(message("hi"), vec![alice.id, bob.id])
            .await
            .unwrap();
        assert_eq!(sent, 1);

        let bob_list = manager
            .get_user_notifications(&Caller::user(bob, false), None, None)
            .await
            .unwrap();
        assert!(bob_list.is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_visible_to_everyone() {
        let (manager, _storage) = real().await;
        let before = Utc::now() - Duration::seconds(1);

        let created = manager.create_broadcast(&admin(), broadcast()).await.unwrap();
        assert_eq!(created.total_notifications_sent, 1);

        let status = manager.get_status(&Caller::anonymous(), before).await.unwrap();
        assert_eq!(status.broadcasts.len(), 1);
        let id = created.notification.unwrap().id;
        assert_eq!(status.broadcasts[0].id, id);

        let fetched = manager.get_broadcast(&id).await.unwrap();
        assert_eq!(fetched.variant, NotificationVariant::Urgent);
        assert_eq!(manager.get_active_broadcasts().await.unwrap().len(), 1);

        let later = Utc::now() + Duration::seconds(5);
        let status = manager.get_status(&Caller::anonymous(), later).await.unwrap();
        assert!(status.broadcasts.is_empty());
    }
}
