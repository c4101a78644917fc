//! Notification storage operations.

#![allow(clippy::missing_errors_doc)]

use crate::error::StorageError;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

use super::core::SqliteStorage;
use super::types::{
    NewNotification, NotificationCategory, NotificationVariant, StoredNotification,
    StoredPreference, StoredUserNotification, UserNotificationChanges,
};

const NOTIFICATION_COLUMNS: &str = "n.id, n.source, n.category, n.variant, n.content, \
     n.publication_time, n.expiration_time, n.create_time, n.update_time";

const USER_NOTIFICATION_COLUMNS: &str = "n.id, n.source, n.category, n.variant, n.content, \
     n.publication_time, n.expiration_time, n.create_time, n.update_time, \
     un.user_id, un.seen_time, un.deleted, un.update_time AS association_update_time";

impl SqliteStorage {
    /// Create a notification and one association per recipient.
    ///
    /// Broadcasts are created with no recipients.
    pub async fn create_notification(
        &self,
        notification: &NewNotification,
        recipient_ids: Vec<i64>,
    ) -> Result<StoredNotification, StorageError> {
        let now = Utc::now();
        let now_str = Self::format_datetime(&now);
        let content = Self::to_json("content", &notification.content)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Self::query_error("BEGIN create notification", format!("{e}")))?;

        let id: i64 = sqlx::query(
            "INSERT INTO notifications
                (source, category, variant, content, publication_time, expiration_time, create_time, update_time)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&notification.source)
        .bind(notification.category.as_str())
        .bind(notification.variant.as_str())
        .bind(&content)
        .bind(Self::format_datetime(&notification.publication_time))
        .bind(Self::format_datetime(&notification.expiration_time))
        .bind(&now_str)
        .bind(&now_str)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Self::query_error("INSERT notifications", format!("{e}")))?
        .get("id");

        for user_id in &recipient_ids {
            sqlx::query(
                "INSERT OR IGNORE INTO user_notifications (notification_id, user_id, update_time) VALUES (?, ?, ?)",
            )
            .bind(id)
            .bind(user_id)
            .bind(&now_str)
            .execute(&mut *tx)
            .await
            .map_err(|e| Self::query_error("INSERT user_notifications", format!("{e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| Self::query_error("COMMIT create notification", format!("{e}")))?;

        tracing::debug!(
            notification_id = id,
            category = notification.category.as_str(),
            recipients = recipient_ids.len(),
            "notification stored"
        );

        Ok(StoredNotification {
            id,
            source: notification.source.clone(),
            category: notification.category,
            variant: notification.variant,
            content: notification.content.clone(),
            publication_time: notification.publication_time,
            expiration_time: notification.expiration_time,
            create_time: now,
            update_time: now,
        })
    }

    /// One visible notification of a user.
    pub async fn get_user_notification(
        &self,
        user_id: i64,
        notification_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<StoredUserNotification>, StorageError> {
        let now = Self::format_datetime(&now);
        let row = sqlx::query(&format!(
            "SELECT {USER_NOTIFICATION_COLUMNS}
             FROM user_notifications un JOIN notifications n ON n.id = un.notification_id
             WHERE un.user_id = ? AND n.id = ? AND un.deleted = 0
               AND n.publication_time <= ? AND n.expiration_time > ?"
        ))
        .bind(user_id)
        .bind(notification_id)
        .bind(&now)
        .bind(&now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Self::query_error("SELECT user_notifications", format!("{e}")))?;

        row.map(|r| Self::row_to_user_notification(&r)).transpose()
    }

    /// A user's visible notifications, newest first.
    ///
    /// With `since`, only notifications whose content or recipient state
    /// changed at or after that time are returned.
    pub async fn get_user_notifications(
        &self,
        user_id: i64,
        since: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<StoredUserNotification>, StorageError> {
        let now = Self::format_datetime(&now);
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {USER_NOTIFICATION_COLUMNS}
             FROM user_notifications un JOIN notifications n ON n.id = un.notification_id
             WHERE un.deleted = 0 AND un.user_id = "
        ));
        qb.push_bind(user_id);
        qb.push(" AND n.publication_time <= ");
        qb.push_bind(now.clone());
        qb.push(" AND n.expiration_time > ");
        qb.push_bind(now);
        if let Some(since) = since {
            let since = Self::format_datetime(&since);
            qb.push(" AND (n.update_time >= ");
            qb.push_bind(since.clone());
            qb.push(" OR un.update_time >= ");
            qb.push_bind(since);
            qb.push(")");
        }
        qb.push(" ORDER BY n.publication_time DESC, n.id DESC LIMIT ");
        qb.push_bind(limit.unwrap_or(-1));
        qb.push(" OFFSET ");
        qb.push_bind(offset.unwrap_or(0).max(0));

        qb.build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Self::query_error("SELECT user_notifications list", format!("{e}")))?
            .iter()
            .map(Self::row_to_user_notification)
            .collect()
    }

    /// Number of unseen visible notifications of a user.
    pub async fn count_unread(&self, user_id: i64, now: DateTime<Utc>) -> Result<i64, StorageError> {
        let now = Self::format_datetime(&now);
        let count: i64 = sqlx::query(
            "SELECT COUNT(*) AS unread
             FROM user_notifications un JOIN notifications n ON n.id = un.notification_id
             WHERE un.user_id = ? AND un.deleted = 0 AND un.seen_time IS NULL
               AND n.publication_time <= ? AND n.expiration_time > ?",
        )
        .bind(user_id)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Self::query_error("COUNT user_notifications unread", format!("{e}")))?
        .get("unread");
        Ok(count)
    }

    /// Apply seen/deleted changes to some of a user's notifications.
    ///
    /// Returns the number of associations updated.
    pub async fn update_user_notifications(
        &self,
        user_id: i64,
        notification_ids: Vec<i64>,
        changes: UserNotificationChanges,
        now: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        if notification_ids.is_empty() || changes.is_empty() {
            return Ok(0);
        }
        let now = Self::format_datetime(&now);

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE user_notifications SET update_time = ");
        qb.push_bind(now.clone());
        match changes.seen {
            Some(true) => {
                qb.push(", seen_time = ");
                qb.push_bind(now);
            }
            Some(false) => {
                qb.push(", seen_time = NULL");
            }
            None => {}
        }
        if let Some(deleted) = changes.deleted {
            qb.push(", deleted = ");
            qb.push_bind(deleted);
        }
        qb.push(" WHERE user_id = ");
        qb.push_bind(user_id);
        qb.push(" AND notification_id IN (");
        let mut separated = qb.separated(", ");
        for id in &notification_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| Self::query_error("UPDATE user_notifications", format!("{e}")))?;

        Ok(result.rows_affected())
    }

    /// One active broadcast.
    pub async fn get_broadcast(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<StoredNotification>, StorageError> {
        let now = Self::format_datetime(&now);
        let row = sqlx::query(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications n
             WHERE n.id = ? AND n.category = 'broadcast'
               AND n.publication_time <= ? AND n.expiration_time > ?"
        ))
        .bind(id)
        .bind(&now)
        .bind(&now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Self::query_error("SELECT notifications broadcast", format!("{e}")))?;

        row.map(|r| Self::row_to_notification(&r)).transpose()
    }

    /// Active broadcasts, newest first.
    ///
    /// With `since`, only broadcasts published or updated at or after that
    /// time are returned.
    pub async fn get_active_broadcasts(
        &self,
        since: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Vec<StoredNotification>, StorageError> {
        let now = Self::format_datetime(&now);
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications n
             WHERE n.category = 'broadcast' AND n.publication_time <= "
        ));
        qb.push_bind(now.clone());
        qb.push(" AND n.expiration_time > ");
        qb.push_bind(now);
        if let Some(since) = since {
            let since = Self::format_datetime(&since);
            qb.push(" AND (n.update_time >= ");
            qb.push_bind(since.clone());
            qb.push(" OR n.publication_time >= ");
            qb.push_bind(since);
            qb.push(")");
        }
        qb.push(" ORDER BY n.publication_time DESC, n.id DESC");

        qb.build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Self::query_error("SELECT notifications broadcasts", format!("{e}")))?
            .iter()
            .map(Self::row_to_notification)
            .collect()
    }

    /// A user's stored notification preferences.
    pub async fn get_preferences(&self, user_id: i64) -> Result<Vec<StoredPreference>, StorageError> {
        let rows = sqlx::query(
            "SELECT category, enabled, push FROM notification_preferences WHERE user_id = ? ORDER BY category",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::query_error("SELECT notification_preferences", format!("{e}")))?;

        rows.iter()
            .map(|row| {
                let category: String = row.get("category");
                Ok(StoredPreference {
                    category: Self::parse_category(&category)?,
                    enabled: row.get("enabled"),
                    push: row.get("push"),
                })
            })
            .collect()
    }

    /// Insert or replace notification preferences.
    pub async fn upsert_preferences(
        &self,
        user_id: i64,
        preferences: Vec<StoredPreference>,
    ) -> Result<(), StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Self::query_error("BEGIN upsert preferences", format!("{e}")))?;

        for preference in &preferences {
            sqlx::query(
                "INSERT INTO notification_preferences (user_id, category, enabled, push) VALUES (?, ?, ?, ?)
                 ON CONFLICT (user_id, category) DO UPDATE SET enabled = excluded.enabled, push = excluded.push",
            )
            .bind(user_id)
            .bind(preference.category.as_str())
            .bind(preference.enabled)
            .bind(preference.push)
            .execute(&mut *tx)
            .await
            .map_err(|e| Self::query_error("UPSERT notification_preferences", format!("{e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| Self::query_error("COMMIT upsert preferences", format!("{e}")))
    }

    /// Which of `user_ids` disabled `category`.
    pub async fn users_with_category_disabled(
        &self,
        user_ids: Vec<i64>,
        category: NotificationCategory,
    ) -> Result<Vec<i64>, StorageError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT user_id FROM notification_preferences WHERE enabled = 0 AND category = ",
        );
        qb.push_bind(category.as_str());
        qb.push(" AND user_id IN (");
        let mut separated = qb.separated(", ");
        for id in &user_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        Ok(qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Self::query_error("SELECT notification_preferences disabled", format!("{e}")))?
            .iter()
            .map(|r| r.get("user_id"))
            .collect())
    }

    /// Delete expired notifications and their associations.
    pub async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        let now = Self::format_datetime(&now);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Self::query_error("BEGIN cleanup notifications", format!("{e}")))?;

        sqlx::query(
            "DELETE FROM user_notifications WHERE notification_id IN
                (SELECT id FROM notifications WHERE expiration_time <= ?)",
        )
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| Self::query_error("DELETE user_notifications expired", format!("{e}")))?;

        let removed = sqlx::query("DELETE FROM notifications WHERE expiration_time <= ?")
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| Self::query_error("DELETE notifications expired", format!("{e}")))?
            .rows_affected();

        tx.commit()
            .await
            .map_err(|e| Self::query_error("COMMIT cleanup notifications", format!("{e}")))?;

        Ok(removed)
    }

    fn parse_category(s: &str) -> Result<NotificationCategory, StorageError> {
        NotificationCategory::from_str(s).ok_or_else(|| StorageError::Internal {
            message: format!("Unknown notification category '{s}'"),
        })
    }

    fn row_to_notification(row: &SqliteRow) -> Result<StoredNotification, StorageError> {
        let category: String = row.get("category");
        let variant: String = row.get("variant");
        let content: String = row.get("content");
        let publication_time: String = row.get("publication_time");
        let expiration_time: String = row.get("expiration_time");
        let create_time: String = row.get("create_time");
        let update_time: String = row.get("update_time");

        Ok(StoredNotification {
            id: row.get("id"),
            source: row.get("source"),
            category: Self::parse_category(&category)?,
            variant: NotificationVariant::from_str(&variant).ok_or_else(|| {
                StorageError::Internal {
                    message: format!("Unknown notification variant '{variant}'"),
                }
            })?,
            content: Self::parse_json("content", &content)?,
            publication_time: Self::parse_datetime(&publication_time)?,
            expiration_time: Self::parse_datetime(&expiration_time)?,
            create_time: Self::parse_datetime(&create_time)?,
            update_time: Self::parse_datetime(&update_time)?,
        })
    }

    fn row_to_user_notification(row: &SqliteRow) -> Result<StoredUserNotification, StorageError> {
        let seen_time: Option<String> = row.get("seen_time");
        let update_time: String = row.get("association_update_time");
        Ok(StoredUserNotification {
            notification: Self::row_to_notification(row)?,
            user_id: row.get("user_id"),
            seen_time: Self::parse_optional_datetime(seen_time)?,
            deleted: row.get("deleted"),
            update_time: Self::parse_datetime(&update_time)?,
        })
    }
}
