//! User storage operations.

#![allow(clippy::missing_errors_doc)]

use crate::error::StorageError;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::core::SqliteStorage;
use super::types::StoredUser;

const USER_COLUMNS: &str = "id, username, email, api_key, create_time";

impl SqliteStorage {
    /// Create a user with a freshly generated API key.
    pub async fn create_user(&self, username: &str, email: &str) -> Result<StoredUser, StorageError> {
        let api_key = Self::generate_api_key();
        let now = Utc::now();

        let id: i64 = sqlx::query(
            "INSERT INTO users (username, email, api_key, create_time) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(username)
        .bind(email)
        .bind(&api_key)
        .bind(Self::format_datetime(&now))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Self::query_error("INSERT users", format!("{e}")))?
        .get("id");

        tracing::debug!(user_id = id, %username, "user created");

        Ok(StoredUser {
            id,
            username: username.to_string(),
            email: email.to_string(),
            api_key,
            create_time: now,
        })
    }

    /// Get a user by id.
    pub async fn get_user(&self, id: i64) -> Result<Option<StoredUser>, StorageError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Self::query_error("SELECT users", format!("{e}")))?;

        row.map(|r| Self::row_to_user(&r)).transpose()
    }

    /// Get a user by email, ignoring case.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<StoredUser>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower(?)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Self::query_error("SELECT users by email", format!("{e}")))?;

        row.map(|r| Self::row_to_user(&r)).transpose()
    }

    /// Get the user owning an API key.
    pub async fn get_user_by_api_key(
        &self,
        api_key: &str,
    ) -> Result<Option<StoredUser>, StorageError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE api_key = ?"))
            .bind(api_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Self::query_error("SELECT users by api_key", format!("{e}")))?;

        row.map(|r| Self::row_to_user(&r)).transpose()
    }

    pub(crate) fn row_to_user(row: &SqliteRow) -> Result<StoredUser, StorageError> {
        let create_time: String = row.get("create_time");
        Ok(StoredUser {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            api_key: row.get("api_key"),
            create_time: Self::parse_datetime(&create_time)?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use crate::storage::core::tests::test_storage;

    #[tokio::test]
    async fn test_create_and_get_user() {
        let storage = test_storage().await;
        let user = storage.create_user("alice", "alice@example.org").await.unwrap();

        let fetched = storage.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(fetched.username, "alice");
        assert_eq!(fetched.api_key, user.api_key);
    }

    #[tokio::test]
    async fn test_get_user_by_email_ignores_case() {
        let storage = test_storage().await;
        let user = storage.create_user("bob", "Bob@Example.org").await.unwrap();

        let fetched = storage.get_user_by_email("bob@example.ORG").await.unwrap();
        assert_eq!(fetched.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn test_get_user_by_api_key() {
        let storage = test_storage().await;
        let user = storage.create_user("carol", "carol@example.org").await.unwrap();

        let fetched = storage.get_user_by_api_key(&user.api_key).await.unwrap();
        assert_eq!(fetched.map(|u| u.id), Some(user.id));
        assert!(storage.get_user_by_api_key("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_fails() {
        let storage = test_storage().await;
        storage.create_user("dave", "dave@example.org").await.unwrap();
        let result = storage.create_user("dave2", "dave@example.org").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_get_missing_user() {
        let storage = test_storage().await;
        assert!(storage.get_user(9999).await.unwrap().is_none());
    }
}
