//! Shareable item storage operations.

#![allow(clippy::missing_errors_doc)]

use crate::error::StorageError;
use chrono::Utc;
use sqlx::{QueryBuilder, Row, Sqlite};

use super::core::SqliteStorage;
use super::types::{ItemType, NewItem, StoredItem, StoredUser};

impl SqliteStorage {
    /// Create a history, page or visualization.
    pub async fn create_item(&self, item: &NewItem) -> Result<StoredItem, StorageError> {
        let now = Self::format_datetime(&Utc::now());

        let id: i64 = match item {
            NewItem::History { user_id, name } => sqlx::query(
                "INSERT INTO histories (user_id, name, create_time, update_time) VALUES (?, ?, ?, ?) RETURNING id",
            )
            .bind(user_id)
            .bind(name)
            .bind(&now)
            .bind(&now)
            .fetch_one(&self.pool)
            .await,
            NewItem::Page {
                user_id,
                title,
                slug,
            } => sqlx::query(
                "INSERT INTO pages (user_id, name, slug, create_time, update_time) VALUES (?, ?, ?, ?, ?) RETURNING id",
            )
            .bind(user_id)
            .bind(title)
            .bind(slug)
            .bind(&now)
            .bind(&now)
            .fetch_one(&self.pool)
            .await,
            NewItem::Visualization {
                user_id,
                title,
                slug,
                vis_type,
                dbkey,
            } => sqlx::query(
                "INSERT INTO visualizations (user_id, name, slug, vis_type, dbkey, create_time, update_time)
                 VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
            )
            .bind(user_id)
            .bind(title)
            .bind(slug)
            .bind(vis_type)
            .bind(dbkey)
            .bind(&now)
            .bind(&now)
            .fetch_one(&self.pool)
            .await,
        }
        .map_err(|e| Self::query_error(&format!("INSERT {}", item.item_type().table()), format!("{e}")))?
        .get("id");

        tracing::debug!(item_type = item.item_type().as_str(), id, "item created");

        self.get_item(item.item_type(), id)
            .await?
            .ok_or_else(|| StorageError::Internal {
                message: format!("{} {id} vanished after creation", item.item_type().as_str()),
            })
    }

    /// Get any shareable item, including stored workflows.
    pub async fn get_item(
        &self,
        item_type: ItemType,
        id: i64,
    ) -> Result<Option<StoredItem>, StorageError> {
        let table = item_type.table();
        let row = sqlx::query(&format!(
            "SELECT i.id, i.user_id, u.username AS owner, i.name, i.slug, i.importable, i.published
             FROM {table} i JOIN users u ON u.id = i.user_id
             WHERE i.id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Self::query_error(&format!("SELECT {table}"), format!("{e}")))?;

        Ok(row.map(|r| StoredItem {
            item_type,
            id: r.get("id"),
            user_id: r.get("user_id"),
            owner: r.get("owner"),
            name: r.get("name"),
            slug: r.get("slug"),
            importable: r.get("importable"),
            published: r.get("published"),
        }))
    }

    /// Users an item is shared with, in the order they were added.
    pub async fn get_shared_users(
        &self,
        item_type: ItemType,
        id: i64,
    ) -> Result<Vec<StoredUser>, StorageError> {
        sqlx::query(
            "SELECT u.id, u.username, u.email, u.api_key, u.create_time
             FROM item_shares s JOIN users u ON u.id = s.user_id
             WHERE s.item_type = ? AND s.item_id = ?
             ORDER BY s.create_time, u.id",
        )
        .bind(item_type.as_str())
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::query_error("SELECT item_shares", format!("{e}")))?
        .iter()
        .map(Self::row_to_user)
        .collect()
    }

    /// Replace the share list of an item. Users already on the list keep
    /// their original share time.
    pub async fn set_shared_users(
        &self,
        item_type: ItemType,
        id: i64,
        user_ids: Vec<i64>,
    ) -> Result<(), StorageError> {
        let now = Self::format_datetime(&Utc::now());
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Self::query_error("BEGIN set shares", format!("{e}")))?;

        let mut remove = QueryBuilder::<Sqlite>::new("DELETE FROM item_shares WHERE item_type = ");
        remove.push_bind(item_type.as_str());
        remove.push(" AND item_id = ");
        remove.push_bind(id);
        if !user_ids.is_empty() {
            remove.push(" AND user_id NOT IN (");
            let mut separated = remove.separated(", ");
            for user_id in &user_ids {
                separated.push_bind(*user_id);
            }
            separated.push_unseparated(")");
        }
        remove
            .build()
            .execute(&mut *tx)
            .await
            .map_err(|e| Self::query_error("DELETE item_shares", format!("{e}")))?;

        for user_id in &user_ids {
            sqlx::query(
                "INSERT OR IGNORE INTO item_shares (item_type, item_id, user_id, create_time) VALUES (?, ?, ?, ?)",
            )
            .bind(item_type.as_str())
            .bind(id)
            .bind(user_id)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| Self::query_error("INSERT item_shares", format!("{e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| Self::query_error("COMMIT set shares", format!("{e}")))
    }

    /// Whether an item is shared with a user.
    pub async fn is_shared_with(
        &self,
        item_type: ItemType,
        id: i64,
        user_id: i64,
    ) -> Result<bool, StorageError> {
        let row = sqlx::query(
            "SELECT 1 AS shared FROM item_shares WHERE item_type = ? AND item_id = ? AND user_id = ?",
        )
        .bind(item_type.as_str())
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Self::query_error("SELECT item_shares", format!("{e}")))?;
        Ok(row.is_some())
    }
}
