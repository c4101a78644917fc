//! Core `SQLite` storage implementation.
//!
//! This module provides the main [`SqliteStorage`] struct and core database operations.

#![allow(clippy::missing_errors_doc)]

use crate::error::StorageError;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

/// `SQLite` storage backend.
///
/// Provides persistent storage for users, workflows, shareable items,
/// sharing associations and notifications.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pub(crate) pool: SqlitePool,
}

impl SqliteStorage {
    /// Get a clone of the connection pool.
    #[must_use]
    pub fn get_pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    /// Create a new `SQLite` storage instance.
    ///
    /// # Arguments
    ///
    /// * `database_path` - Path to the `SQLite` database file
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ConnectionFailed`] if the connection fails.
    pub async fn new(database_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = database_path.as_ref();

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::ConnectionFailed {
                message: format!("Failed to create database directory: {e}"),
            })?;
        }

        let options =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", path.display()))
                .map_err(|e| StorageError::ConnectionFailed {
                    message: format!("Invalid database path: {e}"),
                })?
                .journal_mode(SqliteJournalMode::Wal)
                .foreign_keys(true)
                .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed {
                message: format!("Failed to connect to database: {e}"),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        tracing::debug!(path = %path.display(), "database ready");
        Ok(storage)
    }

    /// Create a new in-memory `SQLite` storage instance for testing.
    ///
    /// The pool holds exactly one connection that is never recycled, since
    /// every new in-memory connection would start from an empty database.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ConnectionFailed`] if the connection fails.
    pub async fn new_in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::ConnectionFailed {
                message: format!("Invalid memory database options: {e}"),
            })?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed {
                message: format!("Failed to create in-memory database: {e}"),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations.
    ///
    /// Migrations are run in order. Each migration is idempotent (uses IF NOT EXISTS).
    pub(crate) async fn run_migrations(&self) -> Result<(), StorageError> {
        let migrations = [
            ("001", include_str!("../../migrations/001_initial_schema.sql")),
            ("002", include_str!("../../migrations/002_notifications.sql")),
        ];

        for (version, schema) in migrations {
            sqlx::raw_sql(schema)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::MigrationFailed {
                    version: version.to_string(),
                    message: format!("Failed to run migration {version}: {e}"),
                })?;
        }

        Ok(())
    }

    /// Generate a new API key.
    pub(crate) fn generate_api_key() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Format a timestamp for storage.
    ///
    /// Fixed-width microsecond precision keeps lexicographic order equal to
    /// chronological order, so timestamps can be compared in SQL.
    pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Parse a datetime string from the database.
    pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StorageError> {
        s.parse::<DateTime<Utc>>()
            .map_err(|e| StorageError::Internal {
                message: format!("Failed to parse datetime '{s}': {e}"),
            })
    }

    /// Parse an optional datetime column.
    pub(crate) fn parse_optional_datetime(
        s: Option<String>,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        s.as_deref().map(Self::parse_datetime).transpose()
    }

    /// Parse a JSON column.
    pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
        column: &str,
        s: &str,
    ) -> Result<T, StorageError> {
        serde_json::from_str(s).map_err(|e| StorageError::Internal {
            message: format!("Failed to parse JSON column '{column}': {e}"),
        })
    }

    /// Serialize a value for a JSON column.
    pub(crate) fn to_json<T: serde::Serialize>(column: &str, value: &T) -> Result<String, StorageError> {
        serde_json::to_string(value).map_err(|e| StorageError::Internal {
            message: format!("Failed to serialize JSON column '{column}': {e}"),
        })
    }

    /// Create a query error with the given query name and message.
    pub(crate) fn query_error(query: &str, message: String) -> StorageError {
        StorageError::QueryFailed {
            query: query.to_string(),
            message,
        }
    }
}
