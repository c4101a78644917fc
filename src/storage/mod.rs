//! Storage backend.
//!
//! This module provides:
//! - `SQLite` database implementation
//! - User lookups by id, email and API key
//! - Workflow listing, versions, invocation counts and menu entries
//! - Shareable items and their share lists
//! - Notification persistence and preferences
//!
//! # Architecture
//!
//! The storage layer uses `SQLite` with the `sqlx` crate for async operations.
//! Multi-statement writes run inside a transaction.
//!
//! The implementation is split across submodules for maintainability:
//! - `core`: Pool management, migrations, and helper functions
//! - `users`: User operations
//! - `workflows`: Workflow operations, including the index query
//! - `items`: Histories, pages, visualizations and sharing
//! - `notifications`: Notification operations
//! - `trait_impl`: Store trait implementations
//!
//! # Example
//!
//! ```ignore
//! use flowhub::storage::SqliteStorage;
//!
//! let storage = SqliteStorage::new("./data/flowhub.db").await?;
//! let user = storage.create_user("alice", "alice@example.org").await?;
//! ```

mod core;
mod items;
mod notifications;
mod trait_impl;
mod types;
mod users;
mod workflows;

pub use self::core::SqliteStorage;
pub use types::{
    ItemType, NewItem, NewNotification, NewWorkflow, NotificationCategory, NotificationVariant,
    StoredItem, StoredNotification, StoredPreference, StoredUser, StoredUserNotification,
    StoredWorkflow, StoredWorkflowVersion, UserNotificationChanges, WorkflowStep, WorkflowUpdate,
};
