//! Server types and shared state.
//!
//! This module defines the application state shared by all request
//! handlers.

use std::sync::Arc;

use crate::config::Config;
use crate::notifications::NotificationManager;
use crate::security::IdEncoder;
use crate::sharing::SharingService;
use crate::storage::SqliteStorage;
use crate::toolshed::{ToolShedRegistry, Toolbox};
use crate::traits::{RealTimeProvider, TimeProvider};
use crate::users::UsersService;
use crate::workflows::{StepToolCollector, WorkflowsService};

/// Shared application state for all request handlers.
///
/// Every service is behind an `Arc`, so cloning the state per request is
/// cheap.
#[derive(Clone)]
pub struct AppState {
    /// Storage backend.
    pub storage: Arc<SqliteStorage>,
    /// Caller authentication and user accounts.
    pub users: Arc<UsersService>,
    /// Workflow listing and management.
    pub workflows: Arc<WorkflowsService>,
    /// Notification delivery.
    pub notifications: Arc<NotificationManager>,
    /// Item creation and sharing.
    pub sharing: Arc<SharingService>,
    /// Server configuration.
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire the services over one storage backend.
    ///
    /// # Arguments
    ///
    /// * `storage` - The storage backend
    /// * `toolbox` - Snapshot of locally installed tools
    /// * `config` - Server configuration
    #[must_use]
    pub fn new(storage: SqliteStorage, toolbox: Arc<dyn Toolbox>, config: Config) -> Self {
        Self::with_clock(storage, toolbox, config, Arc::new(RealTimeProvider))
    }

    /// Like [`AppState::new`] with an explicit clock.
    #[must_use]
    pub fn with_clock(
        storage: SqliteStorage,
        toolbox: Arc<dyn Toolbox>,
        config: Config,
        clock: Arc<dyn TimeProvider>,
    ) -> Self {
        let storage = Arc::new(storage);
        let encoder = IdEncoder::new(config.id_secret.expose());

        let users = Arc::new(UsersService::new(storage.clone(), encoder.clone(), &config));
        let notifications = Arc::new(NotificationManager::new(
            storage.clone(),
            storage.clone(),
            clock,
            encoder.clone(),
            &config,
        ));
        let sharing = Arc::new(SharingService::new(
            storage.clone(),
            users.clone(),
            notifications.clone(),
            encoder.clone(),
        ));
        let workflows = Arc::new(WorkflowsService::new(
            storage.clone(),
            storage.clone(),
            Arc::new(StepToolCollector),
            toolbox,
            ToolShedRegistry::new(&config.tool_sheds),
            encoder,
        ));

        Self {
            storage,
            users,
            workflows,
            notifications,
            sharing,
            config: Arc::new(config),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
