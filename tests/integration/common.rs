//! Shared fixtures: a running server and per-identity clients.

#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::sync::Arc;

use flowhub::client::{ClientConfig, FlowhubClient};
use flowhub::config::{Config, SecretString, ToolShedEntry};
use flowhub::error::ClientError;
use flowhub::security::IdEncoder;
use flowhub::server::{serve_with_shutdown, AppState};
use flowhub::storage::SqliteStorage;
use flowhub::toolshed::InstalledToolbox;
use flowhub::users::CreatedUser;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Key of the bootstrap admin.
pub const ADMIN_KEY: &str = "integration-admin-key";

/// Secret of the server's id encoding.
pub const ID_SECRET: &str = "integration-secret";

/// A server on an ephemeral port, stopped on drop.
pub struct TestServer {
    base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
    _temp_dir: TempDir,
}

impl TestServer {
    /// Start with notifications enabled and an empty toolbox.
    pub async fn start() -> Self {
        Self::start_with(|_| {}, InstalledToolbox::default()).await
    }

    /// Start with a customised configuration and toolbox.
    pub async fn start_with(customise: impl FnOnce(&mut Config), toolbox: InstalledToolbox) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("flowhub.db");
        let mut config = Config {
            id_secret: SecretString::new(ID_SECRET),
            bootstrap_admin_api_key: Some(SecretString::new(ADMIN_KEY)),
            admin_users: vec!["admin@example.org".to_string()],
            database_path: db_path.to_str().expect("Invalid path").to_string(),
            log_level: "warn".to_string(),
            bind_address: "127.0.0.1:0".parse().unwrap(),
            enable_notification_system: true,
            notification_expiration_days: 30,
            notification_cleanup_interval_secs: 3600,
            tool_sheds: vec![ToolShedEntry::new(
                "Galaxy Main Tool Shed",
                "https://toolshed.g2.bx.psu.edu/",
            )],
            toolbox_path: None,
        };
        customise(&mut config);

        let storage = SqliteStorage::new(&config.database_path)
            .await
            .expect("Failed to create storage");
        let listener = TcpListener::bind(config.bind_address)
            .await
            .expect("Failed to bind");
        let address = listener.local_addr().unwrap();
        let state = AppState::new(storage, Arc::new(toolbox), config);

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            serve_with_shutdown(listener, state, async {
                let _ = rx.await;
            })
            .await
            .expect("Server failed");
        });

        Self {
            base_url: format!("http://{address}"),
            shutdown: Some(tx),
            handle: Some(handle),
            _temp_dir: temp_dir,
        }
    }

    /// Client authenticated with `api_key`.
    pub fn client(&self, api_key: Option<&str>) -> FlowhubClient {
        let mut config = ClientConfig::new(self.base_url.clone());
        if let Some(key) = api_key {
            config = config.with_api_key(key);
        }
        FlowhubClient::new(config).expect("Failed to build client")
    }

    /// Client acting as the bootstrap admin.
    pub fn admin(&self) -> FlowhubClient {
        self.client(Some(ADMIN_KEY))
    }

    /// Anonymous client.
    pub fn anonymous(&self) -> FlowhubClient {
        self.client(None)
    }

    /// Create a user with a unique name and return it with its client.
    pub async fn new_user(&self) -> (CreatedUser, FlowhubClient) {
        let suffix = Uuid::new_v4().simple().to_string();
        let suffix = &suffix[..12];
        let user = self
            .admin()
            .create_user(&format!("user-{suffix}"), &format!("{suffix}@example.org"))
            .await
            .expect("Failed to create user");
        let client = self.client(Some(&user.api_key));
        (user, client)
    }

    /// Stop the server and wait for it to finish.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.await.expect("Server task panicked");
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Encoded id as the server would produce it.
pub fn encode_id(id: i64) -> String {
    IdEncoder::new(ID_SECRET).encode(id)
}

/// HTTP status of a failed call.
pub fn status_of<T: std::fmt::Debug>(result: Result<T, ClientError>) -> u16 {
    result
        .expect_err("Expected an error response")
        .status()
        .expect("Expected an HTTP status error")
}
