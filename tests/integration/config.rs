//! Configuration and startup wiring.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::Write;
use std::sync::Arc;

use flowhub::client::{ClientConfig, FlowhubClient};
use flowhub::config::Config;
use flowhub::error::ConfigError;
use flowhub::server::{serve_with_shutdown, AppState};
use flowhub::storage::SqliteStorage;
use flowhub::toolshed::{InstalledToolbox, Toolbox};
use serial_test::serial;
use tempfile::{NamedTempFile, TempDir};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

const VARS: [&str; 5] = [
    "ID_SECRET",
    "DATABASE_PATH",
    "BIND_ADDRESS",
    "BOOTSTRAP_ADMIN_API_KEY",
    "TOOLBOX_PATH",
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_config_requires_id_secret() {
    clear_env();

    let result = Config::from_env();

    if let Err(ConfigError::MissingRequired { var }) = result {
        assert_eq!(var, "ID_SECRET");
    } else {
        panic!("Expected MissingRequired error, got: {result:?}");
    }
}

#[test]
fn test_toolbox_file_is_loaded() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"[{{"id": "toolshed.g2.bx.psu.edu/repos/devteam/fastqc/fastqc/0.73", "version": "0.73"}}, {{"id": "cat1"}}]"#
    )
    .unwrap();

    let toolbox = InstalledToolbox::load(file.path()).unwrap();

    assert_eq!(toolbox.len(), 2);
    assert!(toolbox.has_tool("cat1"));
    assert!(!toolbox.is_missing_shed_tool("toolshed.g2.bx.psu.edu/repos/devteam/fastqc/fastqc/0.73"));
    assert!(toolbox.is_missing_shed_tool("toolshed.g2.bx.psu.edu/repos/iuc/bwa/bwa/0.7"));
}

#[test]
fn test_unreadable_toolbox_file_is_rejected() {
    let result = InstalledToolbox::load("/nonexistent/toolbox.json");
    assert!(matches!(
        result,
        Err(ConfigError::InvalidValue { ref var, .. }) if var == "TOOLBOX_PATH"
    ));
}

#[tokio::test]
#[serial]
async fn test_server_starts_from_environment() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("flowhub.db");
    std::env::set_var("ID_SECRET", "from-env");
    std::env::set_var("DATABASE_PATH", db_path.to_str().unwrap());
    std::env::set_var("BIND_ADDRESS", "127.0.0.1:0");
    std::env::set_var("BOOTSTRAP_ADMIN_API_KEY", "env-admin");

    let config = Config::from_env().unwrap();
    clear_env();

    let storage = SqliteStorage::new(&config.database_path).await.unwrap();
    let listener = TcpListener::bind(config.bind_address).await.unwrap();
    let address = listener.local_addr().unwrap();
    let state = AppState::new(storage, Arc::new(InstalledToolbox::default()), config);
    let (tx, rx) = oneshot::channel::<()>();
    let server = tokio::spawn(serve_with_shutdown(listener, state, async {
        let _ = rx.await;
    }));

    let admin =
        FlowhubClient::new(ClientConfig::new(format!("http://{address}")).with_api_key("env-admin"))
            .unwrap();
    admin.health().await.unwrap();
    let current = admin.current_user().await.unwrap();
    assert!(current.is_admin);
    assert!(current.id.is_none());
    assert!(db_path.exists());

    tx.send(()).unwrap();
    server.await.unwrap().unwrap();
}
