//! flowhub server binary entry point.
//!
//! Logs go to stderr, as JSON when `LOG_FORMAT=json`.
//!
//! Coverage is excluded because the main function only wires the
//! components that the library tests cover.

// Enable the coverage attribute when running with nightly for llvm-cov exclusions
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use std::sync::Arc;
use std::time::Duration;

use flowhub::config::Config;
use flowhub::notifications::NotificationManager;
use flowhub::server::{serve, AppState, TransportConfig};
use flowhub::storage::SqliteStorage;
use flowhub::toolshed::{InstalledToolbox, Toolbox};
use tracing_subscriber::EnvFilter;

#[cfg_attr(coverage_nightly, coverage(off))]
#[tokio::main]
async fn main() {
    init_logging();

    tracing::info!("flowhub starting...");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        database = %config.database_path,
        bind = %config.bind_address,
        notifications = config.enable_notification_system,
        "Configuration loaded"
    );

    let toolbox: Arc<dyn Toolbox> = match config.toolbox_path.as_deref() {
        Some(path) => match InstalledToolbox::load(path) {
            Ok(toolbox) => Arc::new(toolbox),
            Err(e) => {
                tracing::error!("Toolbox error: {e}");
                std::process::exit(1);
            }
        },
        None => Arc::new(InstalledToolbox::default()),
    };

    let storage = match SqliteStorage::new(&config.database_path).await {
        Ok(storage) => storage,
        Err(e) => {
            tracing::error!("Storage error: {e}");
            std::process::exit(1);
        }
    };

    let transport = TransportConfig::new(config.bind_address);
    let cleanup_interval = Duration::from_secs(config.notification_cleanup_interval_secs);
    let state = AppState::new(storage, toolbox, config);
    let cleanup = tokio::spawn(run_cleanup(state.notifications.clone(), cleanup_interval));

    if let Err(e) = serve(state, &transport).await {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }

    cleanup.abort();
    tracing::info!("flowhub shutdown complete");
}

#[cfg_attr(coverage_nightly, coverage(off))]
fn init_logging() {
    let filter = std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .parse()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);

    if std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
async fn run_cleanup(notifications: Arc<NotificationManager>, interval: Duration) {
    if !notifications.is_enabled() || interval.is_zero() {
        return;
    }
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        match notifications.cleanup_expired_notifications().await {
            Ok(0) => {}
            Ok(removed) => tracing::info!(removed, "expired notifications removed"),
            Err(e) => tracing::warn!(error = %e, "notification cleanup failed"),
        }
    }
}
