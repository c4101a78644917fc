//! Configuration management.
//!
//! This module handles:
//! - Environment variable loading (with `.env` support)
//! - Configuration validation
//! - Default value handling
//! - Secure secret storage via [`SecretString`]
//!
//! # Example
//!
//! ```
//! use flowhub::config::{Config, SecretString, ToolShedEntry};
//!
//! let config = Config {
//!     id_secret: SecretString::new("local-dev-secret"),
//!     bootstrap_admin_api_key: None,
//!     admin_users: vec!["admin@example.org".into()],
//!     database_path: "./data/flowhub.db".into(),
//!     log_level: "info".into(),
//!     bind_address: "127.0.0.1:8080".parse().unwrap(),
//!     enable_notification_system: true,
//!     notification_expiration_days: 180,
//!     notification_cleanup_interval_secs: 3600,
//!     tool_sheds: vec![ToolShedEntry::new("Main", "https://toolshed.g2.bx.psu.edu/")],
//!     toolbox_path: None,
//! };
//!
//! assert!(config.is_admin_email("admin@example.org"));
//! let debug = format!("{:?}", config);
//! assert!(!debug.contains("local-dev-secret"));
//! ```

mod secret;
mod validation;

pub use secret::SecretString;
pub use validation::{
    validate_config, MAX_CLEANUP_INTERVAL_SECS, MAX_EXPIRATION_DAYS, MIN_CLEANUP_INTERVAL_SECS,
};

use std::net::SocketAddr;

use crate::error::ConfigError;

/// Default database path.
pub const DEFAULT_DATABASE_PATH: &str = "./data/flowhub.db";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8080";

/// Default lifetime of a notification, in days.
pub const DEFAULT_NOTIFICATION_EXPIRATION_DAYS: u32 = 180;

/// Default interval between expired-notification sweeps.
pub const DEFAULT_NOTIFICATION_CLEANUP_INTERVAL_SECS: u64 = 3600;

/// Default tool shed list, in `name=url` form.
pub const DEFAULT_TOOL_SHEDS: &str = "Galaxy Main Tool Shed=https://toolshed.g2.bx.psu.edu/";

/// One configured tool shed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolShedEntry {
    /// Display name.
    pub name: String,
    /// Base URL, usually with a trailing slash.
    pub url: String,
}

impl ToolShedEntry {
    /// Create a new entry.
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Application configuration.
///
/// Use [`Config::from_env`] to load configuration from environment variables.
/// Secrets are wrapped in [`SecretString`] so the struct can be logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Secret keying the opaque id encoding.
    pub id_secret: SecretString,
    /// API key that grants admin rights without a user account.
    pub bootstrap_admin_api_key: Option<SecretString>,
    /// Emails of users with admin rights.
    pub admin_users: Vec<String>,
    /// Database path.
    pub database_path: String,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: String,
    /// HTTP listen address.
    pub bind_address: SocketAddr,
    /// Whether the notification endpoints are served.
    pub enable_notification_system: bool,
    /// Default lifetime of new notifications.
    pub notification_expiration_days: u32,
    /// Interval between expired-notification sweeps.
    pub notification_cleanup_interval_secs: u64,
    /// Tool sheds, in priority order.
    pub tool_sheds: Vec<ToolShedEntry>,
    /// JSON file listing installed tools.
    pub toolbox_path: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `ID_SECRET`: secret used to encode database ids
    ///
    /// Optional environment variables (with defaults):
    /// - `DATABASE_PATH` (default: `./data/flowhub.db`)
    /// - `LOG_LEVEL` (default: `info`)
    /// - `BIND_ADDRESS` (default: `127.0.0.1:8080`)
    /// - `ADMIN_USERS`: comma-separated emails (default: none)
    /// - `BOOTSTRAP_ADMIN_API_KEY` (default: unset)
    /// - `ENABLE_NOTIFICATION_SYSTEM` (default: `true`)
    /// - `NOTIFICATION_EXPIRATION_DAYS` (default: `180`)
    /// - `NOTIFICATION_CLEANUP_INTERVAL_SECS` (default: `3600`)
    /// - `TOOL_SHEDS`: comma-separated `name=url` pairs
    /// - `TOOLBOX_PATH`: JSON file of installed tools (default: unset)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `ID_SECRET` is missing, a value does not
    /// parse, or validation fails (see [`validate_config`]).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let id_secret = std::env::var("ID_SECRET").map_err(|_| ConfigError::MissingRequired {
            var: "ID_SECRET".into(),
        })?;

        let bootstrap_admin_api_key = std::env::var("BOOTSTRAP_ADMIN_API_KEY")
            .ok()
            .filter(|v| !v.is_empty())
            .map(SecretString::new);

        let admin_users = std::env::var("ADMIN_USERS")
            .map(|v| parse_list(&v))
            .unwrap_or_default();

        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| DEFAULT_DATABASE_PATH.into());

        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.into());

        let bind_address = std::env::var("BIND_ADDRESS")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.into())
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                var: "BIND_ADDRESS".into(),
                reason: "must be a socket address such as 127.0.0.1:8080".into(),
            })?;

        let enable_notification_system = parse_env_bool("ENABLE_NOTIFICATION_SYSTEM", true)?;
        let notification_expiration_days = parse_env_u32(
            "NOTIFICATION_EXPIRATION_DAYS",
            DEFAULT_NOTIFICATION_EXPIRATION_DAYS,
        )?;
        let notification_cleanup_interval_secs = parse_env_u64(
            "NOTIFICATION_CLEANUP_INTERVAL_SECS",
            DEFAULT_NOTIFICATION_CLEANUP_INTERVAL_SECS,
        )?;

        let tool_sheds = parse_tool_sheds(
            &std::env::var("TOOL_SHEDS").unwrap_or_else(|_| DEFAULT_TOOL_SHEDS.into()),
        )?;

        let toolbox_path = std::env::var("TOOLBOX_PATH").ok().filter(|v| !v.is_empty());

        let config = Self {
            id_secret: SecretString::new(id_secret),
            bootstrap_admin_api_key,
            admin_users,
            database_path,
            log_level,
            bind_address,
            enable_notification_system,
            notification_expiration_days,
            notification_cleanup_interval_secs,
            tool_sheds,
            toolbox_path,
        };

        validate_config(&config)?;
        Ok(config)
    }

    /// Whether the given email belongs to a configured admin.
    #[must_use]
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_users
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(email))
    }
}

/// Split a comma-separated list, dropping blanks.
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Parse `name=url,name=url` into tool shed entries.
fn parse_tool_sheds(value: &str) -> Result<Vec<ToolShedEntry>, ConfigError> {
    parse_list(value)
        .into_iter()
        .map(|pair| match pair.split_once('=') {
            Some((name, url)) if !name.trim().is_empty() && !url.trim().is_empty() => {
                Ok(ToolShedEntry::new(name.trim(), url.trim()))
            }
            _ => Err(ConfigError::InvalidValue {
                var: "TOOL_SHEDS".into(),
                reason: format!("entry '{pair}' must be of the form name=url"),
            }),
        })
        .collect()
}

/// Parse an environment variable as u64, using a default if not set.
fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    std::env::var(name).map_or(Ok(default), |val| {
        val.parse().map_err(|_| ConfigError::InvalidValue {
            var: name.into(),
            reason: "must be a positive integer".into(),
        })
    })
}

/// Parse an environment variable as u32, using a default if not set.
fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    std::env::var(name).map_or(Ok(default), |val| {
        val.parse().map_err(|_| ConfigError::InvalidValue {
            var: name.into(),
            reason: "must be a positive integer".into(),
        })
    })
}

/// Parse an environment variable as a boolean, using a default if not set.
fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    std::env::var(name).map_or(Ok(default), |val| {
        match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                var: name.into(),
                reason: "must be true or false".into(),
            }),
        }
    })
}
