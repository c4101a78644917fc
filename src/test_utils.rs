//! Test utilities and fixtures.
//!
//! This module provides shared testing infrastructure:
//! - A valid [`Config`] without touching the environment
//! - User fixtures
//! - A fixed-time mock clock
//!
//! Only compiled for tests (`#[cfg(test)]`).

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{DateTime, Utc};

use crate::config::{Config, SecretString, ToolShedEntry};
use crate::storage::StoredUser;
use crate::traits::MockTimeProvider;

/// A valid configuration for unit tests.
#[must_use]
pub fn test_config() -> Config {
    Config {
        id_secret: SecretString::new("test-secret"),
        bootstrap_admin_api_key: None,
        admin_users: vec!["admin@example.org".to_string()],
        database_path: ":memory:".to_string(),
        log_level: "debug".to_string(),
        bind_address: "127.0.0.1:0".parse().unwrap(),
        enable_notification_system: true,
        notification_expiration_days: 30,
        notification_cleanup_interval_secs: 3600,
        tool_sheds: vec![ToolShedEntry::new(
            "Galaxy Main Tool Shed",
            "https://toolshed.g2.bx.psu.edu/",
        )],
        toolbox_path: None,
    }
}

/// A user fixture with a deterministic API key.
#[must_use]
pub fn test_user(id: i64, username: &str, email: &str) -> StoredUser {
    StoredUser {
        id,
        username: username.to_string(),
        email: email.to_string(),
        api_key: format!("key-{id}"),
        create_time: Utc::now(),
    }
}

/// Create a mock time provider that returns a fixed time.
///
/// # Example
///
/// ```ignore
/// let fixed_time = Utc::now();
/// let mock = mock_time(fixed_time);
/// assert_eq!(mock.now(), fixed_time);
/// ```
#[must_use]
pub fn mock_time(time: DateTime<Utc>) -> MockTimeProvider {
    let mut mock = MockTimeProvider::new();
    mock.expect_now().return_const(time);
    mock
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validate_config;
    use crate::traits::TimeProvider;

    #[test]
    fn test_test_config_is_valid() {
        assert!(validate_config(&test_config()).is_ok());
    }

    #[test]
    fn test_test_user() {
        let user = test_user(3, "carol", "carol@example.org");
        assert_eq!(user.id, 3);
        assert_eq!(user.api_key, "key-3");
    }

    #[test]
    fn test_mock_time() {
        let fixed = Utc::now();
        assert_eq!(mock_time(fixed).now(), fixed);
    }
}
