//! Configuration validation.
//!
//! This module provides validation logic for configuration values,
//! ensuring they are within acceptable ranges.

use url::Url;

use super::Config;
use crate::error::ConfigError;

/// Maximum notification lifetime in days (ten years).
pub const MAX_EXPIRATION_DAYS: u32 = 3650;

/// Minimum interval between cleanup sweeps.
pub const MIN_CLEANUP_INTERVAL_SECS: u64 = 10;

/// Maximum interval between cleanup sweeps (one week).
pub const MAX_CLEANUP_INTERVAL_SECS: u64 = 604_800;

/// Validate configuration values.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] if:
/// - `ID_SECRET` is empty
/// - `NOTIFICATION_EXPIRATION_DAYS` is not between 1 and 3650
/// - `NOTIFICATION_CLEANUP_INTERVAL_SECS` is not between 10 and 604800
/// - a `TOOL_SHEDS` url is not an absolute http(s) URL
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.id_secret.is_empty() {
        return Err(ConfigError::InvalidValue {
            var: "ID_SECRET".into(),
            reason: "must not be empty".into(),
        });
    }

    if config.notification_expiration_days == 0
        || config.notification_expiration_days > MAX_EXPIRATION_DAYS
    {
        return Err(ConfigError::InvalidValue {
            var: "NOTIFICATION_EXPIRATION_DAYS".into(),
            reason: format!("must be between 1 and {MAX_EXPIRATION_DAYS}"),
        });
    }

    if !(MIN_CLEANUP_INTERVAL_SECS..=MAX_CLEANUP_INTERVAL_SECS)
        .contains(&config.notification_cleanup_interval_secs)
    {
        return Err(ConfigError::InvalidValue {
            var: "NOTIFICATION_CLEANUP_INTERVAL_SECS".into(),
            reason: format!(
                "must be between {MIN_CLEANUP_INTERVAL_SECS} and {MAX_CLEANUP_INTERVAL_SECS}"
            ),
        });
    }

    for shed in &config.tool_sheds {
        let valid = Url::parse(&shed.url)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
            .unwrap_or(false);
        if !valid {
            return Err(ConfigError::InvalidValue {
                var: "TOOL_SHEDS".into(),
                reason: format!("'{}' is not an http(s) URL", shed.url),
            });
        }
    }

    Ok(())
}
