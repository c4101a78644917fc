//! Error types for the flowhub service.
//!
//! This module defines a hierarchical error system:
//! - [`AppError`]: Top-level application errors
//! - [`StorageError`]: Database operation errors
//! - [`ApiError`]: Request-level errors surfaced to HTTP callers
//! - [`ToolIdError`]: Malformed tool-shed tool identifiers
//! - [`ConfigError`]: Configuration errors
//! - [`ClientError`]: HTTP API client errors
//!
//! All errors implement `Send + Sync` for async compatibility.

use thiserror::Error;

/// Top-level application error.
///
/// This is the main error type returned by service operations.
/// It wraps all subsystem errors for unified error handling.
#[derive(Debug, Error)]
pub enum AppError {
    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Request error.
    #[error("{0}")]
    Api(#[from] ApiError),

    /// Tool identifier error.
    #[error("Tool identifier error: {0}")]
    ToolId(#[from] ToolIdError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Listener or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Shorthand for [`ApiError::NotFound`].
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::Api(ApiError::NotFound {
            resource: resource.into(),
        })
    }

    /// Shorthand for [`ApiError::Forbidden`].
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Api(ApiError::Forbidden {
            message: message.into(),
        })
    }

    /// Shorthand for [`ApiError::BadRequest`].
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Api(ApiError::BadRequest {
            message: message.into(),
        })
    }
}

/// Storage errors.
///
/// These errors represent failures in database operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Failed to connect to the database.
    #[error("Database connection failed: {message}")]
    ConnectionFailed {
        /// Description of the connection failure.
        message: String,
    },

    /// A database query failed.
    #[error("Query failed: {query} - {message}")]
    QueryFailed {
        /// The query that failed (may be truncated).
        query: String,
        /// Description of the failure.
        message: String,
    },

    /// Database migration failed.
    #[error("Migration failed: {version} - {message}")]
    MigrationFailed {
        /// The migration version that failed.
        version: String,
        /// Description of the failure.
        message: String,
    },

    /// Internal storage error.
    #[error("Internal storage error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

/// Request-level errors.
///
/// Variants map one-to-one onto HTTP status codes in `server::responses`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The requested object does not exist or is hidden from the caller.
    #[error("{resource} not found")]
    NotFound {
        /// What was looked up.
        resource: String,
    },

    /// The caller may not perform this action.
    #[error("{message}")]
    Forbidden {
        /// Why the action was denied.
        message: String,
    },

    /// The request payload is invalid.
    #[error("{message}")]
    BadRequest {
        /// Description of what's invalid.
        message: String,
    },

    /// An encoded identifier could not be decoded.
    #[error("Malformed id: {id}")]
    MalformedId {
        /// The identifier as received.
        id: String,
    },

    /// A feature is switched off in the server configuration.
    #[error("The {feature} is disabled on this server")]
    FeatureDisabled {
        /// Feature name.
        feature: String,
    },
}

/// Tool-shed tool identifier errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolIdError {
    /// The identifier does not have the six slash-separated fields of a
    /// tool-shed guid.
    #[error("Malformed tool id '{tool_id}': expected 6 '/'-separated fields, found {fields}")]
    Malformed {
        /// The offending identifier.
        tool_id: String,
        /// Number of fields actually present.
        fields: usize,
    },
}

/// Configuration errors.
///
/// These errors represent failures in configuration loading and validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Required configuration is missing.
    #[error("Missing required: {var}")]
    MissingRequired {
        /// The missing variable name.
        var: String,
    },

    /// Configuration value is invalid.
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue {
        /// The variable name.
        var: String,
        /// Why the value is invalid.
        reason: String,
    },
}

/// HTTP API client errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The request could not be sent or the connection failed.
    #[error("Network error: {message}")]
    Network {
        /// Description of the failure.
        message: String,
    },

    /// The request timed out.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout {
        /// Configured timeout.
        timeout_ms: u64,
    },

    /// The server answered with a non-success status.
    #[error("Status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body as text.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("Unexpected response: {message}")]
    UnexpectedResponse {
        /// Description of the failure.
        message: String,
    },
}

impl ClientError {
    /// HTTP status of a [`ClientError::Status`] error.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;

    assert_impl_all!(AppError: Send, Sync, std::error::Error);
    assert_impl_all!(StorageError: Send, Sync, std::error::Error, Clone);
    assert_impl_all!(ApiError: Send, Sync, std::error::Error, Clone);
    assert_impl_all!(ToolIdError: Send, Sync, std::error::Error, Clone);
    assert_impl_all!(ConfigError: Send, Sync, std::error::Error, Clone);
    assert_impl_all!(ClientError: Send, Sync, std::error::Error, Clone);

    #[test]
    fn test_client_error_status() {
        let err = ClientError::Status {
            status: 404,
            body: "{}".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "Status 404: {}");
        assert_eq!(
            ClientError::Timeout { timeout_ms: 10 }.status(),
            None
        );
    }

    #[test]
    fn test_app_error_display_storage() {
        let err = AppError::Storage(StorageError::Internal {
            message: "boom".to_string(),
        });
        assert_eq!(err.to_string(), "Storage error: Internal storage error: boom");
    }

    #[test]
    fn test_app_error_display_api_is_transparent() {
        let err = AppError::not_found("Notification");
        assert_eq!(err.to_string(), "Notification not found");
    }

    #[test]
    fn test_app_error_display_tool_id() {
        let err = AppError::ToolId(ToolIdError::Malformed {
            tool_id: "a/b".to_string(),
            fields: 2,
        });
        assert_eq!(
            err.to_string(),
            "Tool identifier error: Malformed tool id 'a/b': expected 6 '/'-separated fields, found 2"
        );
    }

    #[test]
    fn test_app_error_display_config() {
        let err = AppError::Config(ConfigError::MissingRequired {
            var: "ID_SECRET".to_string(),
        });
        assert_eq!(err.to_string(), "Configuration error: Missing required: ID_SECRET");
    }

    #[test]
    fn test_app_error_from_storage_error() {
        let app_err: AppError = StorageError::ConnectionFailed {
            message: "x".to_string(),
        }
        .into();
        assert!(matches!(app_err, AppError::Storage(_)));
    }

    #[test]
    fn test_app_error_from_tool_id_error() {
        let app_err: AppError = ToolIdError::Malformed {
            tool_id: "x".to_string(),
            fields: 1,
        }
        .into();
        assert!(matches!(app_err, AppError::ToolId(_)));
    }

    #[test]
    fn test_shorthand_constructors() {
        assert!(matches!(
            AppError::forbidden("no"),
            AppError::Api(ApiError::Forbidden { .. })
        ));
        assert!(matches!(
            AppError::bad_request("bad"),
            AppError::Api(ApiError::BadRequest { .. })
        ));
    }

    #[test]
    fn test_feature_disabled_display() {
        let err = ApiError::FeatureDisabled {
            feature: "notification system".to_string(),
        };
        assert_eq!(err.to_string(), "The notification system is disabled on this server");
    }

    #[test]
    fn test_storage_error_query_failed_display() {
        let err = StorageError::QueryFailed {
            query: "SELECT users".to_string(),
            message: "no such table".to_string(),
        };
        assert_eq!(err.to_string(), "Query failed: SELECT users - no such table");
    }
}
