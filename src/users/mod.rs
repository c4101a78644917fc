//! Caller identity and user accounts.
//!
//! Requests are identified by the `x-api-key` header. A key matching the
//! configured bootstrap admin key yields an admin [`Caller`] without a user
//! account; otherwise the key is looked up in the user store, and users whose
//! email is listed in `ADMIN_USERS` are admins.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{Config, SecretString};
use crate::error::AppError;
use crate::security::IdEncoder;
use crate::storage::StoredUser;
use crate::traits::UserStore;

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Who is making a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    /// The authenticated user, `None` for anonymous and bootstrap-admin callers.
    pub user: Option<StoredUser>,
    /// Whether the caller has admin rights.
    pub is_admin: bool,
}

impl Caller {
    /// An unauthenticated caller.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self {
            user: None,
            is_admin: false,
        }
    }

    /// An authenticated user.
    #[must_use]
    pub const fn user(user: StoredUser, is_admin: bool) -> Self {
        Self {
            user: Some(user),
            is_admin,
        }
    }

    /// Admin rights without a user account.
    #[must_use]
    pub const fn bootstrap_admin() -> Self {
        Self {
            user: None,
            is_admin: true,
        }
    }

    /// Id of the authenticated user.
    #[must_use]
    pub fn user_id(&self) -> Option<i64> {
        self.user.as_ref().map(|u| u.id)
    }

    /// The authenticated user, or 403.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`](crate::error::ApiError::Forbidden) for callers without a user account.
    pub fn require_user(&self) -> Result<&StoredUser, AppError> {
        self.user
            .as_ref()
            .ok_or_else(|| AppError::forbidden("You must be logged in to perform this action"))
    }

    /// Succeed only for admins.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`](crate::error::ApiError::Forbidden) for non-admin callers.
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(AppError::forbidden(
                "You must be an administrator to perform this action",
            ))
        }
    }
}

/// Request body of `POST /users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUserRequest {
    /// Public user name.
    pub username: String,
    /// Email address.
    pub email: String,
}

/// A newly created user, including the API key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedUser {
    /// Encoded id.
    pub id: String,
    /// Public user name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// API key to authenticate as this user.
    pub api_key: String,
}

/// Response of `GET /users/current`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Encoded id, `null` for anonymous callers.
    pub id: Option<String>,
    /// User name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Admin rights.
    #[serde(default)]
    pub is_admin: bool,
}

/// User account operations and API-key authentication.
pub struct UsersService {
    store: Arc<dyn UserStore>,
    encoder: IdEncoder,
    admin_users: Vec<String>,
    bootstrap_admin_api_key: Option<SecretString>,
}

impl UsersService {
    /// Create the service.
    #[must_use]
    pub fn new(store: Arc<dyn UserStore>, encoder: IdEncoder, config: &Config) -> Self {
        Self {
            store,
            encoder,
            admin_users: config.admin_users.clone(),
            bootstrap_admin_api_key: config
                .bootstrap_admin_api_key
                .clone()
                .filter(|key| !key.is_empty()),
        }
    }

    /// Resolve the caller from an API key.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`](crate::error::ApiError::Forbidden) for an unknown key.
    pub async fn authenticate(&self, api_key: Option<&str>) -> Result<Caller, AppError> {
        let Some(api_key) = api_key.filter(|k| !k.is_empty()) else {
            return Ok(Caller::anonymous());
        };

        if self
            .bootstrap_admin_api_key
            .as_ref()
            .is_some_and(|key| key.matches(api_key))
        {
            return Ok(Caller::bootstrap_admin());
        }

        let user = self
            .store
            .get_user_by_api_key(api_key)
            .await?
            .ok_or_else(|| AppError::forbidden("Provided API key is not valid"))?;
        let is_admin = self.is_admin_email(&user.email);
        Ok(Caller::user(user, is_admin))
    }

    /// Create a user account. Admin only.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`](crate::error::ApiError::Forbidden) for non-admins and
    /// [`ApiError::BadRequest`](crate::error::ApiError::BadRequest) for invalid or duplicate input.
    pub async fn create_user(
        &self,
        caller: &Caller,
        request: &CreateUserRequest,
    ) -> Result<CreatedUser, AppError> {
        caller.require_admin()?;

        let username = request.username.trim();
        let email = request.email.trim();
        if username.is_empty() {
            return Err(AppError::bad_request("A username is required"));
        }
        if !email.contains('@') {
            return Err(AppError::bad_request(format!(
                "'{email}' is not a valid email address"
            )));
        }
        if self.store.get_user_by_email(email).await?.is_some() {
            return Err(AppError::bad_request(format!(
                "Email '{email}' is already in use"
            )));
        }

        let user = self.store.create_user(username, email).await?;
        tracing::info!(user_id = user.id, username = %user.username, "user created");

        Ok(CreatedUser {
            id: self.encoder.encode(user.id),
            username: user.username,
            email: user.email,
            api_key: user.api_key,
        })
    }

    /// Describe the caller.
    #[must_use]
    pub fn current(&self, caller: &Caller) -> CurrentUser {
        CurrentUser {
            id: caller.user_id().map(|id| self.encoder.encode(id)),
            username: caller.user.as_ref().map(|u| u.username.clone()),
            email: caller.user.as_ref().map(|u| u.email.clone()),
            is_admin: caller.is_admin,
        }
    }

    /// Look up a user by encoded id or, when the reference contains `@`, by
    /// email.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MalformedId`](crate::error::ApiError::MalformedId) for an undecodable id.
    pub async fn find_user(&self, reference: &str) -> Result<Option<StoredUser>, AppError> {
        if reference.contains('@') {
            return Ok(self.store.get_user_by_email(reference).await?);
        }
        let id = self.encoder.decode(reference)?;
        Ok(self.store.get_user(id).await?)
    }

    fn is_admin_email(&self, email: &str) -> bool {
        self.admin_users
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(email))
    }
}
