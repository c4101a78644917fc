//! Sharing histories, workflows, pages and visualizations with other users.
//!
//! Replacing an item's share list notifies only the users who were not
//! already on it, with a `new_shared_item` notification that respects each
//! recipient's preferences.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, AppError, StorageError};
use crate::notifications::{
    NewSharedItemContent, NotificationContent, NotificationCreateData, NotificationManager,
};
use crate::security::IdEncoder;
use crate::storage::{ItemType, NewItem, NotificationCategory, NotificationVariant, StoredItem};
use crate::traits::SharingStore;
use crate::users::{Caller, UsersService};

/// Source tag of sharing notifications.
pub const SHARING_NOTIFICATION_SOURCE: &str = "galaxy_sharing_system";

/// Request body of `PUT /{kind}/{id}/share_with_users`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShareWithUsersRequest {
    /// Encoded user ids or emails. Replaces the current share list.
    #[serde(default)]
    pub user_ids: Vec<String>,
}

/// A user an item is shared with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEmail {
    /// Encoded id.
    pub id: String,
    /// Email address.
    pub email: String,
}

/// Sharing state of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharingStatus {
    /// Encoded id.
    pub id: String,
    /// Name or title.
    pub title: String,
    /// Accessible by link.
    pub importable: bool,
    /// Listed publicly.
    pub published: bool,
    /// Users the item is shared with, in share order.
    pub users_shared_with: Vec<UserEmail>,
}

/// Response of `PUT /{kind}/{id}/share_with_users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareWithUsersResponse {
    /// Resulting state.
    #[serde(flatten)]
    pub status: SharingStatus,
    /// References that could not be shared with.
    pub errors: Vec<String>,
}

/// Request body of `POST /histories`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CreateHistoryRequest {
    /// History name, defaults to `Unnamed history`.
    #[serde(default)]
    pub name: Option<String>,
}

/// Request body of `POST /pages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePageRequest {
    /// Page title.
    pub title: String,
    /// URL slug, unique per user.
    pub slug: String,
}

/// Request body of `POST /visualizations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVisualizationRequest {
    /// Visualization title.
    pub title: String,
    /// Optional URL slug.
    #[serde(default)]
    pub slug: Option<String>,
    /// Visualization plugin type.
    #[serde(rename = "type")]
    pub vis_type: String,
    /// Genome build.
    #[serde(default)]
    pub dbkey: Option<String>,
}

/// A newly created item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedItem {
    /// Encoded id.
    pub id: String,
    /// Kind of item.
    pub model_class: ItemType,
    /// Name or title.
    pub title: String,
    /// URL slug.
    pub slug: Option<String>,
    /// Owner's username.
    pub owner: String,
}

/// Item creation and user sharing.
pub struct SharingService {
    store: Arc<dyn SharingStore>,
    users: Arc<UsersService>,
    notifications: Arc<NotificationManager>,
    encoder: IdEncoder,
}

impl SharingService {
    /// Create the service.
    #[must_use]
    pub fn new(
        store: Arc<dyn SharingStore>,
        users: Arc<UsersService>,
        notifications: Arc<NotificationManager>,
        encoder: IdEncoder,
    ) -> Self {
        Self {
            store,
            users,
            notifications,
            encoder,
        }
    }

    /// Replace the users an item is shared with. Owner or admin only.
    ///
    /// Unknown users and the owner are skipped and reported in `errors`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for unknown items and
    /// [`ApiError::Forbidden`] for callers who do not own the item.
    pub async fn share_with_users(
        &self,
        caller: &Caller,
        item_type: ItemType,
        item_id: &str,
        request: &ShareWithUsersRequest,
    ) -> Result<ShareWithUsersResponse, AppError> {
        let item = self.get_owned(caller, item_type, item_id).await?;

        let mut errors = Vec::new();
        let mut user_ids: Vec<i64> = Vec::with_capacity(request.user_ids.len());
        for reference in &request.user_ids {
            let reference = reference.trim();
            match self.users.find_user(reference).await {
                Ok(Some(user)) if user.id == item.user_id => {
                    errors.push("You cannot share resources with yourself.".to_string());
                }
                Ok(Some(user)) => {
                    if !user_ids.contains(&user.id) {
                        user_ids.push(user.id);
                    }
                }
                Ok(None) | Err(AppError::Api(ApiError::MalformedId { .. })) => {
                    errors.push(format!("{reference} is not a valid user."));
                }
                Err(e) => return Err(e),
            }
        }

        let previous: Vec<i64> = self
            .store
            .get_shared_users(item_type, item.id)
            .await?
            .iter()
            .map(|u| u.id)
            .collect();
        let added: Vec<i64> = user_ids
            .iter()
            .copied()
            .filter(|id| !previous.contains(id))
            .collect();

        // Notify first: a failed notification leaves the share list as it
        // was, so the same users count as new on the next attempt.
        if !added.is_empty() {
            let sent = self
                .notifications
                .send_to_users(self.shared_item_notification(&item), added.clone())
                .await?;
            tracing::info!(
                item_type = item_type.as_str(),
                item_id = item.id,
                added = added.len(),
                notified = sent,
                "item shared"
            );
        }
        self.store
            .set_shared_users(item_type, item.id, user_ids)
            .await?;

        let status = self.status(&item).await?;
        Ok(ShareWithUsersResponse { status, errors })
    }

    /// Current sharing state of an item. Owner or admin only.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for unknown items and
    /// [`ApiError::Forbidden`] for callers who do not own the item.
    pub async fn get_sharing_status(
        &self,
        caller: &Caller,
        item_type: ItemType,
        item_id: &str,
    ) -> Result<SharingStatus, AppError> {
        let item = self.get_owned(caller, item_type, item_id).await?;
        self.status(&item).await
    }

    /// Create a history owned by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] for anonymous callers.
    pub async fn create_history(
        &self,
        caller: &Caller,
        request: CreateHistoryRequest,
    ) -> Result<CreatedItem, AppError> {
        let user = caller.require_user()?;
        let name = request
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "Unnamed history".to_string());
        self.create(NewItem::History {
            user_id: user.id,
            name,
        })
        .await
    }

    /// Create a page owned by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] for anonymous callers and
    /// [`ApiError::BadRequest`] for an invalid or already used slug.
    pub async fn create_page(
        &self,
        caller: &Caller,
        request: CreatePageRequest,
    ) -> Result<CreatedItem, AppError> {
        let user = caller.require_user()?;
        if request.title.trim().is_empty() {
            return Err(AppError::bad_request("Page title is required"));
        }
        validate_slug(&request.slug)?;
        self.create(NewItem::Page {
            user_id: user.id,
            title: request.title,
            slug: request.slug,
        })
        .await
    }

    /// Create a visualization owned by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] for anonymous callers and
    /// [`ApiError::BadRequest`] for an invalid slug or missing type.
    pub async fn create_visualization(
        &self,
        caller: &Caller,
        request: CreateVisualizationRequest,
    ) -> Result<CreatedItem, AppError> {
        let user = caller.require_user()?;
        if request.vis_type.trim().is_empty() {
            return Err(AppError::bad_request("Visualization type is required"));
        }
        if let Some(slug) = &request.slug {
            validate_slug(slug)?;
        }
        self.create(NewItem::Visualization {
            user_id: user.id,
            title: request.title,
            slug: request.slug,
            vis_type: request.vis_type,
            dbkey: request.dbkey,
        })
        .await
    }

    async fn create(&self, item: NewItem) -> Result<CreatedItem, AppError> {
        let stored = match self.store.create_item(&item).await {
            Ok(stored) => stored,
            Err(StorageError::QueryFailed { message, .. }) if message.contains("UNIQUE") => {
                return Err(AppError::bad_request(
                    "An item with this slug already exists",
                ));
            }
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(
            item_type = stored.item_type.as_str(),
            item_id = stored.id,
            "item created"
        );
        Ok(CreatedItem {
            id: self.encoder.encode(stored.id),
            model_class: stored.item_type,
            title: stored.name,
            slug: stored.slug,
            owner: stored.owner,
        })
    }

    async fn get_owned(
        &self,
        caller: &Caller,
        item_type: ItemType,
        item_id: &str,
    ) -> Result<StoredItem, AppError> {
        let id = self.encoder.decode(item_id)?;
        let item = self
            .store
            .get_item(item_type, id)
            .await?
            .ok_or_else(|| AppError::not_found(capitalized(item_type)))?;
        if caller.is_admin || caller.user_id() == Some(item.user_id) {
            Ok(item)
        } else {
            Err(AppError::forbidden(format!(
                "{} is not owned by the current user",
                capitalized(item_type)
            )))
        }
    }

    async fn status(&self, item: &StoredItem) -> Result<SharingStatus, AppError> {
        let users = self.store.get_shared_users(item.item_type, item.id).await?;
        Ok(SharingStatus {
            id: self.encoder.encode(item.id),
            title: item.name.clone(),
            importable: item.importable,
            published: item.published,
            users_shared_with: users
                .into_iter()
                .map(|u| UserEmail {
                    id: self.encoder.encode(u.id),
                    email: u.email,
                })
                .collect(),
        })
    }

    fn shared_item_notification(&self, item: &StoredItem) -> NotificationCreateData {
        NotificationCreateData {
            source: SHARING_NOTIFICATION_SOURCE.to_string(),
            category: NotificationCategory::NewSharedItem,
            variant: NotificationVariant::Info,
            content: NotificationContent::NewSharedItem(NewSharedItemContent {
                item_type: item.item_type.as_str().to_string(),
                item_name: item.name.clone(),
                owner_name: item.owner.clone(),
                slug: item
                    .slug
                    .clone()
                    .unwrap_or_else(|| self.encoder.encode(item.id)),
            }),
            publication_time: None,
            expiration_time: None,
        }
    }
}

fn capitalized(item_type: ItemType) -> &'static str {
    match item_type {
        ItemType::History => "History",
        ItemType::Workflow => "Workflow",
        ItemType::Page => "Page",
        ItemType::Visualization => "Visualization",
    }
}

/// Slugs are lowercase letters, digits and `-`.
fn validate_slug(slug: &str) -> Result<(), AppError> {
    let valid = !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(AppError::bad_request(
            "Slug must consist of only lowercase letters, numbers, and the '-' character",
        ))
    }
}
