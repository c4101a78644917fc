//! Sharing and the `new_shared_item` notifications it triggers.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use flowhub::client::FlowhubClient;
use flowhub::sharing::{CreatePageRequest, CreateVisualizationRequest};
use flowhub::storage::{ItemType, NotificationCategory};
use flowhub::workflows::CreateWorkflowRequest;
use pretty_assertions::assert_eq;
use serde_json::Value;
use uuid::Uuid;

use super::common::{status_of, TestServer};

/// Create one item of every shareable kind, returning `(kind, id)` pairs.
async fn create_items(owner: &FlowhubClient) -> Vec<(ItemType, String)> {
    let slug = |prefix: &str| format!("{prefix}-{}", &Uuid::new_v4().simple().to_string()[..8]);

    let history = owner.create_history("Shared history").await.unwrap();
    let workflow = owner
        .create_workflow(&CreateWorkflowRequest {
            name: "Shared workflow".to_string(),
            ..CreateWorkflowRequest::default()
        })
        .await
        .unwrap();
    let page = owner
        .create_page(&CreatePageRequest {
            title: "Shared page".to_string(),
            slug: slug("page"),
        })
        .await
        .unwrap();
    let visualization = owner
        .create_visualization(&CreateVisualizationRequest {
            title: "Shared visualization".to_string(),
            slug: Some(slug("vis")),
            vis_type: "example".to_string(),
            dbkey: None,
        })
        .await
        .unwrap();

    vec![
        (ItemType::History, history.id),
        (ItemType::Workflow, workflow.id),
        (ItemType::Page, page.id),
        (ItemType::Visualization, visualization.id),
    ]
}

async fn opt_out_of_shared_items(client: &FlowhubClient) {
    let mut preferences = client.preferences().await.unwrap();
    preferences
        .preferences
        .get_mut(&NotificationCategory::NewSharedItem)
        .expect("new_shared_item preference")
        .enabled = false;
    client.update_preferences(&preferences).await.unwrap();
}

#[tokio::test]
async fn test_sharing_notifies_only_opted_in_users() {
    let server = TestServer::start().await;
    let (_, owner) = server.new_user().await;
    let (opted_in, opted_in_client) = server.new_user().await;
    let (opted_out, opted_out_client) = server.new_user().await;
    opt_out_of_shared_items(&opted_out_client).await;

    for (item_type, id) in create_items(&owner).await {
        let shared = owner
            .share_with_users(item_type, &id, &[&opted_in.id, &opted_out.email])
            .await
            .unwrap();
        assert!(shared.errors.is_empty(), "{:?}", shared.errors);
        assert_eq!(shared.status.users_shared_with.len(), 2);
    }

    let received = opted_in_client.notifications(None, None).await.unwrap();
    assert_eq!(received.len(), 4);
    assert!(received
        .iter()
        .all(|n| n.notification.category == NotificationCategory::NewSharedItem));
    let kinds: Vec<&Value> = received
        .iter()
        .map(|n| &n.notification.content["item_type"])
        .collect();
    for kind in ["history", "workflow", "page", "visualization"] {
        assert!(kinds.iter().any(|k| k.as_str() == Some(kind)), "{kind}");
    }

    assert!(opted_out_client
        .notifications(None, None)
        .await
        .unwrap()
        .is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_sharing_again_does_not_renotify() {
    let server = TestServer::start().await;
    let (_, owner) = server.new_user().await;
    let (friend, friend_client) = server.new_user().await;
    let history = owner.create_history("Twice").await.unwrap();

    for _ in 0..2 {
        owner
            .share_with_users(ItemType::History, &history.id, &[&friend.id])
            .await
            .unwrap();
    }

    assert_eq!(friend_client.notifications(None, None).await.unwrap().len(), 1);
    server.stop().await;
}

#[tokio::test]
async fn test_share_reports_invalid_users() {
    let server = TestServer::start().await;
    let (me, owner) = server.new_user().await;
    let page = owner
        .create_page(&CreatePageRequest {
            title: "Mine".to_string(),
            slug: "mine".to_string(),
        })
        .await
        .unwrap();

    let shared = owner
        .share_with_users(
            ItemType::Page,
            &page.id,
            &[&me.id, "nobody@example.org", "garbage"],
        )
        .await
        .unwrap();

    assert_eq!(
        shared.errors,
        vec![
            "You cannot share resources with yourself.".to_string(),
            "nobody@example.org is not a valid user.".to_string(),
            "garbage is not a valid user.".to_string(),
        ]
    );
    assert!(shared.status.users_shared_with.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_only_owner_sees_sharing_status() {
    let server = TestServer::start().await;
    let (_, owner) = server.new_user().await;
    let (_, stranger) = server.new_user().await;
    let history = owner.create_history("Private").await.unwrap();

    let status = owner
        .sharing_status(ItemType::History, &history.id)
        .await
        .unwrap();
    assert_eq!(status.title, "Private");

    assert_eq!(
        status_of(stranger.sharing_status(ItemType::History, &history.id).await),
        403
    );
    assert_eq!(
        status_of(
            server
                .anonymous()
                .share_with_users(ItemType::History, &history.id, &[])
                .await
        ),
        403
    );

    server.stop().await;
}

#[tokio::test]
async fn test_page_slug_must_be_valid() {
    let server = TestServer::start().await;
    let (_, owner) = server.new_user().await;

    let result = owner
        .create_page(&CreatePageRequest {
            title: "Bad".to_string(),
            slug: "Not A Slug".to_string(),
        })
        .await;
    assert_eq!(status_of(result), 400);

    server.stop().await;
}
