//! Notification delivery and per-recipient state, end to end.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{Duration, Utc};
use flowhub::notifications::{
    BroadcastContent, MessageContent, NotificationContent, NotificationCreateData,
    NotificationCreateRequest, NotificationRecipients, UserNotificationsBatchUpdateRequest,
};
use flowhub::storage::{NotificationCategory, NotificationVariant, UserNotificationChanges};
use flowhub::toolshed::InstalledToolbox;
use pretty_assertions::assert_eq;

use super::common::{encode_id, status_of, TestServer};

fn message(subject: &str) -> NotificationCreateData {
    NotificationCreateData {
        source: "integration_tests".to_string(),
        category: NotificationCategory::Message,
        variant: NotificationVariant::Info,
        content: NotificationContent::Message(MessageContent {
            subject: subject.to_string(),
            message: format!("{subject} body"),
        }),
        publication_time: None,
        expiration_time: None,
    }
}

fn broadcast(subject: &str) -> NotificationCreateData {
    NotificationCreateData {
        source: "integration_tests".to_string(),
        category: NotificationCategory::Broadcast,
        variant: NotificationVariant::Urgent,
        content: NotificationContent::Broadcast(BroadcastContent {
            subject: subject.to_string(),
            message: format!("{subject} body"),
            action_links: None,
        }),
        publication_time: None,
        expiration_time: None,
    }
}

fn to_users(user_ids: &[&str], notification: NotificationCreateData) -> NotificationCreateRequest {
    NotificationCreateRequest {
        recipients: NotificationRecipients {
            user_ids: user_ids.iter().map(ToString::to_string).collect(),
        },
        notification,
    }
}

#[tokio::test]
async fn test_notification_sent_to_every_recipient() {
    let server = TestServer::start().await;
    let before = Utc::now() - Duration::seconds(1);
    let (alice, alice_client) = server.new_user().await;
    let (bob, bob_client) = server.new_user().await;
    let (carol, carol_client) = server.new_user().await;

    let created = server
        .admin()
        .send_notification(&to_users(
            &[&alice.id, &bob.id, &carol.id],
            message("Hello"),
        ))
        .await
        .unwrap();
    assert_eq!(created.total_notifications_sent, 3);

    for client in [&alice_client, &bob_client, &carol_client] {
        let status = client.notification_status(before).await.unwrap();
        assert_eq!(status.total_unread_count, 1);
        assert_eq!(status.notifications.len(), 1);
        assert_eq!(
            status.notifications[0].notification.id,
            created.notification.as_ref().unwrap().id
        );
        assert!(status.notifications[0].seen_time.is_none());
    }

    server.stop().await;
}

#[tokio::test]
async fn test_duplicate_and_unknown_recipients_are_dropped() {
    let server = TestServer::start().await;
    let (alice, alice_client) = server.new_user().await;
    let unknown = encode_id(999_999);

    let created = server
        .admin()
        .send_notification(&to_users(&[&alice.id, &alice.id, &unknown], message("Once")))
        .await
        .unwrap();
    assert_eq!(created.total_notifications_sent, 1);
    assert_eq!(alice_client.notifications(None, None).await.unwrap().len(), 1);

    let nobody = server
        .admin()
        .send_notification(&to_users(&[&unknown], message("Nobody")))
        .await
        .unwrap();
    assert_eq!(nobody.total_notifications_sent, 0);
    assert!(nobody.notification.is_none());

    server.stop().await;
}

#[tokio::test]
async fn test_broadcast_visible_to_everyone() {
    let server = TestServer::start().await;
    let before = Utc::now() - Duration::seconds(1);
    let (_, user_client) = server.new_user().await;

    let created = server
        .admin()
        .create_broadcast(&broadcast("Maintenance"))
        .await
        .unwrap();
    assert_eq!(created.total_notifications_sent, 1);

    let anonymous = server.anonymous().notification_status(before).await.unwrap();
    assert_eq!(anonymous.total_unread_count, 0);
    assert!(anonymous.notifications.is_empty());
    assert_eq!(anonymous.broadcasts.len(), 1);
    assert_eq!(anonymous.broadcasts[0].id, created.notification.as_ref().unwrap().id);

    let status = user_client.notification_status(before).await.unwrap();
    assert_eq!(status.total_unread_count, 0);
    assert_eq!(status.broadcasts.len(), 1);

    let fetched = server
        .anonymous()
        .broadcast(&created.notification.as_ref().unwrap().id)
        .await
        .unwrap();
    assert_eq!(fetched.category, NotificationCategory::Broadcast);
    assert_eq!(server.anonymous().broadcasts().await.unwrap().len(), 1);

    server.stop().await;
}

#[tokio::test]
async fn test_broadcast_endpoint_requires_broadcast_category() {
    let server = TestServer::start().await;
    let result = server.admin().create_broadcast(&message("Nope")).await;
    assert_eq!(status_of(result), 400);
    server.stop().await;
}

#[tokio::test]
async fn test_mark_seen_lowers_unread_count() {
    let server = TestServer::start().await;
    let before = Utc::now() - Duration::seconds(1);
    let (user, client) = server.new_user().await;
    let admin = server.admin();

    let first = admin
        .send_notification(&to_users(&[&user.id], message("First")))
        .await
        .unwrap();
    admin
        .send_notification(&to_users(&[&user.id], message("Second")))
        .await
        .unwrap();
    assert_eq!(
        client.notification_status(before).await.unwrap().total_unread_count,
        2
    );

    client
        .update_notification(
            &first.notification.as_ref().unwrap().id,
            UserNotificationChanges {
                seen: Some(true),
                deleted: None,
            },
        )
        .await
        .unwrap();

    let status = client.notification_status(before).await.unwrap();
    assert_eq!(status.total_unread_count, 1);
    assert_eq!(status.notifications.len(), 2);
    let seen = client
        .notification(&first.notification.as_ref().unwrap().id)
        .await
        .unwrap();
    assert!(seen.seen_time.is_some());

    server.stop().await;
}

#[tokio::test]
async fn test_delete_only_affects_one_recipient() {
    let server = TestServer::start().await;
    let (alice, alice_client) = server.new_user().await;
    let (bob, bob_client) = server.new_user().await;

    let created = server
        .admin()
        .send_notification(&to_users(&[&alice.id, &bob.id], message("Shared")))
        .await
        .unwrap();
    let id = created.notification.unwrap().id;

    alice_client.delete_notification(&id).await.unwrap();

    assert_eq!(status_of(alice_client.notification(&id).await), 404);
    let for_bob = bob_client.notification(&id).await.unwrap();
    assert!(!for_bob.deleted);
    assert!(alice_client.notifications(None, None).await.unwrap().is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_only_admins_create_notifications() {
    let server = TestServer::start().await;
    let (user, client) = server.new_user().await;
    let request = to_users(&[&user.id], message("Sneaky"));

    assert_eq!(status_of(client.send_notification(&request).await), 403);
    assert_eq!(
        status_of(server.anonymous().send_notification(&request).await),
        403
    );
    assert_eq!(
        status_of(client.create_broadcast(&broadcast("Sneaky")).await),
        403
    );
    assert_eq!(
        status_of(server.anonymous().create_broadcast(&broadcast("Sneaky")).await),
        403
    );

    server.stop().await;
}

#[tokio::test]
async fn test_other_users_notification_is_not_found() {
    let server = TestServer::start().await;
    let (alice, _) = server.new_user().await;
    let (_, bob_client) = server.new_user().await;

    let created = server
        .admin()
        .send_notification(&to_users(&[&alice.id], message("Private")))
        .await
        .unwrap();
    let id = created.notification.unwrap().id;

    assert_eq!(status_of(bob_client.notification(&id).await), 404);
    assert_eq!(status_of(server.anonymous().notification(&id).await), 404);
    assert_eq!(status_of(bob_client.notification("not-an-id").await), 400);

    server.stop().await;
}

#[tokio::test]
async fn test_batch_update_marks_all_seen() {
    let server = TestServer::start().await;
    let before = Utc::now() - Duration::seconds(1);
    let (user, client) = server.new_user().await;
    let admin = server.admin();

    let mut ids = Vec::new();
    for subject in ["One", "Two"] {
        let created = admin
            .send_notification(&to_users(&[&user.id], message(subject)))
            .await
            .unwrap();
        ids.push(created.notification.unwrap().id);
    }

    let updated = client
        .update_notifications(&UserNotificationsBatchUpdateRequest {
            notification_ids: ids,
            changes: UserNotificationChanges {
                seen: Some(true),
                deleted: None,
            },
        })
        .await
        .unwrap();
    assert_eq!(updated.total_updated, 2);
    assert_eq!(
        client.notification_status(before).await.unwrap().total_unread_count,
        0
    );

    server.stop().await;
}

#[tokio::test]
async fn test_disabled_category_is_not_delivered() {
    let server = TestServer::start().await;
    let (alice, alice_client) = server.new_user().await;
    let (bob, bob_client) = server.new_user().await;

    let mut preferences = alice_client.preferences().await.unwrap();
    preferences
        .preferences
        .get_mut(&NotificationCategory::Message)
        .expect("message preference")
        .enabled = false;
    let saved = alice_client.update_preferences(&preferences).await.unwrap();
    assert!(!saved.preferences[&NotificationCategory::Message].enabled);
    assert!(saved.preferences[&NotificationCategory::NewSharedItem].enabled);

    let created = server
        .admin()
        .send_notification(&to_users(&[&alice.id, &bob.id], message("Opt-out")))
        .await
        .unwrap();
    assert_eq!(created.total_notifications_sent, 1);
    assert!(alice_client.notifications(None, None).await.unwrap().is_empty());
    assert_eq!(bob_client.notifications(None, None).await.unwrap().len(), 1);

    server.stop().await;
}

#[tokio::test]
async fn test_future_publication_is_hidden_until_published() {
    let server = TestServer::start().await;
    let (user, client) = server.new_user().await;

    let mut data = message("Later");
    data.publication_time = Some(Utc::now() + Duration::hours(1));
    server
        .admin()
        .send_notification(&to_users(&[&user.id], data))
        .await
        .unwrap();

    assert!(client.notifications(None, None).await.unwrap().is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_disabled_notification_system_is_forbidden() {
    let server = TestServer::start_with(
        |config| config.enable_notification_system = false,
        InstalledToolbox::default(),
    )
    .await;
    let (_, client) = server.new_user().await;

    assert_eq!(
        status_of(client.notification_status(Utc::now()).await),
        403
    );
    assert_eq!(
        status_of(server.admin().create_broadcast(&broadcast("Off")).await),
        403
    );

    server.stop().await;
}
