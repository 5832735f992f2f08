//! Webhook dispatcher handlers against the in-memory store.

mod common;

use serde_json::json;

use common::{conversation_create, event, inbound_content, inbound_message, memory_db};
use frontdesk_core::{
    AuthorType, ConversationType, Error, MessageContent, PageRequest, Permission, ReaderType,
    Visibility,
};
use frontdesk_db::test_fixtures::Seed;
use frontdesk_db::Database;
use frontdesk_jobs::{Dispatch, WebhookDispatcher};

async fn message_count(db: &Database, conversation_id: uuid::Uuid) -> usize {
    let admin = Seed::new(db).staff("Root", &[Permission::Admin]).await;
    db.messages
        .list(
            &Visibility::for_staff(&admin),
            Some(conversation_id),
            &PageRequest::first(100),
        )
        .await
        .unwrap()
        .items
        .len()
}

#[tokio::test]
async fn test_conversation_create_stores_customer_and_conversation() {
    let db = memory_db();
    let dispatcher = WebhookDispatcher::new(db.clone());

    let outcome = dispatcher
        .dispatch(&conversation_create("evt-1", "c-1", "u-1", json!({"vip": true})))
        .await
        .unwrap();
    assert_eq!(outcome, Dispatch::Handled);

    let customer = db
        .customers
        .find_by_sunshine_user_id("u-1")
        .await
        .unwrap()
        .expect("customer stored");
    assert_eq!(customer.display_name.as_deref(), Some("Grace Hopper"));
    assert_eq!(customer.locale.as_deref(), Some("en-US"));

    let conversation = db
        .conversations
        .find_by_external_id("c-1")
        .await
        .unwrap()
        .expect("conversation stored");
    assert_eq!(conversation.conversation_type, ConversationType::Customer);
    assert_eq!(conversation.customer_id, Some(customer.id));
    assert_eq!(conversation.source.as_deref(), Some("whatsapp"));
    assert_eq!(conversation.metadata, json!({"vip": true}));
}

#[tokio::test]
async fn test_conversation_create_replay_keeps_local_fields() {
    let db = memory_db();
    let dispatcher = WebhookDispatcher::new(db.clone());

    dispatcher
        .dispatch(&conversation_create("evt-1", "c-1", "u-1", json!({"vip": true})))
        .await
        .unwrap();
    let mut replay = conversation_create("evt-2", "c-1", "u-1", json!({"vip": false}));
    replay.payload["source"] = json!({"type": "messenger"});
    dispatcher.dispatch(&replay).await.unwrap();

    let conversation = db
        .conversations
        .find_by_external_id("c-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conversation.metadata, json!({"vip": true}));
    assert_eq!(conversation.source.as_deref(), Some("whatsapp"));
}

#[tokio::test]
async fn test_conversation_create_without_user_is_rejected() {
    let db = memory_db();
    let dispatcher = WebhookDispatcher::new(db.clone());

    let err = dispatcher
        .dispatch(&event(
            "evt-1",
            "conversation:create",
            json!({"conversation": {"id": "c-1"}}),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unprocessable(_)));
    assert!(db.conversations.find_by_external_id("c-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_inbound_message_replay_creates_one_row() {
    let db = memory_db();
    let dispatcher = WebhookDispatcher::new(db.clone());
    dispatcher
        .dispatch(&conversation_create("evt-1", "c-1", "u-1", json!({})))
        .await
        .unwrap();

    let inbound = inbound_message("evt-2", "c-1", "u-1", "m-1", "where is my order?");
    dispatcher.dispatch(&inbound).await.unwrap();
    dispatcher.dispatch(&inbound).await.unwrap();

    let conversation = db
        .conversations
        .find_by_external_id("c-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message_count(&db, conversation.id).await, 1);

    let stored = db.messages.find_by_external_id("m-1").await.unwrap().unwrap();
    assert_eq!(stored.author_type, AuthorType::Customer);
    assert_eq!(stored.content, MessageContent::text("where is my order?"));
    assert_eq!(stored.metadata, json!({}));
    let customer = db
        .customers
        .find_by_sunshine_user_id("u-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.author_id, Some(customer.id));
}

#[tokio::test]
async fn test_inbound_content_is_stored_verbatim() {
    let db = memory_db();
    let dispatcher = WebhookDispatcher::new(db.clone());
    dispatcher
        .dispatch(&conversation_create("evt-1", "c-1", "u-1", json!({})))
        .await
        .unwrap();

    let with_actions = json!({
        "type": "text",
        "text": "pick one",
        "actions": [{"type": "reply", "text": "Yes", "payload": "YES"}]
    });
    dispatcher
        .dispatch(&inbound_content("evt-2", "c-1", "u-1", "m-1", with_actions.clone()))
        .await
        .unwrap();
    let stored = db.messages.find_by_external_id("m-1").await.unwrap().unwrap();
    assert_eq!(stored.content.as_json(), &with_actions);

    let file = json!({
        "type": "file",
        "mediaUrl": "https://cdn.example.com/invoice.pdf",
        "mediaType": "application/pdf"
    });
    let outcome = dispatcher
        .dispatch(&inbound_content("evt-3", "c-1", "u-1", "m-2", file.clone()))
        .await
        .unwrap();
    assert_eq!(outcome, Dispatch::Handled);
    let stored = db.messages.find_by_external_id("m-2").await.unwrap().unwrap();
    assert_eq!(stored.content.content_type(), Some("file"));
    assert_eq!(stored.content.as_json(), &file);
}

#[tokio::test]
async fn test_inbound_message_touches_conversation() {
    let db = memory_db();
    let dispatcher = WebhookDispatcher::new(db.clone());
    dispatcher
        .dispatch(&conversation_create("evt-1", "c-1", "u-1", json!({})))
        .await
        .unwrap();
    let before = db
        .conversations
        .find_by_external_id("c-1")
        .await
        .unwrap()
        .unwrap();

    dispatcher
        .dispatch(&inbound_message("evt-2", "c-1", "u-1", "m-1", "hi"))
        .await
        .unwrap();
    let after = db.conversations.get(before.id).await.unwrap().unwrap();
    assert!(after.updated_at >= before.updated_at);
}

#[tokio::test]
async fn test_inbound_message_for_unknown_conversation_is_not_found() {
    let db = memory_db();
    let dispatcher = WebhookDispatcher::new(db.clone());

    let err = dispatcher
        .dispatch(&inbound_message("evt-1", "c-missing", "u-1", "m-1", "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_inbound_message_for_unknown_customer_is_not_found() {
    let db = memory_db();
    let dispatcher = WebhookDispatcher::new(db.clone());
    dispatcher
        .dispatch(&conversation_create("evt-1", "c-1", "u-1", json!({})))
        .await
        .unwrap();

    let err = dispatcher
        .dispatch(&inbound_message("evt-2", "c-1", "u-stranger", "m-1", "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(db.messages.find_by_external_id("m-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_business_echo_is_skipped() {
    let db = memory_db();
    let dispatcher = WebhookDispatcher::new(db.clone());
    dispatcher
        .dispatch(&conversation_create("evt-1", "c-1", "u-1", json!({})))
        .await
        .unwrap();

    dispatcher
        .dispatch(&event(
            "evt-2",
            "conversation:message",
            json!({
                "conversation": {"id": "c-1"},
                "message": {
                    "id": "m-business",
                    "author": {"type": "business", "displayName": "Ada"},
                    "content": {"type": "text", "text": "hello"}
                }
            }),
        ))
        .await
        .unwrap();
    assert!(db
        .messages
        .find_by_external_id("m-business")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_read_event_moves_customer_receipt() {
    let db = memory_db();
    let dispatcher = WebhookDispatcher::new(db.clone());
    dispatcher
        .dispatch(&conversation_create("evt-1", "c-1", "u-1", json!({})))
        .await
        .unwrap();
    let read = event(
        "evt-r",
        "conversation:read",
        json!({
            "conversation": {"id": "c-1"},
            "activity": {"author": {"type": "user", "userId": "u-1"}}
        }),
    );

    // Nothing to point at yet.
    dispatcher.dispatch(&read).await.unwrap();
    let admin = Seed::new(&db).staff("Root", &[Permission::Admin]).await;
    let scope = Visibility::for_staff(&admin);
    let conversation = db
        .conversations
        .find_by_external_id("c-1")
        .await
        .unwrap()
        .unwrap();
    assert!(db
        .read_receipts
        .list(&scope, conversation.id)
        .await
        .unwrap()
        .is_empty());

    dispatcher
        .dispatch(&inbound_message("evt-2", "c-1", "u-1", "m-1", "first"))
        .await
        .unwrap();
    dispatcher
        .dispatch(&inbound_message("evt-3", "c-1", "u-1", "m-2", "second"))
        .await
        .unwrap();
    dispatcher.dispatch(&read).await.unwrap();

    let receipts = db.read_receipts.list(&scope, conversation.id).await.unwrap();
    assert_eq!(receipts.len(), 1);
    let latest = db.messages.find_by_external_id("m-2").await.unwrap().unwrap();
    assert_eq!(receipts[0].user_type, ReaderType::Customer);
    assert_eq!(receipts[0].last_read_message_id, latest.id);
}

#[tokio::test]
async fn test_read_event_from_business_is_ignored() {
    let db = memory_db();
    let dispatcher = WebhookDispatcher::new(db.clone());
    dispatcher
        .dispatch(&conversation_create("evt-1", "c-1", "u-1", json!({})))
        .await
        .unwrap();
    dispatcher
        .dispatch(&inbound_message("evt-2", "c-1", "u-1", "m-1", "hi"))
        .await
        .unwrap();

    dispatcher
        .dispatch(&event(
            "evt-r",
            "conversation:read",
            json!({
                "conversation": {"id": "c-1"},
                "activity": {"author": {"type": "business"}}
            }),
        ))
        .await
        .unwrap();

    let admin = Seed::new(&db).staff("Root", &[Permission::Admin]).await;
    let conversation = db
        .conversations
        .find_by_external_id("c-1")
        .await
        .unwrap()
        .unwrap();
    assert!(db
        .read_receipts
        .list(&Visibility::for_staff(&admin), conversation.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_unknown_event_type_is_ignored() {
    let db = memory_db();
    let dispatcher = WebhookDispatcher::new(db.clone());

    let outcome = dispatcher
        .dispatch(&event("evt-1", "conversation:postback", json!({"anything": 1})))
        .await
        .unwrap();
    assert_eq!(outcome, Dispatch::Ignored);
    assert!(!dispatcher.handles("conversation:postback"));
    assert!(dispatcher.handles("conversation:read"));
}
