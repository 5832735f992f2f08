//! Repository behaviour shared by every storage backend.
//!
//! Each check takes a [`Database`] and only goes through the repository
//! traits, so the in-memory and PostgreSQL suites run the same assertions.

#![allow(dead_code)]

use std::collections::HashSet;

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use frontdesk_db::test_fixtures::Seed;
use frontdesk_db::{
    AuthorType, ConversationFilter, ConversationType, CreateMessageRequest, CustomerProfile,
    Database, DeliveryStatus, DeliveryUpdate, ExternalConversation, JobStatus, MessageAction,
    MessageContent, PageRequest, Permission, QueueJobRequest, ReadReceiptAction, ReaderType,
    ServerEvent, Staff, UpsertReadReceiptRequest, Visibility,
};

async fn visible_ids(db: &Database, staff: &Staff, ids: &[Uuid]) -> HashSet<Uuid> {
    let scope = Visibility::for_staff(staff);
    let mut seen = HashSet::new();
    for id in ids {
        if db
            .conversations
            .get_visible(&scope, *id)
            .await
            .expect("get_visible failed")
            .is_some()
        {
            seen.insert(*id);
        }
    }
    seen
}

pub async fn visibility_partitions_conversations(db: &Database) {
    let seed = Seed::new(db);
    let alice = seed.staff("alice", &[]).await;
    let bob = seed.staff("bob", &[Permission::ChatCustomer]).await;
    let carol = seed.staff("carol", &[]).await;
    let admin = seed.staff("admin", &[Permission::Admin]).await;

    let private = seed
        .conversation(ConversationType::Private, &[alice.id, bob.id])
        .await;
    let public = seed
        .conversation(ConversationType::Public, &[alice.id, bob.id])
        .await;
    let (_, customer) = seed.customer_conversation("visibility").await;

    let ids = [private.id, public.id, customer.id];

    assert_eq!(visible_ids(db, &alice, &ids).await, HashSet::from([private.id, public.id]));
    assert_eq!(
        visible_ids(db, &bob, &ids).await,
        HashSet::from([private.id, public.id, customer.id])
    );
    assert_eq!(visible_ids(db, &carol, &ids).await, HashSet::from([public.id]));
    assert_eq!(
        visible_ids(db, &admin, &ids).await,
        HashSet::from([private.id, public.id, customer.id])
    );

    // Message visibility follows the parent conversation.
    let message = seed.staff_message(private.id, alice.id, "hi").await;
    let carol_scope = Visibility::for_staff(&carol);
    assert!(db
        .messages
        .get_visible(&carol_scope, message.id)
        .await
        .unwrap()
        .is_none());
    let listed = db
        .messages
        .list(&carol_scope, Some(private.id), &PageRequest::first(10))
        .await
        .unwrap();
    assert!(listed.items.is_empty());
}

pub async fn pagination_walks_without_gaps(db: &Database) {
    let seed = Seed::new(db);
    let owner = seed.staff("owner", &[]).await;
    let peer = seed.staff("peer", &[]).await;
    let mut created = HashSet::new();
    for _ in 0..5 {
        let c = seed
            .conversation(ConversationType::Private, &[owner.id, peer.id])
            .await;
        created.insert(c.id);
    }

    let scope = Visibility::for_staff(&owner);
    let filter = ConversationFilter {
        conversation_type: Some(ConversationType::Private),
        ..Default::default()
    };

    let mut seen = Vec::new();
    let mut request = PageRequest::first(2);
    let mut pages = 0;
    loop {
        let page = db
            .conversations
            .list(&scope, &filter, &request)
            .await
            .expect("list failed");
        pages += 1;
        assert!(page.items.len() <= 2);
        seen.extend(page.items.iter().map(|c| c.id));
        if !page.has_more {
            assert!(page.next_cursor.is_none());
            break;
        }
        request = PageRequest::new(Some(2), page.next_cursor);
    }
    assert_eq!(pages, 3);
    assert_eq!(seen.len(), 5);
    assert_eq!(seen.iter().copied().collect::<HashSet<_>>(), created);

    // An unknown cursor yields an empty page rather than restarting.
    let page = db
        .conversations
        .list(&scope, &filter, &PageRequest::new(Some(2), Some(Uuid::new_v4())))
        .await
        .unwrap();
    assert!(page.items.is_empty());
    assert!(!page.has_more);

    // A cursor the caller cannot see behaves like an unknown one.
    let stranger = seed.staff("stranger", &[]).await;
    let hidden = seed
        .conversation(ConversationType::Private, &[stranger.id, peer.id])
        .await;
    let page = db
        .conversations
        .list(&scope, &filter, &PageRequest::new(Some(2), Some(hidden.id)))
        .await
        .unwrap();
    assert!(page.items.is_empty());
}

pub async fn message_create_deduplicates_provider_ids(db: &Database) {
    let seed = Seed::new(db);
    let (customer, conversation) = seed.customer_conversation("dedupe").await;
    let mut rx = db.events.subscribe();

    let request = CreateMessageRequest {
        conversation_id: conversation.id,
        author_type: AuthorType::Customer,
        author_id: Some(customer.id),
        content: MessageContent::text("hello"),
        external_message_id: Some(format!("ext-{}", Uuid::new_v4())),
        metadata: json!({}),
    };
    let first = db.messages.create(request.clone()).await.unwrap();
    let second = db.messages.create(request).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.customer_delivery_status, DeliveryStatus::Unsent);

    let envelope = rx.try_recv().expect("create event");
    assert_eq!(envelope.event_type, "message.create");
    assert_eq!(envelope.entity_id, first.id);
    assert!(rx.try_recv().is_err(), "replay must not publish again");
}

pub async fn delivery_update_keeps_provider_id(db: &Database) {
    let seed = Seed::new(db);
    let agent = seed.staff("agent", &[Permission::ChatCustomer]).await;
    let (_, conversation) = seed.customer_conversation("delivery").await;
    let message = seed.staff_message(conversation.id, agent.id, "hello").await;
    let mut rx = db.events.subscribe();

    let external_id = format!("sun-{}", Uuid::new_v4());
    let sent = db
        .messages
        .update_delivery(
            message.id,
            DeliveryUpdate {
                status: DeliveryStatus::Sent,
                external_message_id: Some(external_id.clone()),
                error: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(sent.external_message_id.as_deref(), Some(external_id.as_str()));

    let failed = db
        .messages
        .update_delivery(
            message.id,
            DeliveryUpdate {
                status: DeliveryStatus::Failed,
                external_message_id: None,
                error: Some("blocked".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(failed.customer_delivery_status, DeliveryStatus::Failed);
    assert_eq!(failed.external_message_id.as_deref(), Some(external_id.as_str()));
    assert_eq!(failed.customer_delivery_error.as_deref(), Some("blocked"));

    for _ in 0..2 {
        let envelope = rx.try_recv().expect("update event");
        assert!(matches!(
            envelope.payload,
            ServerEvent::Message {
                action: MessageAction::Update,
                ..
            }
        ));
    }

    let found = db
        .messages
        .find_by_external_id(&external_id)
        .await
        .unwrap()
        .expect("found by provider id");
    assert_eq!(found.id, message.id);

    let deleted = db.messages.delete(message.id).await.unwrap();
    assert!(deleted.is_some());
    assert!(db.messages.get(message.id).await.unwrap().is_none());
    assert!(db.messages.delete(message.id).await.unwrap().is_none());
}

pub async fn customer_upsert_follows_merge_rules(db: &Database) {
    let sunshine_user_id = format!("user-{}", Uuid::new_v4());
    let profile = |external_id: Option<&str>, name: Option<&str>| CustomerProfile {
        sunshine_user_id: sunshine_user_id.clone(),
        external_id: external_id.map(str::to_string),
        display_name: name.map(str::to_string),
        locale: None,
        metadata: json!({"first": true}),
    };

    let created = db
        .customers
        .upsert_profile(profile(None, Some("Ann")))
        .await
        .unwrap();
    let linked = db
        .customers
        .upsert_profile(profile(Some("crm-1"), Some("Ann Lee")))
        .await
        .unwrap();
    let again = db
        .customers
        .upsert_profile(profile(Some("crm-2"), Some("")))
        .await
        .unwrap();

    assert_eq!(created.id, linked.id);
    assert_eq!(linked.id, again.id);
    assert_eq!(again.external_id.as_deref(), Some("crm-1"));
    assert_eq!(again.display_name.as_deref(), Some("Ann Lee"));
    assert_eq!(again.metadata, json!({"first": true}));
}

pub async fn external_conversation_backfills_only_nulls(db: &Database) {
    let seed = Seed::new(db);
    let (customer, _) = seed.customer_conversation("first").await;
    let (other, _) = seed.customer_conversation("second").await;
    let external_id = format!("conv-{}", Uuid::new_v4());

    let created = db
        .conversations
        .upsert_external(ExternalConversation {
            external_conversation_id: external_id.clone(),
            customer_id: customer.id,
            source: None,
            metadata: json!({"a": 1}),
        })
        .await
        .unwrap();
    assert_eq!(created.conversation_type, ConversationType::Customer);

    let merged = db
        .conversations
        .upsert_external(ExternalConversation {
            external_conversation_id: external_id.clone(),
            customer_id: other.id,
            source: Some("whatsapp".to_string()),
            metadata: json!({"b": 2}),
        })
        .await
        .unwrap();

    assert_eq!(merged.id, created.id);
    assert_eq!(merged.customer_id, Some(customer.id));
    assert_eq!(merged.source.as_deref(), Some("whatsapp"));
    assert_eq!(merged.metadata, json!({"a": 1}));
}

pub async fn read_receipts_create_then_update(db: &Database) {
    let seed = Seed::new(db);
    let agent = seed.staff("reader", &[Permission::ChatCustomer]).await;
    let (_, conversation) = seed.customer_conversation("receipts").await;
    let first = seed.staff_message(conversation.id, agent.id, "one").await;
    let second = seed.staff_message(conversation.id, agent.id, "two").await;
    let mut rx = db.events.subscribe();

    let request = |message_id| UpsertReadReceiptRequest {
        conversation_id: conversation.id,
        user_id: agent.id,
        user_type: ReaderType::Staff,
        last_read_message_id: Some(message_id),
    };
    let created = db.read_receipts.upsert(request(first.id)).await.unwrap();
    let updated = db.read_receipts.upsert(request(second.id)).await.unwrap();
    assert_eq!(created.id, updated.id);
    assert_eq!(updated.last_read_message_id, Some(second.id));

    let actions: Vec<ReadReceiptAction> = (0..2)
        .map(|_| match rx.try_recv().expect("receipt event").payload {
            ServerEvent::ReadReceipt { action, .. } => action,
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert_eq!(
        actions,
        vec![ReadReceiptAction::Create, ReadReceiptAction::Update]
    );

    let visible = db
        .read_receipts
        .list(&Visibility::for_staff(&agent), conversation.id)
        .await
        .unwrap();
    assert_eq!(visible.len(), 1);

    let outsider = seed.staff("outsider", &[]).await;
    let hidden = db
        .read_receipts
        .list(&Visibility::for_staff(&outsider), conversation.id)
        .await
        .unwrap();
    assert!(hidden.is_empty());
}

pub async fn tags_are_unique_and_filterable(db: &Database) {
    let seed = Seed::new(db);
    let admin = seed.staff("admin", &[Permission::Admin]).await;
    let (_, conversation) = seed.customer_conversation("tagged").await;
    let (_, untagged) = seed.customer_conversation("untagged").await;
    let name = format!("vip-{}", Uuid::new_v4());

    let tag = db.tags.find_or_create(&name).await.unwrap();
    let same = db.tags.find_or_create(&format!("  {name} ")).await.unwrap();
    assert_eq!(tag.id, same.id);
    assert!(db.tags.find_or_create("   ").await.is_err());

    assert!(db.tags.tag(conversation.id, tag.id).await.unwrap());
    assert!(!db.tags.tag(conversation.id, tag.id).await.unwrap());

    let filter = ConversationFilter {
        tag_id: Some(tag.id),
        ..Default::default()
    };
    let page = db
        .conversations
        .list(&Visibility::for_staff(&admin), &filter, &PageRequest::first(10))
        .await
        .unwrap();
    let ids: Vec<Uuid> = page.items.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![conversation.id]);
    assert!(!ids.contains(&untagged.id));

    let tags = db.tags.for_conversation(conversation.id).await.unwrap();
    assert_eq!(tags.len(), 1);
    assert!(db.tags.untag(conversation.id, tag.id).await.unwrap());
    assert!(!db.tags.untag(conversation.id, tag.id).await.unwrap());
}

pub async fn touch_bumps_updated_at(db: &Database) {
    let seed = Seed::new(db);
    let a = seed.staff("a", &[]).await;
    let b = seed.staff("b", &[]).await;
    let conversation = seed
        .conversation(ConversationType::Public, &[a.id, b.id])
        .await;
    let mut rx = db.events.subscribe();

    let touched = db.conversations.touch(conversation.id).await.unwrap();
    assert!(touched.updated_at >= conversation.updated_at);
    let envelope = rx.try_recv().expect("touch event");
    assert_eq!(envelope.event_type, "conversation.touch");

    assert!(db.conversations.touch(Uuid::new_v4()).await.is_err());

    let members = db.conversations.members(conversation.id).await.unwrap();
    assert_eq!(members.len(), 2);
    let c = seed.staff("c", &[]).await;
    db.conversations
        .add_members(conversation.id, &[c.id, a.id])
        .await
        .unwrap();
    assert_eq!(db.conversations.members(conversation.id).await.unwrap().len(), 3);
}

pub async fn job_queue_retries_then_fails(db: &Database) {
    let queue = format!("test-{}", Uuid::new_v4());
    let request = QueueJobRequest {
        queue: queue.clone(),
        kind: "deliver".to_string(),
        key: Some("k".to_string()),
        payload: json!({"messageId": Uuid::new_v4()}),
        max_attempts: 2,
    };
    let job = db.jobs.queue(request).await.unwrap();
    assert_eq!(job.status, JobStatus::Pending);

    let claimed = db.jobs.claim_next(&queue).await.unwrap().expect("claimable");
    assert_eq!(claimed.id, job.id);
    assert_eq!(claimed.attempts, 1);
    assert!(db.jobs.claim_next(&queue).await.unwrap().is_none());

    let status = db
        .jobs
        .fail(job.id, "boom", Some(Utc::now() + Duration::hours(1)))
        .await
        .unwrap();
    assert_eq!(status, JobStatus::Pending);
    // Backoff not elapsed yet.
    assert!(db.jobs.claim_next(&queue).await.unwrap().is_none());

    let status = db.jobs.fail(job.id, "boom again", None).await.unwrap();
    assert_eq!(status, JobStatus::Failed);
    let stored = db.jobs.get(job.id).await.unwrap().expect("job row");
    assert_eq!(stored.error_message.as_deref(), Some("boom again"));
    assert!(stored.completed_at.is_some());

    let stats = db.jobs.stats(&queue).await.unwrap();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.pending, 0);
    let failed = db
        .jobs
        .list_by_status(&queue, JobStatus::Failed, 10)
        .await
        .unwrap();
    assert_eq!(failed.len(), 1);
}

pub async fn job_queue_completes(db: &Database) {
    let queue = format!("test-{}", Uuid::new_v4());
    let job = db
        .jobs
        .queue(QueueJobRequest {
            queue: queue.clone(),
            kind: "process".to_string(),
            key: None,
            payload: json!({}),
            max_attempts: 1,
        })
        .await
        .unwrap();
    let claimed = db.jobs.claim_next(&queue).await.unwrap().expect("claimable");
    db.jobs.complete(claimed.id).await.unwrap();

    let stored = db.jobs.get(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(db.jobs.stats(&queue).await.unwrap().completed, 1);
}

pub async fn settings_overwrite(db: &Database) {
    let key = format!("test-{}", Uuid::new_v4());
    assert!(db.settings.get(&key).await.unwrap().is_none());
    db.settings.set(&key, "one").await.unwrap();
    db.settings.set(&key, "two").await.unwrap();
    assert_eq!(db.settings.get(&key).await.unwrap().as_deref(), Some("two"));
}
