//! HTTP-level tests against the in-memory backend.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::json;
use uuid::Uuid;

use frontdesk_api::ApiConfig;
use frontdesk_core::{defaults, ActivityType, ConversationType, Permission};
use frontdesk_db::test_fixtures::Seed;

use common::{FakeProvider, TestApp};

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();
    let (status, body) = app
        .send(Request::get("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"], "memory");
    assert_eq!(body["provider"], false);
}

#[tokio::test]
async fn test_unsigned_request_is_unauthorized() {
    let app = TestApp::new();
    let request = Request::get("/api/v1/me")
        .header("x-staff-id", "sso|mallory")
        .header("x-staff-name", "Mallory")
        .header("x-staff-permissions", "admin")
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["type"], "UnauthorizedError");
}

#[tokio::test]
async fn test_tampered_permissions_are_rejected() {
    let app = TestApp::new();
    let caller = app.staff("ada", &[]).await;
    let mut request = caller.request(Method::GET, "/api/v1/me", None);
    request
        .headers_mut()
        .insert("x-staff-permissions", "admin".parse().unwrap());
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_staff_routes_disabled_without_secret() {
    let app = TestApp::build(None, ApiConfig::new());
    let (status, body) = app
        .send(Request::get("/api/v1/me").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["type"], "DisabledError");
}

#[tokio::test]
async fn test_me_returns_upserted_staff() {
    let app = TestApp::new();
    let caller = app.staff("grace", &[Permission::ChatCustomer]).await;
    let (status, body) = app.get(&caller, "/api/v1/me").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], caller.staff.id.to_string());
    assert_eq!(body["displayName"], "grace");
    assert_eq!(body["permissions"], json!(["chat:customer"]));
}

#[tokio::test]
async fn test_conversation_listing_respects_visibility() {
    let app = TestApp::new();
    let plain = app.staff("plain", &[]).await;
    let agent = app.staff("agent", &[Permission::ChatCustomer]).await;
    let admin = app.staff("admin", &[Permission::Admin]).await;
    let outsider = app.staff("outsider", &[]).await;

    let seed = Seed::new(&app.db);
    let public = seed.conversation(ConversationType::Public, &[]).await;
    let private = seed
        .conversation(
            ConversationType::Private,
            &[plain.staff.id, outsider.staff.id],
        )
        .await;
    let other_private = seed
        .conversation(
            ConversationType::Private,
            &[agent.staff.id, outsider.staff.id],
        )
        .await;
    let (_, customer) = seed.customer_conversation("visitor").await;

    let ids_for = |body: serde_json::Value| -> Vec<String> {
        body["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["id"].as_str().unwrap().to_string())
            .collect()
    };

    let (status, body) = app.get(&plain, "/api/v1/conversations").await;
    assert_eq!(status, StatusCode::OK);
    let ids = ids_for(body);
    assert!(ids.contains(&public.id.to_string()));
    assert!(ids.contains(&private.id.to_string()));
    assert!(!ids.contains(&other_private.id.to_string()));
    assert!(!ids.contains(&customer.id.to_string()));

    let (_, body) = app.get(&agent, "/api/v1/conversations").await;
    let ids = ids_for(body);
    assert!(ids.contains(&customer.id.to_string()));
    assert!(ids.contains(&other_private.id.to_string()));
    assert!(!ids.contains(&private.id.to_string()));

    let (_, body) = app.get(&admin, "/api/v1/conversations").await;
    assert_eq!(ids_for(body).len(), 4);

    let (status, body) = app
        .get(&plain, &format!("/api/v1/conversations/{}", customer.id))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["type"], "ForbiddenError");
}

#[tokio::test]
async fn test_conversation_pagination_walks_every_row() {
    let app = TestApp::new();
    let caller = app.staff("pager", &[]).await;
    let seed = Seed::new(&app.db);
    let mut expected = Vec::new();
    for _ in 0..5 {
        expected.push(seed.conversation(ConversationType::Public, &[]).await.id.to_string());
    }

    let mut seen = Vec::new();
    let mut after: Option<String> = None;
    loop {
        let uri = match &after {
            Some(cursor) => format!("/api/v1/conversations?type=PUBLIC&limit=2&after={cursor}"),
            None => "/api/v1/conversations?type=PUBLIC&limit=2".to_string(),
        };
        let (status, body) = app.get(&caller, &uri).await;
        assert_eq!(status, StatusCode::OK);
        let items = body["items"].as_array().unwrap();
        assert!(items.len() <= 2);
        for item in items {
            seen.push(item["id"].as_str().unwrap().to_string());
        }
        if body["hasMore"] == false {
            break;
        }
        after = Some(body["nextCursor"].as_str().unwrap().to_string());
    }

    seen.sort();
    expected.sort();
    assert_eq!(seen, expected);

    let (status, body) = app
        .get(
            &caller,
            &format!("/api/v1/conversations?after={}", Uuid::new_v4()),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"], json!([]));
    assert_eq!(body["hasMore"], false);
}

#[tokio::test]
async fn test_create_conversation_requires_a_second_member() {
    let app = TestApp::new();
    let caller = app.staff("solo", &[]).await;
    let (status, body) = app
        .post(
            &caller,
            "/api/v1/conversations",
            json!({ "type": "PRIVATE", "memberIds": [] }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["type"], "UnprocessableError");
}

#[tokio::test]
async fn test_create_conversation_rejects_unknown_staff() {
    let app = TestApp::new();
    let caller = app.staff("creator", &[]).await;
    let (status, _) = app
        .post(
            &caller,
            "/api/v1/conversations",
            json!({ "type": "PRIVATE", "memberIds": [Uuid::new_v4()] }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_create_private_conversation_includes_creator() {
    let app = TestApp::new();
    let caller = app.staff("creator", &[]).await;
    let peer = app.staff("peer", &[]).await;
    let (status, body) = app
        .post(
            &caller,
            "/api/v1/conversations",
            json!({ "type": "PRIVATE", "memberIds": [peer.staff.id] }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["type"], "PRIVATE");

    let id = body["id"].as_str().unwrap();
    let (status, body) = app
        .get(&caller, &format!("/api/v1/conversations/{id}/members"))
        .await;
    assert_eq!(status, StatusCode::OK);
    let members = body["staffIds"].as_array().unwrap();
    assert_eq!(members.len(), 2);
    assert!(members.contains(&json!(caller.staff.id)));
    assert!(members.contains(&json!(peer.staff.id)));
}

async fn member_ids(app: &TestApp, caller: &common::Caller, id: Uuid) -> Vec<serde_json::Value> {
    let (status, body) = app
        .get(caller, &format!("/api/v1/conversations/{id}/members"))
        .await;
    assert_eq!(status, StatusCode::OK);
    body["staffIds"].as_array().cloned().unwrap_or_default()
}

#[tokio::test]
async fn test_join_invisible_private_conversation_is_forbidden() {
    let app = TestApp::new();
    let owner = app.staff("owner", &[]).await;
    let peer = app.staff("peer", &[]).await;
    let outsider = app.staff("outsider", &[]).await;
    let private = Seed::new(&app.db)
        .conversation(ConversationType::Private, &[owner.staff.id, peer.staff.id])
        .await;

    let (status, body) = app
        .post(
            &outsider,
            &format!("/api/v1/conversations/{}/join", private.id),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["type"], "ForbiddenError");

    let members = member_ids(&app, &owner, private.id).await;
    assert_eq!(members.len(), 2);
    assert!(!members.contains(&json!(outsider.staff.id)));
}

#[tokio::test]
async fn test_join_public_conversation_adds_caller() {
    let app = TestApp::new();
    let joiner = app.staff("joiner", &[]).await;
    let public = Seed::new(&app.db)
        .conversation(ConversationType::Public, &[])
        .await;

    let (status, body) = app
        .post(
            &joiner,
            &format!("/api/v1/conversations/{}/join", public.id),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], public.id.to_string());

    let members = member_ids(&app, &joiner, public.id).await;
    assert!(members.contains(&json!(joiner.staff.id)));
}

#[tokio::test]
async fn test_add_members_to_private_conversation() {
    let app = TestApp::new();
    let owner = app.staff("owner", &[]).await;
    let peer = app.staff("peer", &[]).await;
    let newcomer = app.staff("newcomer", &[]).await;
    let private = Seed::new(&app.db)
        .conversation(ConversationType::Private, &[owner.staff.id, peer.staff.id])
        .await;

    let (status, _) = app
        .post(
            &owner,
            &format!("/api/v1/conversations/{}/members", private.id),
            json!({ "staffIds": [newcomer.staff.id] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let members = member_ids(&app, &newcomer, private.id).await;
    assert_eq!(members.len(), 3);
    assert!(members.contains(&json!(newcomer.staff.id)));
}

#[tokio::test]
async fn test_add_unknown_staff_is_unprocessable() {
    let app = TestApp::new();
    let owner = app.staff("owner", &[]).await;
    let peer = app.staff("peer", &[]).await;
    let private = Seed::new(&app.db)
        .conversation(ConversationType::Private, &[owner.staff.id, peer.staff.id])
        .await;
    let uri = format!("/api/v1/conversations/{}/members", private.id);

    let (status, body) = app
        .post(&owner, &uri, json!({ "staffIds": [Uuid::new_v4()] }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["type"], "UnprocessableError");

    let (status, _) = app.post(&owner, &uri, json!({ "staffIds": [] })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(member_ids(&app, &owner, private.id).await.len(), 2);
}

#[tokio::test]
async fn test_add_members_to_invisible_conversation_is_forbidden() {
    let app = TestApp::new();
    let owner = app.staff("owner", &[]).await;
    let peer = app.staff("peer", &[]).await;
    let outsider = app.staff("outsider", &[]).await;
    let private = Seed::new(&app.db)
        .conversation(ConversationType::Private, &[owner.staff.id, peer.staff.id])
        .await;

    let (status, _) = app
        .post(
            &outsider,
            &format!("/api/v1/conversations/{}/members", private.id),
            json!({ "staffIds": [outsider.staff.id] }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(member_ids(&app, &owner, private.id).await.len(), 2);
}

#[tokio::test]
async fn test_send_to_customer_conversation_without_permission_is_forbidden() {
    let app = TestApp::new();
    let caller = app.staff("plain", &[]).await;
    let (_, conversation) = Seed::new(&app.db).customer_conversation("visitor").await;

    let (status, body) = app
        .post(
            &caller,
            &format!("/api/v1/conversations/{}/messages", conversation.id),
            json!({ "content": { "type": "text", "text": "hello" } }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["type"], "ForbiddenError");

    let latest = app
        .db
        .messages
        .latest_in_conversation(conversation.id)
        .await
        .unwrap();
    assert!(latest.is_none());
    let stats = app.db.jobs.stats(defaults::MESSAGE_QUEUE).await.unwrap();
    assert_eq!(stats.pending, 0);
}

#[tokio::test]
async fn test_send_to_customer_conversation_queues_delivery() {
    let app = TestApp::new();
    let agent = app.staff("agent", &[Permission::ChatCustomer]).await;
    let (_, conversation) = Seed::new(&app.db).customer_conversation("visitor").await;

    let (status, body) = app
        .post(
            &agent,
            &format!("/api/v1/conversations/{}/messages", conversation.id),
            json!({ "content": { "type": "text", "text": "How can I help?" } }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["authorType"], "STAFF");
    assert_eq!(body["authorId"], agent.staff.id.to_string());
    assert_eq!(body["customerDeliveryStatus"], "UNSENT");

    let stats = app.db.jobs.stats(defaults::MESSAGE_QUEUE).await.unwrap();
    assert_eq!(stats.pending, 1);
}

#[tokio::test]
async fn test_send_is_undone_when_delivery_cannot_be_queued() {
    let app = TestApp::with_refusing_jobs();
    let agent = app.staff("agent", &[Permission::ChatCustomer]).await;
    let (_, conversation) = Seed::new(&app.db).customer_conversation("visitor").await;

    let (status, body) = app
        .post(
            &agent,
            &format!("/api/v1/conversations/{}/messages", conversation.id),
            json!({ "content": { "type": "text", "text": "anyone there?" } }),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], json!(500));

    let latest = app
        .db
        .messages
        .latest_in_conversation(conversation.id)
        .await
        .unwrap();
    assert!(latest.is_none());
}

#[tokio::test]
async fn test_send_to_staff_conversation_queues_nothing() {
    let app = TestApp::new();
    let caller = app.staff("talker", &[]).await;
    let conversation = Seed::new(&app.db)
        .conversation(ConversationType::Public, &[])
        .await;

    let (status, _) = app
        .post(
            &caller,
            &format!("/api/v1/conversations/{}/messages", conversation.id),
            json!({ "content": { "type": "text", "text": "standup in 5" } }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let stats = app.db.jobs.stats(defaults::MESSAGE_QUEUE).await.unwrap();
    assert_eq!(stats.pending, 0);
}

#[tokio::test]
async fn test_send_empty_text_is_unprocessable() {
    let app = TestApp::new();
    let caller = app.staff("talker", &[]).await;
    let conversation = Seed::new(&app.db)
        .conversation(ConversationType::Public, &[])
        .await;
    let (status, _) = app
        .post(
            &caller,
            &format!("/api/v1/conversations/{}/messages", conversation.id),
            json!({ "content": { "type": "text", "text": "   " } }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_unknown_conversation_is_forbidden() {
    let app = TestApp::new();
    let caller = app.staff("admin", &[Permission::Admin]).await;
    let (status, _) = app
        .get(&caller, &format!("/api/v1/conversations/{}", Uuid::new_v4()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .get(&caller, &format!("/api/v1/messages/{}", Uuid::new_v4()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_customer_directory_requires_permission() {
    let app = TestApp::new();
    let plain = app.staff("plain", &[]).await;
    let agent = app.staff("agent", &[Permission::ChatCustomer]).await;
    let (customer, _) = Seed::new(&app.db).customer_conversation("visitor").await;

    let (status, _) = app.get(&plain, "/api/v1/customers").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .get(&agent, &format!("/api/v1/customers/{}", customer.id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["displayName"], "visitor");

    let (status, _) = app
        .get(&agent, &format!("/api/v1/customers/{}", Uuid::new_v4()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tag_and_untag_conversation() {
    let app = TestApp::new();
    let caller = app.staff("tagger", &[]).await;
    let conversation = Seed::new(&app.db)
        .conversation(ConversationType::Public, &[])
        .await;
    let base = format!("/api/v1/conversations/{}/tags", conversation.id);

    let (status, tag) = app.post(&caller, &base, json!({ "name": "  billing " })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tag["name"], "billing");

    let (_, tags) = app.get(&caller, &base).await;
    assert_eq!(tags.as_array().unwrap().len(), 1);

    let tag_id = tag["id"].as_str().unwrap();
    let (status, _) = app
        .send(caller.request(Method::DELETE, &format!("{base}/{tag_id}"), None))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, tags) = app.get(&caller, &base).await;
    assert_eq!(tags, json!([]));

    let (status, _) = app.post(&caller, &base, json!({ "name": "   " })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_mark_as_read_posts_provider_activity() {
    let provider = FakeProvider::new();
    let app = TestApp::with_provider(provider.clone());
    let agent = app.staff("agent", &[Permission::ChatCustomer]).await;
    let seed = Seed::new(&app.db);
    let (_, conversation) = seed.customer_conversation("visitor").await;
    let message = seed
        .staff_message(conversation.id, agent.staff.id, "hi there")
        .await;

    let (status, body) = app
        .send(agent.request(
            Method::POST,
            &format!("/api/v1/conversations/{}/read", conversation.id),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lastReadMessageId"], message.id.to_string());
    assert_eq!(body["userType"], "STAFF");

    let activities = provider.activities();
    assert_eq!(activities.len(), 1);
    assert_eq!(
        Some(activities[0].0.as_str()),
        conversation.external_conversation_id.as_deref()
    );
    assert_eq!(activities[0].1.activity_type, ActivityType::ConversationRead);
}

#[tokio::test]
async fn test_mark_as_read_on_empty_conversation_is_unprocessable() {
    let app = TestApp::new();
    let caller = app.staff("reader", &[]).await;
    let conversation = Seed::new(&app.db)
        .conversation(ConversationType::Public, &[])
        .await;
    let (status, _) = app
        .post(
            &caller,
            &format!("/api/v1/conversations/{}/read", conversation.id),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_typing_without_provider_is_disabled() {
    let app = TestApp::new();
    let agent = app.staff("agent", &[Permission::ChatCustomer]).await;
    let (_, conversation) = Seed::new(&app.db).customer_conversation("visitor").await;
    let (status, _) = app
        .send(agent.request(
            Method::POST,
            &format!("/api/v1/conversations/{}/typing/start", conversation.id),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

// =============================================================================
// WEBHOOKS
// =============================================================================

fn webhook_batch() -> serde_json::Value {
    json!({
        "app": { "id": "app-test" },
        "webhook": { "id": "wh-1", "version": "v2" },
        "events": [
            {
                "id": "evt-1",
                "type": "conversation:create",
                "createdAt": "2026-01-01T00:00:00Z",
                "payload": {}
            },
            {
                "id": "evt-2",
                "type": "conversation:message",
                "payload": {}
            }
        ]
    })
}

fn trigger_request(key: Option<&str>) -> Request<Body> {
    let mut builder = Request::post("/webhooks/trigger").header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::from(webhook_batch().to_string())).unwrap()
}

#[tokio::test]
async fn test_webhook_rejected_before_connect() {
    let app = TestApp::new();
    let (status, body) = app.send(trigger_request(Some("anything"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["type"], "UnauthorizedError");
}

#[tokio::test]
async fn test_webhook_rejects_wrong_key() {
    let app = TestApp::new();
    app.db
        .settings
        .set(defaults::SETTING_WEBHOOK_SECRET, "whsec-good")
        .await
        .unwrap();

    let (status, _) = app.send(trigger_request(Some("whsec-bad"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.send(trigger_request(None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let stats = app.db.jobs.stats(defaults::WEBHOOK_QUEUE).await.unwrap();
    assert_eq!(stats.pending, 0);
}

#[tokio::test]
async fn test_webhook_queues_each_event() {
    let app = TestApp::new();
    app.db
        .settings
        .set(defaults::SETTING_WEBHOOK_SECRET, "whsec-good")
        .await
        .unwrap();

    let (status, body) = app.send(trigger_request(Some("whsec-good"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let stats = app.db.jobs.stats(defaults::WEBHOOK_QUEUE).await.unwrap();
    assert_eq!(stats.pending, 2);
}

#[tokio::test]
async fn test_webhook_malformed_body_is_unprocessable() {
    let app = TestApp::new();
    app.db
        .settings
        .set(defaults::SETTING_WEBHOOK_SECRET, "whsec-good")
        .await
        .unwrap();
    let request = Request::post("/webhooks/trigger")
        .header("x-api-key", "whsec-good")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_webhook_head_request_succeeds() {
    let app = TestApp::new();
    let (status, _) = app
        .send(
            Request::head("/webhooks/trigger")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_connect_replaces_own_integration_only() {
    let name = ApiConfig::new()
        .with_environment("test")
        .with_hostname("box")
        .integration_name();
    let provider = FakeProvider::new()
        .with_integration("int-old", &name)
        .with_integration("int-other", "someone-else");
    let app = TestApp::with_provider(provider.clone());
    let admin = app.staff("admin", &[Permission::Admin]).await;

    let (status, body) = app.post(&admin, "/webhooks/connect", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["integrationId"], "int-new");
    assert_eq!(body["displayName"], name);
    assert_eq!(body["target"], "https://ops.example.com/webhooks/trigger");

    assert_eq!(*provider.deleted.lock().unwrap(), vec!["int-old".to_string()]);
    let secret = app
        .db
        .settings
        .get(defaults::SETTING_WEBHOOK_SECRET)
        .await
        .unwrap();
    assert_eq!(secret.as_deref(), Some("whsec-fresh"));
    let integration_id = app
        .db
        .settings
        .get(defaults::SETTING_INTEGRATION_ID)
        .await
        .unwrap();
    assert_eq!(integration_id.as_deref(), Some("int-new"));

    let (status, _) = app.send(trigger_request(Some("whsec-fresh"))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_connect_requires_admin() {
    let provider = FakeProvider::new();
    let app = TestApp::with_provider(provider.clone());
    let agent = app.staff("agent", &[Permission::ChatCustomer]).await;

    let (status, body) = app.post(&agent, "/webhooks/connect", json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["type"], "ForbiddenError");
    assert!(provider.integrations.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_connect_without_provider_is_disabled() {
    let app = TestApp::new();
    let admin = app.staff("admin", &[Permission::Admin]).await;
    let (status, _) = app.post(&admin, "/webhooks/connect", json!({})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
