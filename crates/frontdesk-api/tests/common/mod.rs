//! Shared fixtures for API tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tokio::sync::Notify;
use tower::ServiceExt;
use uuid::Uuid;

use frontdesk_api::auth::{
    sign_identity, STAFF_ID_HEADER, STAFF_NAME_HEADER, STAFF_PERMISSIONS_HEADER,
    STAFF_SIGNATURE_HEADER,
};
use frontdesk_api::{app, ApiConfig, AppState};
use frontdesk_core::{
    Activity, Error, Integration, Job, JobRepository, JobStatus, NewIntegration,
    OutboundMessage, Permission, PostedMessage, ProviderClient, QueueJobRequest, QueueStats,
    Result, Staff, UpsertStaffRequest,
};
use frontdesk_db::{Database, EventBus};

pub const STAFF_SECRET: &str = "test-staff-secret";
pub const APP_ID: &str = "app-test";

/// Provider double recording activities and integration calls.
#[derive(Default)]
pub struct FakeProvider {
    pub activities: Mutex<Vec<(String, Activity)>>,
    pub integrations: Mutex<Vec<Integration>>,
    pub deleted: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_integration(self: Arc<Self>, id: &str, display_name: &str) -> Arc<Self> {
        self.integrations.lock().unwrap().push(Integration {
            id: id.to_string(),
            integration_type: "custom".to_string(),
            status: Some("active".to_string()),
            display_name: Some(display_name.to_string()),
            webhooks: Vec::new(),
        });
        self
    }

    pub fn activities(&self) -> Vec<(String, Activity)> {
        self.activities.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderClient for FakeProvider {
    fn app_id(&self) -> &str {
        APP_ID
    }

    async fn post_message(
        &self,
        _app_id: &str,
        _conversation_id: &str,
        _message: &OutboundMessage,
    ) -> Result<PostedMessage> {
        Ok(PostedMessage {
            id: "sun-1".to_string(),
            received: None,
        })
    }

    async fn post_activity(
        &self,
        _app_id: &str,
        conversation_id: &str,
        activity: &Activity,
    ) -> Result<()> {
        self.activities
            .lock()
            .unwrap()
            .push((conversation_id.to_string(), activity.clone()));
        Ok(())
    }

    async fn list_integrations(&self, _app_id: &str) -> Result<Vec<Integration>> {
        Ok(self.integrations.lock().unwrap().clone())
    }

    async fn create_integration(
        &self,
        _app_id: &str,
        integration: &NewIntegration,
    ) -> Result<Integration> {
        let mut webhooks = integration.webhooks.clone();
        for webhook in &mut webhooks {
            webhook.secret = Some("whsec-fresh".to_string());
        }
        let created = Integration {
            id: "int-new".to_string(),
            integration_type: integration.integration_type.clone(),
            status: Some("active".to_string()),
            display_name: Some(integration.display_name.clone()),
            webhooks,
        };
        self.integrations.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn delete_integration(&self, _app_id: &str, integration_id: &str) -> Result<()> {
        self.integrations
            .lock()
            .unwrap()
            .retain(|i| i.id != integration_id);
        self.deleted.lock().unwrap().push(integration_id.to_string());
        Ok(())
    }
}

/// Job queue that refuses new jobs and delegates everything else.
pub struct RefusingJobs(pub Arc<dyn JobRepository>);

#[async_trait]
impl JobRepository for RefusingJobs {
    async fn queue(&self, _req: QueueJobRequest) -> Result<Job> {
        Err(Error::Internal("job queue unavailable".to_string()))
    }

    async fn claim_next(&self, queue: &str) -> Result<Option<Job>> {
        self.0.claim_next(queue).await
    }

    async fn complete(&self, job_id: Uuid) -> Result<()> {
        self.0.complete(job_id).await
    }

    async fn fail(
        &self,
        job_id: Uuid,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<JobStatus> {
        self.0.fail(job_id, error, retry_at).await
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        self.0.get(job_id).await
    }

    async fn list_by_status(
        &self,
        queue: &str,
        status: JobStatus,
        limit: i64,
    ) -> Result<Vec<Job>> {
        self.0.list_by_status(queue, status, limit).await
    }

    async fn stats(&self, queue: &str) -> Result<QueueStats> {
        self.0.stats(queue).await
    }

    fn notifier(&self) -> Arc<Notify> {
        self.0.notifier()
    }
}

/// Router plus direct access to its storage.
pub struct TestApp {
    pub db: Database,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(None, ApiConfig::new().with_staff_auth_secret(STAFF_SECRET))
    }

    pub fn with_provider(provider: Arc<dyn ProviderClient>) -> Self {
        Self::build(
            Some(provider),
            ApiConfig::new()
                .with_staff_auth_secret(STAFF_SECRET)
                .with_public_url("https://ops.example.com")
                .with_environment("test")
                .with_hostname("box"),
        )
    }

    /// App whose job queue rejects every new job.
    pub fn with_refusing_jobs() -> Self {
        let mut db = Database::in_memory(Arc::new(EventBus::new(64)));
        db.jobs = Arc::new(RefusingJobs(db.jobs.clone()));
        Self::from_db(
            db,
            None,
            ApiConfig::new().with_staff_auth_secret(STAFF_SECRET),
        )
    }

    pub fn build(provider: Option<Arc<dyn ProviderClient>>, config: ApiConfig) -> Self {
        Self::from_db(Database::in_memory(Arc::new(EventBus::new(64))), provider, config)
    }

    fn from_db(db: Database, provider: Option<Arc<dyn ProviderClient>>, config: ApiConfig) -> Self {
        let router = app(AppState::new(db.clone(), provider, config));
        Self { db, router }
    }

    /// Seed a staff member the way the auth layer would.
    pub async fn staff(&self, name: &str, permissions: &[Permission]) -> Caller {
        let staff = self
            .db
            .staff
            .upsert(UpsertStaffRequest {
                external_id: format!("sso|{name}"),
                display_name: name.to_string(),
                permissions: permissions.to_vec(),
            })
            .await
            .unwrap();
        Caller { staff }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, JsonValue) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
        };
        (status, body)
    }

    pub async fn get(&self, caller: &Caller, uri: &str) -> (StatusCode, JsonValue) {
        self.send(caller.request(Method::GET, uri, None)).await
    }

    pub async fn post(
        &self,
        caller: &Caller,
        uri: &str,
        body: JsonValue,
    ) -> (StatusCode, JsonValue) {
        self.send(caller.request(Method::POST, uri, Some(body))).await
    }
}

/// A staff member with signed identity headers.
pub struct Caller {
    pub staff: Staff,
}

impl Caller {
    pub fn permissions_header(&self) -> String {
        self.staff
            .permissions
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn request(&self, method: Method, uri: &str, body: Option<JsonValue>) -> Request<Body> {
        let permissions = self.permissions_header();
        let signature = sign_identity(
            STAFF_SECRET,
            &self.staff.external_id,
            &self.staff.display_name,
            &permissions,
        );
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(STAFF_ID_HEADER, &self.staff.external_id)
            .header(STAFF_NAME_HEADER, &self.staff.display_name)
            .header(STAFF_PERMISSIONS_HEADER, permissions)
            .header(STAFF_SIGNATURE_HEADER, signature);
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }
}
