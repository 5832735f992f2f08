//! # frontdesk-db
//!
//! Storage layer for frontdesk.
//!
//! This crate provides:
//! - Connection pool management
//! - PostgreSQL repository implementations for all core entities
//! - SQL rendering of conversation visibility rules
//! - An in-memory backend with the same semantics, for development and tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use frontdesk_db::{Database, EventBus};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let events = Arc::new(EventBus::default());
//!     let db = Database::connect("postgres://localhost/frontdesk", events).await?;
//!     db.migrate().await?;
//!
//!     let tag = db.tags.find_or_create("billing").await?;
//!     println!("Tag: {}", tag.id);
//!     Ok(())
//! }
//! ```
pub mod conversations;
pub mod customers;
pub mod jobs;
pub mod memory;
pub mod messages;
pub mod pool;
pub mod query;
pub mod read_receipts;
pub mod settings;
pub mod staff;
pub mod tags;
pub mod test_fixtures;
pub mod visibility;

// Re-export core types
pub use frontdesk_core::*;

pub use conversations::PgConversationRepository;
pub use customers::PgCustomerRepository;
pub use jobs::PgJobRepository;
pub use memory::MemoryStore;
pub use messages::PgMessageRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use read_receipts::PgReadReceiptRepository;
pub use settings::PgSettingsRepository;
pub use staff::PgStaffRepository;
pub use tags::PgTagRepository;
pub use visibility::VisibilityQueryBuilder;

use std::sync::Arc;

use sqlx::PgPool;

/// Combined storage context with all repositories.
///
/// Cheap to clone; every repository is shared.
#[derive(Clone)]
pub struct Database {
    /// Connection pool; `None` for the in-memory backend.
    pub pool: Option<PgPool>,
    /// Bus every write publishes to.
    pub events: Arc<EventBus>,
    pub staff: Arc<dyn StaffRepository>,
    pub customers: Arc<dyn CustomerRepository>,
    pub conversations: Arc<dyn ConversationRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub read_receipts: Arc<dyn ReadReceiptRepository>,
    pub tags: Arc<dyn TagRepository>,
    /// Job queue for delivery and webhook processing.
    pub jobs: Arc<dyn JobRepository>,
    pub settings: Arc<dyn SettingsRepository>,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: PgPool, events: Arc<EventBus>) -> Self {
        Self {
            staff: Arc::new(PgStaffRepository::new(pool.clone())),
            customers: Arc::new(PgCustomerRepository::new(pool.clone())),
            conversations: Arc::new(PgConversationRepository::new(pool.clone(), events.clone())),
            messages: Arc::new(PgMessageRepository::new(pool.clone(), events.clone())),
            read_receipts: Arc::new(PgReadReceiptRepository::new(pool.clone(), events.clone())),
            tags: Arc::new(PgTagRepository::new(pool.clone())),
            jobs: Arc::new(PgJobRepository::new(pool.clone())),
            settings: Arc::new(PgSettingsRepository::new(pool.clone())),
            pool: Some(pool),
            events,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str, events: Arc<EventBus>) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool, events))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(
        url: &str,
        config: PoolConfig,
        events: Arc<EventBus>,
    ) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool, events))
    }

    /// Database backed by a fresh in-memory store.
    pub fn in_memory(events: Arc<EventBus>) -> Self {
        let store = MemoryStore::new();
        Self {
            pool: None,
            staff: Arc::new(store.staff()),
            customers: Arc::new(store.customers()),
            conversations: Arc::new(store.conversations(events.clone())),
            messages: Arc::new(store.messages(events.clone())),
            read_receipts: Arc::new(store.read_receipts(events.clone())),
            tags: Arc::new(store.tags()),
            jobs: Arc::new(store.jobs()),
            settings: Arc::new(store.settings()),
            events,
        }
    }

    /// Run pending migrations. No-op for the in-memory backend.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        let Some(pool) = &self.pool else {
            return Ok(());
        };
        sqlx::migrate!("../../migrations")
            .run(pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool, if any.
    pub fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }

    /// `"postgres"` or `"memory"`.
    pub fn backend_name(&self) -> &'static str {
        if self.pool.is_some() {
            "postgres"
        } else {
            "memory"
        }
    }
}
