//! In-memory storage backend.
//!
//! Implements every repository trait over one shared, lock-protected state so
//! the service can run without PostgreSQL (local development, tests). Rules are
//! the same as the PostgreSQL backend: visibility is evaluated per row with
//! [`Visibility::permits`], listings go through [`cursor::paginate`], provider
//! upserts follow the merge policies, and writes publish the same events.
//!
//! [`cursor::paginate`]: frontdesk_core::cursor::paginate

mod conversations;
mod jobs;
mod messages;
mod people;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use frontdesk_core::{
    Conversation, Customer, EventBus, Job, Message, ReadReceipt, Staff, Tag, Visibility,
};

pub use conversations::{MemoryConversationRepository, MemoryTagRepository};
pub use jobs::{MemoryJobRepository, MemorySettingsRepository};
pub use messages::{MemoryMessageRepository, MemoryReadReceiptRepository};
pub use people::{MemoryCustomerRepository, MemoryStaffRepository};

/// All rows of the in-memory store.
#[derive(Debug, Default)]
pub(crate) struct State {
    pub staff: HashMap<Uuid, Staff>,
    pub customers: HashMap<Uuid, Customer>,
    pub conversations: HashMap<Uuid, Conversation>,
    pub members: HashMap<Uuid, BTreeSet<Uuid>>,
    pub messages: HashMap<Uuid, Message>,
    pub read_receipts: HashMap<Uuid, ReadReceipt>,
    pub tags: HashMap<Uuid, Tag>,
    /// `(conversation_id, tag_id)` pairs.
    pub conversation_tags: HashSet<(Uuid, Uuid)>,
    pub jobs: HashMap<Uuid, Job>,
    pub settings: HashMap<String, String>,
}

impl State {
    pub fn members_of(&self, conversation_id: Uuid) -> Vec<Uuid> {
        self.members
            .get(&conversation_id)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_visible(&self, scope: &Visibility, conversation: &Conversation) -> bool {
        scope.is_unrestricted() || scope.permits(conversation, &self.members_of(conversation.id))
    }

    /// Whether the conversation exists and the scope may see it.
    pub fn is_visible_id(&self, scope: &Visibility, conversation_id: Uuid) -> bool {
        self.conversations
            .get(&conversation_id)
            .is_some_and(|c| self.is_visible(scope, c))
    }
}

pub(crate) type SharedState = Arc<RwLock<State>>;

/// Factory for repositories sharing one in-memory state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: SharedState,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn staff(&self) -> MemoryStaffRepository {
        MemoryStaffRepository::new(self.state.clone())
    }

    pub fn customers(&self) -> MemoryCustomerRepository {
        MemoryCustomerRepository::new(self.state.clone())
    }

    pub fn conversations(&self, events: Arc<EventBus>) -> MemoryConversationRepository {
        MemoryConversationRepository::new(self.state.clone(), events)
    }

    pub fn messages(&self, events: Arc<EventBus>) -> MemoryMessageRepository {
        MemoryMessageRepository::new(self.state.clone(), events)
    }

    pub fn read_receipts(&self, events: Arc<EventBus>) -> MemoryReadReceiptRepository {
        MemoryReadReceiptRepository::new(self.state.clone(), events)
    }

    pub fn tags(&self) -> MemoryTagRepository {
        MemoryTagRepository::new(self.state.clone())
    }

    pub fn jobs(&self) -> MemoryJobRepository {
        MemoryJobRepository::new(self.state.clone())
    }

    pub fn settings(&self) -> MemorySettingsRepository {
        MemorySettingsRepository::new(self.state.clone())
    }
}
