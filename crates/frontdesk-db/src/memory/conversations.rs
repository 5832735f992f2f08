//! In-memory conversation and tag repositories.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use frontdesk_core::cursor::{paginate, Cursor, SortDirection};
use frontdesk_core::merge::{merge_external_conversation, ConversationMerge};
use frontdesk_core::{
    new_v7, Conversation, ConversationFilter, ConversationRepository, ConversationType,
    CreateConversationRequest, Error, EventBus, ExternalConversation, Page, PageRequest, Result,
    Tag, TagRepository, Visibility,
};

use super::{SharedState, State};

fn matches_filter(state: &State, conversation: &Conversation, filter: &ConversationFilter) -> bool {
    if filter
        .conversation_type
        .is_some_and(|t| t != conversation.conversation_type)
    {
        return false;
    }
    if filter
        .customer_id
        .is_some_and(|id| conversation.customer_id != Some(id))
    {
        return false;
    }
    if let Some(tag_id) = filter.tag_id {
        return state.conversation_tags.contains(&(conversation.id, tag_id));
    }
    true
}

pub struct MemoryConversationRepository {
    state: SharedState,
    events: Arc<EventBus>,
}

impl MemoryConversationRepository {
    pub(crate) fn new(state: SharedState, events: Arc<EventBus>) -> Self {
        Self { state, events }
    }
}

#[async_trait]
impl ConversationRepository for MemoryConversationRepository {
    async fn list(
        &self,
        scope: &Visibility,
        filter: &ConversationFilter,
        page: &PageRequest,
    ) -> Result<Page<Conversation>> {
        let state = self.state.read().await;
        let rows: Vec<Conversation> = state
            .conversations
            .values()
            .filter(|c| state.is_visible(scope, c) && matches_filter(&state, c, filter))
            .cloned()
            .collect();
        Ok(paginate(rows, page, SortDirection::Desc, |c: &Conversation| {
            Cursor::new(c.updated_at, c.id)
        }))
    }

    async fn get_visible(&self, scope: &Visibility, id: Uuid) -> Result<Option<Conversation>> {
        let state = self.state.read().await;
        Ok(state
            .conversations
            .get(&id)
            .filter(|c| state.is_visible(scope, c))
            .cloned())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Conversation>> {
        Ok(self.state.read().await.conversations.get(&id).cloned())
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Conversation>> {
        let state = self.state.read().await;
        Ok(state
            .conversations
            .values()
            .find(|c| c.external_conversation_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn create(&self, req: CreateConversationRequest) -> Result<Conversation> {
        let now = Utc::now();
        let conversation = Conversation {
            id: new_v7(),
            conversation_type: req.conversation_type,
            customer_id: None,
            external_conversation_id: None,
            source: None,
            metadata: req.metadata,
            created_at: now,
            updated_at: now,
        };

        let mut state = self.state.write().await;
        state
            .members
            .insert(conversation.id, req.member_ids.into_iter().collect());
        state
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn upsert_external(&self, incoming: ExternalConversation) -> Result<Conversation> {
        let now = Utc::now();
        let mut state = self.state.write().await;

        let existing_id = state
            .conversations
            .values()
            .find(|c| {
                c.external_conversation_id.as_deref()
                    == Some(incoming.external_conversation_id.as_str())
            })
            .map(|c| c.id);

        let Some(conversation) = existing_id.and_then(|id| state.conversations.get_mut(&id))
        else {
            let conversation = Conversation {
                id: new_v7(),
                conversation_type: ConversationType::Customer,
                customer_id: Some(incoming.customer_id),
                external_conversation_id: Some(incoming.external_conversation_id),
                source: incoming.source,
                metadata: incoming.metadata,
                created_at: now,
                updated_at: now,
            };
            state
                .conversations
                .insert(conversation.id, conversation.clone());
            return Ok(conversation);
        };

        if let ConversationMerge::Backfill {
            customer_id,
            source,
        } = merge_external_conversation(Some(&*conversation), incoming)
        {
            if customer_id.is_some() {
                conversation.customer_id = customer_id;
            }
            if source.is_some() {
                conversation.source = source;
            }
        }
        Ok(conversation.clone())
    }

    async fn add_members(&self, conversation_id: Uuid, staff_ids: &[Uuid]) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.conversations.contains_key(&conversation_id) {
            return Err(Error::NotFound(format!("conversation {conversation_id}")));
        }
        state
            .members
            .entry(conversation_id)
            .or_default()
            .extend(staff_ids.iter().copied());
        Ok(())
    }

    async fn members(&self, conversation_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self.state.read().await.members_of(conversation_id))
    }

    async fn touch(&self, conversation_id: Uuid) -> Result<Conversation> {
        let conversation = {
            let mut state = self.state.write().await;
            let conversation = state
                .conversations
                .get_mut(&conversation_id)
                .ok_or_else(|| Error::NotFound(format!("conversation {conversation_id}")))?;
            conversation.updated_at = Utc::now();
            conversation.clone()
        };
        self.events.publish_conversation_touched(&conversation);
        Ok(conversation)
    }
}

pub struct MemoryTagRepository {
    state: SharedState,
}

impl MemoryTagRepository {
    pub(crate) fn new(state: SharedState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl TagRepository for MemoryTagRepository {
    async fn list(&self, page: &PageRequest) -> Result<Page<Tag>> {
        let state = self.state.read().await;
        let rows: Vec<Tag> = state.tags.values().cloned().collect();
        Ok(paginate(rows, page, SortDirection::Asc, |t: &Tag| {
            Cursor::new(t.name.clone(), t.id)
        }))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Tag>> {
        Ok(self.state.read().await.tags.get(&id).cloned())
    }

    async fn find_or_create(&self, name: &str) -> Result<Tag> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Unprocessable("Tag name must not be empty".to_string()));
        }
        let mut state = self.state.write().await;
        if let Some(tag) = state.tags.values().find(|t| t.name == name) {
            return Ok(tag.clone());
        }
        let tag = Tag {
            id: new_v7(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        state.tags.insert(tag.id, tag.clone());
        Ok(tag)
    }

    async fn tag(&self, conversation_id: Uuid, tag_id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        if !state.conversations.contains_key(&conversation_id) {
            return Err(Error::NotFound(format!("conversation {conversation_id}")));
        }
        if !state.tags.contains_key(&tag_id) {
            return Err(Error::NotFound(format!("tag {tag_id}")));
        }
        Ok(state.conversation_tags.insert((conversation_id, tag_id)))
    }

    async fn untag(&self, conversation_id: Uuid, tag_id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        Ok(state.conversation_tags.remove(&(conversation_id, tag_id)))
    }

    async fn for_conversation(&self, conversation_id: Uuid) -> Result<Vec<Tag>> {
        let state = self.state.read().await;
        let mut tags: Vec<Tag> = state
            .conversation_tags
            .iter()
            .filter(|(c, _)| *c == conversation_id)
            .filter_map(|(_, t)| state.tags.get(t).cloned())
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(tags)
    }
}
