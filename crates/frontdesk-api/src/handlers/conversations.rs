//! Conversation handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use frontdesk_core::{
    Conversation, ConversationFilter, ConversationType, Page, PageRequest, ReadReceipt, Tag,
};

use crate::abilities::NewConversation;
use crate::auth::AuthStaff;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListConversationsQuery {
    pub limit: Option<i64>,
    pub after: Option<Uuid>,
    #[serde(rename = "type")]
    pub conversation_type: Option<ConversationType>,
    pub customer_id: Option<Uuid>,
    pub tag_id: Option<Uuid>,
}

/// `GET /api/v1/conversations`
pub async fn list_conversations(
    State(state): State<AppState>,
    AuthStaff(staff): AuthStaff,
    Query(query): Query<ListConversationsQuery>,
) -> ApiResult<Json<Page<Conversation>>> {
    let filter = ConversationFilter {
        conversation_type: query.conversation_type,
        customer_id: query.customer_id,
        tag_id: query.tag_id,
    };
    let page = PageRequest::new(query.limit, query.after);
    let conversations = state
        .abilities(staff)
        .get_conversations(&filter, &page)
        .await?;
    Ok(Json(conversations))
}

/// `POST /api/v1/conversations`
pub async fn create_conversation(
    State(state): State<AppState>,
    AuthStaff(staff): AuthStaff,
    Json(body): Json<NewConversation>,
) -> ApiResult<(StatusCode, Json<Conversation>)> {
    let conversation = state.abilities(staff).create_conversation(body).await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

/// `GET /api/v1/conversations/:id`
pub async fn get_conversation(
    State(state): State<AppState>,
    AuthStaff(staff): AuthStaff,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Conversation>> {
    Ok(Json(state.abilities(staff).get_conversation(id).await?))
}

/// `GET /api/v1/conversations/:id/members`
pub async fn list_members(
    State(state): State<AppState>,
    AuthStaff(staff): AuthStaff,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<JsonValue>> {
    let members = state.abilities(staff).get_conversation_members(id).await?;
    Ok(Json(json!({ "staffIds": members })))
}

/// `POST /api/v1/conversations/:id/join`
pub async fn join_conversation(
    State(state): State<AppState>,
    AuthStaff(staff): AuthStaff,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Conversation>> {
    Ok(Json(state.abilities(staff).join_conversation(id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMembersBody {
    pub staff_ids: Vec<Uuid>,
}

/// `POST /api/v1/conversations/:id/members`
pub async fn add_members(
    State(state): State<AppState>,
    AuthStaff(staff): AuthStaff,
    Path(id): Path<Uuid>,
    Json(body): Json<AddMembersBody>,
) -> ApiResult<Json<Conversation>> {
    let conversation = state
        .abilities(staff)
        .add_to_conversation(id, &body.staff_ids)
        .await?;
    Ok(Json(conversation))
}

/// `POST /api/v1/conversations/:id/touch`
pub async fn touch_conversation(
    State(state): State<AppState>,
    AuthStaff(staff): AuthStaff,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Conversation>> {
    Ok(Json(state.abilities(staff).touch_conversation(id).await?))
}

/// `GET /api/v1/conversations/:id/tags`
pub async fn list_conversation_tags(
    State(state): State<AppState>,
    AuthStaff(staff): AuthStaff,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Tag>>> {
    Ok(Json(state.abilities(staff).get_conversation_tags(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct TagBody {
    pub name: String,
}

/// `POST /api/v1/conversations/:id/tags`
pub async fn tag_conversation(
    State(state): State<AppState>,
    AuthStaff(staff): AuthStaff,
    Path(id): Path<Uuid>,
    Json(body): Json<TagBody>,
) -> ApiResult<Json<Tag>> {
    let tag = state
        .abilities(staff)
        .tag_conversation(id, &body.name)
        .await?;
    Ok(Json(tag))
}

/// `DELETE /api/v1/conversations/:id/tags/:tag_id`
pub async fn untag_conversation(
    State(state): State<AppState>,
    AuthStaff(staff): AuthStaff,
    Path((id, tag_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state
        .abilities(staff)
        .untag_conversation(id, tag_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/v1/conversations/:id/read-receipts`
pub async fn list_read_receipts(
    State(state): State<AppState>,
    AuthStaff(staff): AuthStaff,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<ReadReceipt>>> {
    Ok(Json(state.abilities(staff).get_read_receipts(id).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAsReadBody {
    pub message_id: Option<Uuid>,
}

/// `POST /api/v1/conversations/:id/read`
pub async fn mark_as_read(
    State(state): State<AppState>,
    AuthStaff(staff): AuthStaff,
    Path(id): Path<Uuid>,
    body: Option<Json<MarkAsReadBody>>,
) -> ApiResult<Json<ReadReceipt>> {
    let message_id = body.and_then(|Json(b)| b.message_id);
    let receipt = state.abilities(staff).mark_as_read(id, message_id).await?;
    Ok(Json(receipt))
}

/// `POST /api/v1/conversations/:id/typing/start`
pub async fn start_typing(
    State(state): State<AppState>,
    AuthStaff(staff): AuthStaff,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.abilities(staff).start_typing(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/v1/conversations/:id/typing/stop`
pub async fn stop_typing(
    State(state): State<AppState>,
    AuthStaff(staff): AuthStaff,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.abilities(staff).stop_typing(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
