//! Chat ingestion endpoints
//!
//! Thin write path used by instrumented applications with an
//! organization API key. The slug in the path must match the
//! organization the key belongs to.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use uuid::Uuid;

use crate::db::chat_repository::ChatRepository;
use crate::db::message_repository::MessageRepository;
use crate::db::organization_repository::OrganizationRepository;
use crate::middleware::{ensure_org_access, AuthContext};
use crate::models::{Chat, CreateChatRequest, CreateMessageRequest, Message};
use crate::utils::{AppError, AppResult};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/{slug}/chats", post(create_chat))
        .route("/{slug}/chats/{chat_id}/messages", post(create_message))
}

async fn resolve_org(state: &AppState, ctx: &AuthContext, slug: &str) -> AppResult<Uuid> {
    let org = OrganizationRepository::new(&state.db)
        .get_by_slug(slug)
        .await?
        .ok_or_else(|| AppError::not_found("Organization not found"))?;

    ensure_org_access(ctx, org.id)?;

    Ok(org.id)
}

async fn create_chat(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(slug): Path<String>,
    Json(request): Json<CreateChatRequest>,
) -> AppResult<(StatusCode, Json<Chat>)> {
    let organization_id = resolve_org(&state, &ctx, &slug).await?;

    if request.title.trim().is_empty() {
        return Err(AppError::validation("Chat title must not be empty"));
    }

    let mut chat = Chat::new(organization_id, request.user_id, request.title);
    chat.tags = request.tags;
    if let Some(metadata) = request.metadata {
        chat.metadata = metadata;
    }

    ChatRepository::new(&state.db).create(&chat).await?;

    tracing::debug!(chat_id = %chat.id, organization_id = %organization_id, "Chat recorded");

    Ok((StatusCode::CREATED, Json(chat)))
}

async fn create_message(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path((slug, chat_id)): Path<(String, Uuid)>,
    Json(request): Json<CreateMessageRequest>,
) -> AppResult<(StatusCode, Json<Message>)> {
    let organization_id = resolve_org(&state, &ctx, &slug).await?;

    // Scoped lookup: a chat in another organization reads as absent.
    ChatRepository::new(&state.db)
        .get_by_id(organization_id, chat_id)
        .await?
        .ok_or_else(|| AppError::not_found("Chat not found"))?;

    let mut message = Message::new(chat_id, request.role, request.content);
    if let Some(metadata) = request.metadata {
        message.metadata = metadata;
    }
    message.token_count = request.token_count;
    message.latency_ms = request.latency_ms;

    MessageRepository::new(&state.db).create(&message).await?;

    Ok((StatusCode::CREATED, Json(message)))
}
