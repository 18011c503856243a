//! API key management endpoints
//!
//! Creating a key returns the raw value exactly once; only its digest is
//! stored. Revocation requires an admin credential.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::db::api_key_repository::ApiKeyRepository;
use crate::middleware::AuthContext;
use crate::models::{ApiKey, CreateApiKeyRequest, CreateApiKeyResponse, Role};
use crate::services::auth::generate_api_key;
use crate::utils::{AppError, AppResult};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_api_keys).post(create_api_key))
        .route("/{id}/revoke", post(revoke_api_key))
}

fn require_admin(ctx: &AuthContext) -> AppResult<()> {
    let is_admin = ctx
        .user
        .as_ref()
        .map(|u| u.role >= Role::Admin)
        .unwrap_or(false);

    if is_admin {
        Ok(())
    } else {
        Err(AppError::forbidden("API key management requires admin role"))
    }
}

async fn list_api_keys(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> AppResult<Json<Vec<ApiKey>>> {
    require_admin(&ctx)?;

    let keys = ApiKeyRepository::new(&state.db)
        .list_for_organization(ctx.organization_id)
        .await?;
    Ok(Json(keys))
}

async fn create_api_key(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<CreateApiKeyRequest>,
) -> AppResult<(StatusCode, Json<CreateApiKeyResponse>)> {
    require_admin(&ctx)?;

    if request.label.trim().is_empty() {
        return Err(AppError::validation("API key label must not be empty"));
    }

    let (raw_key, digest) = generate_api_key();
    let api_key = ApiKey::new(ctx.organization_id, digest, request.label.trim().to_string());

    ApiKeyRepository::new(&state.db).create(&api_key).await?;

    tracing::info!(
        api_key_id = %api_key.id,
        organization_id = %ctx.organization_id,
        "API key created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateApiKeyResponse {
            api_key,
            key: raw_key,
        }),
    ))
}

async fn revoke_api_key(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_admin(&ctx)?;

    let revoked = ApiKeyRepository::new(&state.db)
        .revoke(ctx.organization_id, id)
        .await?;

    if !revoked {
        return Err(AppError::not_found("API key not found"));
    }

    tracing::info!(api_key_id = %id, organization_id = %ctx.organization_id, "API key revoked");

    Ok(StatusCode::NO_CONTENT)
}
