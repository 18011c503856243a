//! Organization endpoints

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::db::organization_repository::OrganizationRepository;
use crate::middleware::{ensure_org_access, AuthContext};
use crate::models::Organization;
use crate::utils::{AppError, AppResult};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/{slug}", get(get_by_slug))
}

/// Look up an organization by its slug
///
/// The slug must resolve before the tenant check runs, so an unknown
/// slug is a 404 while a foreign one is a 403.
async fn get_by_slug(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(slug): Path<String>,
) -> AppResult<Json<Organization>> {
    let org = OrganizationRepository::new(&state.db)
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::not_found("Organization not found"))?;

    ensure_org_access(&ctx, org.id)?;

    Ok(Json(org))
}
