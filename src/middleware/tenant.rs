//! Tenant isolation guard
//!
//! Every protected handler that touches organization-owned data runs its
//! access through [`ensure_org_access`] before doing any work. Row-level
//! isolation is additionally enforced in the repositories, which scope
//! their queries by organization id; the guard exists so that a denied
//! request fails before the first query.

use uuid::Uuid;

use super::auth::AuthContext;
use crate::utils::{AppError, AppResult};

/// Check whether the caller may act on the given organization
///
/// Super admins may act across tenants. Everyone else must belong to the
/// organization they are addressing; a mismatch is a 403, not a 404,
/// because the caller already named the organization explicitly.
pub fn ensure_org_access(ctx: &AuthContext, organization_id: Uuid) -> AppResult<()> {
    if ctx.is_super_admin() {
        return Ok(());
    }

    if ctx.organization_id == organization_id {
        return Ok(());
    }

    tracing::warn!(
        caller_org = %ctx.organization_id,
        target_org = %organization_id,
        "Cross-tenant access denied"
    );

    Err(AppError::Forbidden(
        "Access to this organization is not permitted".to_string(),
    ))
}
