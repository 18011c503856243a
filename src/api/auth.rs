//! Authentication endpoints

use axum::{extract::State, http::StatusCode, Json};

use crate::middleware::auth::create_access_token;
use crate::middleware::AuthContext;
use crate::models::{AuthResponse, ChangePasswordRequest, LoginRequest};
use crate::services::AuthService;
use crate::utils::{AppError, AppResult};
use crate::AppState;

/// Minimum accepted password length
const MIN_PASSWORD_LENGTH: usize = 8;

/// Login with email and password
///
/// Unknown emails and wrong passwords produce the same response, so the
/// endpoint cannot be used to enumerate accounts.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let service = AuthService::new(state.db.clone(), state.config.auth.bcrypt_cost);

    let user = service
        .authenticate(&request.email, &request.password)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Authentication lookup failed");
            AppError::internal("Authentication failed")
        })?
        .ok_or_else(|| AppError::unauthorized("Invalid email or password"))?;

    let expiry_hours = state.config.auth.token_expiry_hours;
    let access_token = create_access_token(&user, &state.config.auth.jwt_secret, expiry_hours)
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to issue token");
            AppError::internal("Failed to issue token")
        })?;

    tracing::info!(user_id = %user.id, organization_id = %user.organization_id, "User logged in");

    Ok(Json(AuthResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: expiry_hours * 3600,
        user,
    }))
}

/// Rotate the caller's password
///
/// The current password must verify first; a wrong current password is
/// reported the same way as an unknown account.
pub async fn change_password(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<ChangePasswordRequest>,
) -> AppResult<StatusCode> {
    let user_id = ctx
        .user_id()
        .ok_or_else(|| AppError::forbidden("Password changes require a user credential"))?;

    if request.new_password.len() < MIN_PASSWORD_LENGTH {
        return Err(AppError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    let service = AuthService::new(state.db.clone(), state.config.auth.bcrypt_cost);
    let changed = service
        .change_password(user_id, &request.current_password, &request.new_password)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Password change failed");
            AppError::internal("Password change failed")
        })?;

    if !changed {
        return Err(AppError::unauthorized("Invalid credentials"));
    }

    tracing::info!(user_id = %user_id, "Password changed");

    Ok(StatusCode::NO_CONTENT)
}
