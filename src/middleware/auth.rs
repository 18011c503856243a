//! Authentication middleware
//!
//! Two credential schemes are supported:
//! - JWT bearer tokens (`Authorization: Bearer ...`) for interactive users
//! - Organization API keys (`X-Organization-Api-Key`) for ingestion clients
//!
//! Both resolve to an [`AuthContext`] injected into request extensions.
//! Unknown, malformed and revoked credentials all produce the same
//! response, so a caller cannot discover which keys exist.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::api_key_repository::ApiKeyRepository,
    models::{Role, User},
    services::auth::key_digest,
    utils::ErrorResponse,
    AppState,
};

/// Header carrying an organization API key
pub const API_KEY_HEADER: &str = "x-organization-api-key";

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// User email
    pub email: String,
    /// Organization/tenant ID
    pub org: String,
    /// Role name
    pub role: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Not before timestamp
    pub nbf: i64,
    /// Expiration timestamp
    pub exp: i64,
    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

/// Authenticated user information extracted from a JWT
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

/// Resolved caller identity for a request
///
/// JWT authentication carries a user; API-key authentication only proves
/// membership in an organization.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub organization_id: Uuid,
    pub user: Option<AuthUser>,
}

impl AuthContext {
    pub fn is_super_admin(&self) -> bool {
        self.user
            .as_ref()
            .map(|u| u.role == Role::SuperAdmin)
            .unwrap_or(false)
    }

    /// User id when a user is present, for audit fields
    pub fn user_id(&self) -> Option<Uuid> {
        self.user.as_ref().map(|u| u.id)
    }
}

impl TryFrom<Claims> for AuthContext {
    type Error = &'static str;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&claims.sub).map_err(|_| "Invalid user ID in token")?;
        let organization_id =
            Uuid::parse_str(&claims.org).map_err(|_| "Invalid organization ID in token")?;
        let role = claims
            .role
            .parse::<Role>()
            .map_err(|_| "Invalid role in token")?;

        Ok(Self {
            organization_id,
            user: Some(AuthUser {
                id,
                email: claims.email,
                role,
            }),
        })
    }
}

/// Extractor for AuthContext from request extensions
///
/// This allows using AuthContext as a handler parameter after an auth
/// middleware has run.
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthContext>().cloned().ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new(
                    "unauthorized",
                    "Authentication required",
                )),
            )
        })
    }
}

/// Create a new JWT access token for a user
pub fn create_access_token(
    user: &User,
    secret: &str,
    expiry_hours: u64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::hours(expiry_hours as i64);

    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        org: user.organization_id.to_string(),
        role: user.role.as_str().to_string(),
        iat: now.timestamp(),
        nbf: now.timestamp(),
        exp: exp.timestamp(),
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Validate and decode a JWT token
pub fn validate_token(token: &str, secret: &str) -> Result<TokenData<Claims>, AuthError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.validate_nbf = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })
}

/// Authentication error types
#[derive(Debug)]
pub enum AuthError {
    MissingCredentials,
    InvalidToken,
    TokenExpired,
    InvalidApiKey,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingCredentials => {
                (StatusCode::UNAUTHORIZED, "Missing authentication credentials")
            }
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid authentication token"),
            AuthError::TokenExpired => {
                (StatusCode::UNAUTHORIZED, "Authentication token has expired")
            }
            AuthError::InvalidApiKey => (StatusCode::UNAUTHORIZED, "Invalid API key"),
        };

        let body = ErrorResponse::new("unauthorized", message);

        (status, Json(body)).into_response()
    }
}

/// Extract bearer token from Authorization header
fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
}

async fn authenticate_api_key(state: &AppState, raw_key: &str) -> Result<AuthContext, AuthError> {
    let digest = key_digest(raw_key);

    let key = ApiKeyRepository::new(&state.db)
        .get_by_digest(&digest)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "API key lookup failed");
            AuthError::InvalidApiKey
        })?
        .ok_or(AuthError::InvalidApiKey)?;

    if key.is_revoked() {
        return Err(AuthError::InvalidApiKey);
    }

    Ok(AuthContext {
        organization_id: key.organization_id,
        user: None,
    })
}

/// JWT authentication middleware
///
/// Extracts and validates the bearer token from the Authorization header.
/// On success, it injects the AuthContext into request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let token = extract_bearer_token(auth_header).ok_or(AuthError::InvalidToken)?;
    let token_data = validate_token(token, &state.config.auth.jwt_secret)?;
    let context: AuthContext = token_data
        .claims
        .try_into()
        .map_err(|_| AuthError::InvalidToken)?;

    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

/// API key authentication middleware for ingestion routes
///
/// Validates the `X-Organization-Api-Key` header against the stored key
/// digests and injects an organization-scoped AuthContext.
pub async fn api_key_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let raw_key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let context = authenticate_api_key(&state, raw_key).await?;

    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}
