use axum::{
    Extension, Json,
    body::Bytes,
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::db::Account;
use crate::services::{AccountError, Registration, TokenPair};

use super::{ApiError, AppState};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Fields are optional at the wire level so that an absent field reports as
/// a per-field validation error rather than a deserialization failure.
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password2: Option<String>,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub user: AccountResponse,
    pub access: String,
    pub refresh: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Public projection of an account. Never carries the password hash.
#[derive(Serialize)]
pub struct AccountResponse {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            username: account.username,
            email: account.email,
            avatar: account.avatar,
            bio: account.bio,
        }
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Id of the account a verified bearer token is bound to.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedAccount(pub i32);

/// Authentication middleware for protected routes.
///
/// Requires `Authorization: Bearer <access_token>`; on success the account id
/// is made available to handlers as an [`AuthenticatedAccount`] extension.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let Some(token) = extract_bearer_token(&headers) else {
        return Err(ApiError::Unauthorized(
            "Authentication credentials were not provided".to_string(),
        ));
    };

    let account_id = state.token_service.verify_access(&token)?;

    tracing::Span::current().record("account_id", account_id);

    request
        .extensions_mut()
        .insert(AuthenticatedAccount(account_id));

    Ok(next.run(request).await)
}

fn require_field(value: Option<String>, field: &'static str) -> Result<String, ApiError> {
    value.ok_or_else(|| AccountError::MissingField(field).into())
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth_header = headers.get("Authorization")?;
    let auth_str = auth_header.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ")?;

    Some(token.trim().to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/register/
/// Create an account and return its profile with a fresh token pair.
pub async fn register(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.register_throttle.check(&addr.ip().to_string()) {
        return Err(ApiError::Throttled);
    }

    let registration = Registration {
        username: require_field(payload.username, "username")?,
        email: require_field(payload.email, "email")?,
        password: require_field(payload.password, "password")?,
        password2: require_field(payload.password2, "password2")?,
    };

    let account = state.account_service.register(registration).await?;

    let TokenPair { access, refresh } = state.token_service.issue_pair(account.id)?;

    tracing::info!(username = %account.username, "Account registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: account.into(),
            access,
            refresh,
        }),
    ))
}

/// POST /v1/login/
/// Exchange credentials for a token pair.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let username = require_field(payload.username, "username")?;
    let password = require_field(payload.password, "password")?;

    let account = state.account_service.login(&username, &password).await?;

    let pair = state.token_service.issue_pair(account.id)?;

    tracing::info!(username = %account.username, "Login succeeded");

    Ok(Json(pair))
}

/// GET /v1/profile/
/// Profile of the authenticated account.
pub async fn profile(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedAccount(account_id)): Extension<AuthenticatedAccount>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = state.account_service.profile(account_id).await?;

    Ok(Json(account.into()))
}

/// PUT /v1/profile/avatar
/// Replace the authenticated account's avatar with the request body bytes.
pub async fn update_avatar(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedAccount(account_id)): Extension<AuthenticatedAccount>,
    body: Bytes,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = state
        .account_service
        .update_avatar(account_id, &body)
        .await?;

    Ok(Json(account.into()))
}
