use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, MessageResponse};
use crate::services::{AccountSummary, Identity};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: AccountSummary,
}

#[derive(Serialize)]
pub struct IdentityResponse {
    pub id: i32,
    pub username: String,
    pub role_id: i32,
    pub role: String,
}

// ============================================================================
// Middleware
// ============================================================================

/// Authentication middleware. Validates the `Authorization: Bearer <token>`
/// header and attaches the decoded [`Identity`] to the request; every other
/// outcome is a uniform 401.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = extract_bearer_token(&headers)
        && let Ok(claims) = state.tokens().validate(&token)
        && let Ok(id) = claims.sub.parse::<i32>()
    {
        tracing::Span::current().record("user_id", &claims.username);

        request.extensions_mut().insert(Identity {
            id,
            username: claims.username,
            role_id: claims.role_id,
            role: claims.role,
        });
        return Ok(next.run(request).await);
    }

    let response = (StatusCode::UNAUTHORIZED, "Unauthorized");
    Ok(response.into_response())
}

/// Role gate for admin-only routes. Runs inside `auth_middleware`, so the
/// identity extension is always present by the time this executes.
pub async fn require_admin(request: Request, next: Next) -> Result<impl IntoResponse, ApiError> {
    let is_admin = request
        .extensions()
        .get::<Identity>()
        .is_some_and(|identity| identity.role == "admin");

    if !is_admin {
        return Err(ApiError::Forbidden(
            "Administrator role required".to_string(),
        ));
    }

    Ok(next.run(request).await)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        return Some(token.trim().to_string());
    }

    None
}

/// Best-effort client address from proxy headers. The server does not
/// trust these for authorization, only for audit annotation.
pub(super) fn client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
        && let Some(first) = value.split(',').next()
    {
        let first = first.trim();
        if !first.is_empty() {
            return Some(first.to_string());
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.trim().to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/login
/// Authenticate with username and password, returns a session token on success
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    // Validate input
    if payload.username.is_empty() {
        return Err(ApiError::validation("Username is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let outcome = state
        .auth()
        .login(&payload.username, &payload.password, client_ip(&headers))
        .await?;

    Ok(Json(ApiResponse::success(LoginResponse {
        token: outcome.token,
        user: outcome.user,
    })))
}

/// POST /auth/logout
/// Acknowledge the logout; the client discards the token. The audit write
/// is fire-and-forget, so this always succeeds.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    axum::Extension(identity): axum::Extension<Identity>,
) -> Json<ApiResponse<MessageResponse>> {
    state
        .auth()
        .logout(&identity, client_ip(&headers))
        .await;

    Json(ApiResponse::success(MessageResponse {
        message: "Logged out. Discard the token on the client.".to_string(),
    }))
}

/// GET /auth/me
/// Get the caller's identity (requires authentication)
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    axum::Extension(identity): axum::Extension<Identity>,
) -> Result<Json<ApiResponse<IdentityResponse>>, ApiError> {
    state
        .auth()
        .session_check(&identity, client_ip(&headers))
        .await?;

    Ok(Json(ApiResponse::success(IdentityResponse {
        id: identity.id,
        username: identity.username,
        role_id: identity.role_id,
        role: identity.role,
    })))
}
