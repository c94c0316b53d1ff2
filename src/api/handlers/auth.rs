//! Authentication handlers.

use axum::{
    extract::{Extension, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::api::middleware::auth::AuthExtension;
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::user::{User, UserRole};
use crate::services::auth_service::AuthService;

/// Routes that do not require authentication.
pub fn public_router() -> Router<SharedState> {
    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
}

/// Routes that require a valid access token.
pub fn protected_router() -> Router<SharedState> {
    Router::new()
        .route("/me", get(me))
        .route("/change-password", post(change_password))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub role: UserRole,
    pub must_change_password: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            role: user.role,
            must_change_password: user.must_change_password,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Log in with email and password.
#[utoipa::path(
    post,
    path = "/login",
    context_path = "/api/auth",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
async fn login(
    State(state): State<SharedState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let (user, tokens) = state.auth.authenticate(&req.email, &req.password).await?;

    tracing::info!(user_id = %user.id, email = %user.email, "User logged in");

    Ok(Json(LoginResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_in: tokens.expires_in,
        user: user.into(),
    }))
}

/// Exchange a refresh token for a new token pair.
#[utoipa::path(
    post,
    path = "/refresh",
    context_path = "/api/auth",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Tokens refreshed", body = LoginResponse),
        (status = 401, description = "Invalid refresh token")
    )
)]
async fn refresh(
    State(state): State<SharedState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<LoginResponse>> {
    let (user, tokens) = state.auth.refresh_tokens(&req.refresh_token).await?;

    Ok(Json(LoginResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_in: tokens.expires_in,
        user: user.into(),
    }))
}

/// Current user profile.
#[utoipa::path(
    get,
    path = "/me",
    context_path = "/api/auth",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = []))
)]
async fn me(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
) -> Result<Json<UserResponse>> {
    let user = fetch_user(&state, auth.user_id).await?;
    Ok(Json(user.into()))
}

/// Change the caller's own password.
#[utoipa::path(
    post,
    path = "/change-password",
    context_path = "/api/auth",
    tag = "auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 401, description = "Current password incorrect")
    ),
    security(("bearer_auth" = []))
)]
async fn change_password(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<axum::http::StatusCode> {
    if req.new_password.len() < 8 {
        return Err(AppError::Validation(
            "password must be at least 8 characters".to_string(),
        ));
    }

    let user = fetch_user(&state, auth.user_id).await?;

    if !AuthService::verify_password(&req.current_password, &user.password_hash)? {
        return Err(AppError::Authentication(
            "Current password is incorrect".to_string(),
        ));
    }

    let password_hash = AuthService::hash_password(&req.new_password)?;
    sqlx::query(
        "UPDATE users SET password_hash = $2, must_change_password = false, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(user.id)
    .bind(&password_hash)
    .execute(&state.db)
    .await?;

    tracing::info!(user_id = %user.id, "Password changed");

    Ok(axum::http::StatusCode::NO_CONTENT)
}

async fn fetch_user(state: &SharedState, id: Uuid) -> Result<User> {
    sqlx::query_as::<_, User>(
        "SELECT id, email, password_hash, display_name, role, is_active, \
         must_change_password, last_login_at, created_at, updated_at \
         FROM users WHERE id = $1 AND is_active = true",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

#[derive(OpenApi)]
#[openapi(
    paths(login, refresh, me, change_password),
    components(schemas(
        LoginRequest,
        LoginResponse,
        UserResponse,
        RefreshRequest,
        ChangePasswordRequest,
    ))
)]
pub struct AuthApiDoc;
