//! User management handlers. Admin only.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use crate::api::dto::{Pagination, PaginationQuery};
use crate::api::middleware::auth::AuthExtension;
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::user::{User, UserRole};
use crate::services::audit_service::{AuditRecord, EntityType};
use crate::services::auth_service::AuthService;

const USER_COLUMNS: &str = "id, email, password_hash, display_name, role, is_active, \
     must_change_password, last_login_at, created_at, updated_at";

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).patch(update_user).delete(delete_user))
        .route("/:id/reset-password", post(reset_password))
}

/// Generate a random initial password. Ambiguous characters are left out
/// of the charset since these get read over the phone or from a printout.
pub(crate) fn generate_password() -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghjkmnpqrstuvwxyz23456789!@#$%&*";
    let mut rng = rand::rng();
    (0..16)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub email: String,
    /// Auto-generated when not provided
    pub password: Option<String>,
    pub display_name: Option<String>,
    pub role: UserRole,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub display_name: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminUserResponse {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub must_change_password: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for AdminUserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            role: user.role,
            is_active: user.is_active,
            must_change_password: user.must_change_password,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedUserResponse {
    #[serde(flatten)]
    pub user: AdminUserResponse,
    /// Present only when the password was auto-generated; shown once.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_password: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResetPasswordResponse {
    pub password: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListUsersQuery {
    pub role: Option<UserRole>,
    pub include_inactive: Option<bool>,
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: PaginationQuery,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<AdminUserResponse>,
    pub pagination: Pagination,
}

/// List user accounts.
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/users",
    tag = "users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "List of users", body = UserListResponse),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = []))
)]
async fn list_users(
    State(state): State<SharedState>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<UserListResponse>> {
    let include_inactive = query.include_inactive.unwrap_or(false);

    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users \
         WHERE ($1::user_role IS NULL OR role = $1) AND ($2 OR is_active) \
         ORDER BY email ASC LIMIT $3 OFFSET $4"
    ))
    .bind(query.role)
    .bind(include_inactive)
    .bind(query.pagination.limit())
    .bind(query.pagination.offset())
    .fetch_all(&state.db)
    .await?;

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM users \
         WHERE ($1::user_role IS NULL OR role = $1) AND ($2 OR is_active)",
    )
    .bind(query.role)
    .bind(include_inactive)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(UserListResponse {
        users: users.into_iter().map(Into::into).collect(),
        pagination: Pagination::from_query_and_total(&query.pagination, total),
    }))
}

/// Create a user account.
#[utoipa::path(
    post,
    path = "",
    context_path = "/api/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = CreatedUserResponse),
        (status = 409, description = "Email already registered"),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = []))
)]
async fn create_user(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreatedUserResponse>)> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("a valid email is required".to_string()));
    }

    let (password, generated) = match req.password {
        Some(p) if !p.is_empty() => (p, false),
        _ => (generate_password(), true),
    };
    if password.len() < 8 {
        return Err(AppError::Validation(
            "password must be at least 8 characters".to_string(),
        ));
    }
    let password_hash = AuthService::hash_password(&password)?;

    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (email, password_hash, display_name, role, must_change_password) \
         VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
    ))
    .bind(&email)
    .bind(&password_hash)
    .bind(&req.display_name)
    .bind(req.role)
    .bind(generated)
    .fetch_one(&state.db)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(format!("a user with email '{}' already exists", email))
        }
        other => other.into(),
    })?;

    state
        .audit
        .record(
            AuditRecord::new("user.created", EntityType::User, user.id.to_string())
                .actor(auth.user_id, auth.email.clone())
                .payload(serde_json::json!({ "email": user.email, "role": user.role })),
        )
        .await?;

    tracing::info!(user_id = %user.id, email = %user.email, "User created");

    Ok((
        StatusCode::CREATED,
        Json(CreatedUserResponse {
            user: user.into(),
            initial_password: generated.then_some(password),
        }),
    ))
}

/// Fetch a single user account.
#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/users",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User details", body = AdminUserResponse),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
async fn get_user(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AdminUserResponse>> {
    let user = fetch_user(&state, id).await?;
    Ok(Json(user.into()))
}

/// Update display name, role, or active flag.
#[utoipa::path(
    patch,
    path = "/{id}",
    context_path = "/api/users",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = AdminUserResponse),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
async fn update_user(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<AdminUserResponse>> {
    // Admins cannot lock themselves out by demotion or deactivation.
    if id == auth.user_id
        && (req.role.is_some_and(|r| r != UserRole::Admin) || req.is_active == Some(false))
    {
        return Err(AppError::Validation(
            "cannot demote or deactivate your own account".to_string(),
        ));
    }

    let user = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET \
         display_name = COALESCE($2, display_name), \
         role = COALESCE($3, role), \
         is_active = COALESCE($4, is_active), \
         updated_at = NOW() \
         WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .bind(&req.display_name)
    .bind(req.role)
    .bind(req.is_active)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    state
        .audit
        .record(
            AuditRecord::new("user.updated", EntityType::User, user.id.to_string())
                .actor(auth.user_id, auth.email.clone()),
        )
        .await?;

    Ok(Json(user.into()))
}

/// Delete a user account. Content they uploaded keeps its rows; the
/// uploader reference becomes null.
#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/users",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
async fn delete_user(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    if id == auth.user_id {
        return Err(AppError::Validation(
            "cannot delete your own account".to_string(),
        ));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    state
        .audit
        .record(
            AuditRecord::new("user.deleted", EntityType::User, id.to_string())
                .actor(auth.user_id, auth.email.clone()),
        )
        .await?;

    tracing::info!(user_id = %id, "User deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Reset a user's password to a fresh generated one.
#[utoipa::path(
    post,
    path = "/{id}/reset-password",
    context_path = "/api/users",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "New password, shown once", body = ResetPasswordResponse),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
async fn reset_password(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResetPasswordResponse>> {
    let password = generate_password();
    let password_hash = AuthService::hash_password(&password)?;

    let result = sqlx::query(
        "UPDATE users SET password_hash = $2, must_change_password = true, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(&password_hash)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    state
        .audit
        .record(
            AuditRecord::new("user.password_reset", EntityType::User, id.to_string())
                .actor(auth.user_id, auth.email.clone()),
        )
        .await?;

    tracing::info!(user_id = %id, "Password reset by admin");

    Ok(Json(ResetPasswordResponse { password }))
}

async fn fetch_user(state: &SharedState, id: Uuid) -> Result<User> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_users,
        create_user,
        get_user,
        update_user,
        delete_user,
        reset_password,
    ),
    components(schemas(
        CreateUserRequest,
        UpdateUserRequest,
        AdminUserResponse,
        CreatedUserResponse,
        ResetPasswordResponse,
        UserListResponse,
    ))
)]
pub struct UsersApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_passwords_are_long_and_unambiguous() {
        let password = generate_password();
        assert_eq!(password.len(), 16);
        for ambiguous in ['I', 'l', 'O', '0', '1'] {
            assert!(!password.contains(ambiguous));
        }
    }

    #[test]
    fn generated_passwords_differ() {
        assert_ne!(generate_password(), generate_password());
    }
}
