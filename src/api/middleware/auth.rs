//! Authentication middleware.
//!
//! Extracts and validates JWT access tokens from the `Authorization: Bearer`
//! header and attaches an [`AuthExtension`] to the request for handlers.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::UserRole;
use crate::services::auth_service::AuthService;

/// Authenticated user info attached to requests after token validation.
#[derive(Debug, Clone)]
pub struct AuthExtension {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
}

/// Roles allowed to upload videos and manage courses.
pub const UPLOAD_ROLES: &[UserRole] = &[UserRole::Admin, UserRole::Faculty, UserRole::Editor];

/// Roles allowed to move articles through the editorial workflow.
pub const EDITORIAL_ROLES: &[UserRole] = &[UserRole::Admin, UserRole::Editor];

impl AuthExtension {
    /// Check the caller's role against an allow list.
    pub fn require_role(&self, allowed: &[UserRole]) -> Result<(), AppError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Authorization(format!(
                "role '{}' is not permitted to perform this action",
                self.role.as_str()
            )))
        }
    }

}

/// Pull the bearer token out of the Authorization header, if present.
fn extract_token(request: &Request) -> Option<String> {
    let header = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    header
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
}

/// Middleware that requires a valid access token.
pub async fn auth_middleware(
    State(auth_service): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_token(&request) else {
        return AppError::Authentication("Missing authorization header".to_string())
            .into_response();
    };

    match auth_service.validate_access_token(&token) {
        Ok(claims) => {
            request.extensions_mut().insert(AuthExtension {
                user_id: claims.sub,
                email: claims.email,
                role: claims.role,
            });
            next.run(request).await
        }
        Err(_) => {
            AppError::Authentication("Invalid or expired token".to_string()).into_response()
        }
    }
}

/// Middleware that requires a valid access token with the admin role.
pub async fn admin_middleware(
    State(auth_service): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_token(&request) else {
        return AppError::Authentication("Missing authorization header".to_string())
            .into_response();
    };

    match auth_service.validate_access_token(&token) {
        Ok(claims) if claims.role == UserRole::Admin => {
            request.extensions_mut().insert(AuthExtension {
                user_id: claims.sub,
                email: claims.email,
                role: claims.role,
            });
            next.run(request).await
        }
        Ok(_) => AppError::Authorization("Admin access required".to_string()).into_response(),
        Err(_) => {
            AppError::Authentication("Invalid or expired token".to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extension(role: UserRole) -> AuthExtension {
        AuthExtension {
            user_id: Uuid::new_v4(),
            email: "test@law.example.edu".to_string(),
            role,
        }
    }

    #[test]
    fn upload_roles_exclude_students() {
        assert!(extension(UserRole::Faculty).require_role(UPLOAD_ROLES).is_ok());
        assert!(extension(UserRole::Editor).require_role(UPLOAD_ROLES).is_ok());
        assert!(extension(UserRole::Admin).require_role(UPLOAD_ROLES).is_ok());
        assert!(extension(UserRole::Student).require_role(UPLOAD_ROLES).is_err());
    }

    #[test]
    fn editorial_roles_exclude_faculty() {
        assert!(extension(UserRole::Editor).require_role(EDITORIAL_ROLES).is_ok());
        assert!(extension(UserRole::Admin).require_role(EDITORIAL_ROLES).is_ok());
        assert!(extension(UserRole::Faculty)
            .require_role(EDITORIAL_ROLES)
            .is_err());
        assert!(extension(UserRole::Student)
            .require_role(EDITORIAL_ROLES)
            .is_err());
    }

}
