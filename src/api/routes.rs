//! Route definitions for the API.

use axum::{extract::DefaultBodyLimit, middleware, routing::get, Router};
use utoipa_swagger_ui::SwaggerUi;

use super::handlers;
use super::middleware::auth::{admin_middleware, auth_middleware};
use super::middleware::security_headers::security_headers_middleware;
use super::middleware::tracing::correlation_id_middleware;
use super::SharedState;

/// Create the main API router
pub fn create_router(state: SharedState) -> Router {
    // Build OpenAPI spec once at startup
    let openapi = super::openapi::build_openapi();

    // Prometheus scrapes hit the root path, outside /api, but the
    // rendered registry still goes through the admin gate.
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::health::metrics))
        .layer(middleware::from_fn_with_state(
            state.auth.clone(),
            admin_middleware,
        ));

    Router::new()
        // Health endpoints (no auth required)
        .route("/health", get(handlers::health::health_check))
        .route("/healthz", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/readyz", get(handlers::health::readiness_check))
        .route("/livez", get(handlers::health::liveness_check))
        // OpenAPI spec (served by SwaggerUi at /api/openapi.json) and Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", openapi))
        .merge(metrics_routes)
        // API routes
        .nest("/api", api_routes(state.clone()))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(correlation_id_middleware))
        .with_state(state)
}

/// API routes
fn api_routes(state: SharedState) -> Router<SharedState> {
    // Middleware borrows the AuthService the handlers already share
    let auth_service = state.auth.clone();

    Router::new()
        // Auth routes - split into public and protected
        .nest("/auth", handlers::auth::public_router())
        .nest(
            "/auth",
            handlers::auth::protected_router().layer(middleware::from_fn_with_state(
                auth_service.clone(),
                auth_middleware,
            )),
        )
        // User management routes require admin privileges
        .nest(
            "/users",
            handlers::users::router()
                .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB
                .layer(middleware::from_fn_with_state(
                    auth_service.clone(),
                    admin_middleware,
                )),
        )
        // Course catalog with auth middleware
        .nest(
            "/courses",
            handlers::courses::router()
                .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB
                .layer(middleware::from_fn_with_state(
                    auth_service.clone(),
                    auth_middleware,
                )),
        )
        // Assignments addressed by their own id once created
        .nest(
            "/assignments",
            handlers::courses::assignments_router()
                .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB
                .layer(middleware::from_fn_with_state(
                    auth_service.clone(),
                    auth_middleware,
                )),
        )
        // Law-review articles; manuscript bodies run long
        .nest(
            "/articles",
            handlers::articles::router()
                .layer(DefaultBodyLimit::max(2 * 1024 * 1024)) // 2 MB
                .layer(middleware::from_fn_with_state(
                    auth_service.clone(),
                    auth_middleware,
                )),
        )
        // Video catalog and upload flow. Files go to storage over
        // presigned URLs; the JSON bodies here only carry metadata and
        // the occasional base64 poster frame.
        .nest(
            "/videos",
            handlers::videos::router()
                .layer(DefaultBodyLimit::max(8 * 1024 * 1024)) // 8 MB
                .layer(middleware::from_fn_with_state(
                    auth_service.clone(),
                    auth_middleware,
                )),
        )
        // Provider webhooks carry their own credentials, no session auth
        .nest(
            "/webhooks",
            handlers::webhooks::router().layer(DefaultBodyLimit::max(1024 * 1024)), // 1 MB
        )
        // Maintenance migrations require admin privileges
        .nest(
            "/database",
            handlers::database::router()
                .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB
                .layer(middleware::from_fn_with_state(
                    auth_service.clone(),
                    admin_middleware,
                )),
        )
        // Audit log and domain event stream (SSE) with auth middleware
        .nest(
            "/events",
            handlers::events::router().layer(middleware::from_fn_with_state(
                auth_service,
                auth_middleware,
            )),
        )
}
