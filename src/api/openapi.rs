//! OpenAPI specification generated from handler annotations via utoipa.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Top-level OpenAPI document for the Lectern API.
///
/// Each handler module contributes its own paths and schemas via per-module
/// `#[derive(OpenApi)]` structs that are merged into this root document at
/// startup.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Lectern API",
        description = "Institutional repository backend for law-school lecture video and law-review publishing.",
        version = "0.4.2",
        license(name = "Apache-2.0", url = "https://www.apache.org/licenses/LICENSE-2.0")
    ),
    servers(
        (url = "/", description = "Current server"),
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Authentication and session management"),
        (name = "users", description = "User administration"),
        (name = "courses", description = "Courses, assignments, and enrollments"),
        (name = "articles", description = "Law-review articles and editorial workflow"),
        (name = "videos", description = "Lecture video upload, catalog, and playback"),
        (name = "webhooks", description = "Inbound provider webhooks"),
        (name = "database", description = "Maintenance migrations"),
        (name = "events", description = "Audit trail and live event stream"),
    ),
    components(schemas(ErrorResponse))
)]
pub struct ApiDoc;

/// Standard error response body returned by all endpoints on failure.
#[derive(serde::Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
    /// Optional extra context, null when there is none
    pub details: Option<String>,
}

/// Adds Bearer JWT security scheme to the OpenAPI spec.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Build the merged OpenAPI document from all handler modules.
pub fn build_openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();

    // Merge per-module OpenAPI structs as they are annotated.
    // Each module defines its own XxxApiDoc that lists its paths and schemas.
    doc.merge(super::handlers::auth::AuthApiDoc::openapi());
    doc.merge(super::handlers::users::UsersApiDoc::openapi());
    doc.merge(super::handlers::courses::CoursesApiDoc::openapi());
    doc.merge(super::handlers::articles::ArticlesApiDoc::openapi());
    doc.merge(super::handlers::videos::VideosApiDoc::openapi());
    doc.merge(super::handlers::webhooks::WebhooksApiDoc::openapi());
    doc.merge(super::handlers::database::DatabaseApiDoc::openapi());
    doc.merge(super::handlers::events::EventsApiDoc::openapi());

    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_spec_is_valid() {
        let spec = build_openapi();

        assert_eq!(spec.info.title, "Lectern API");

        // A missing module merge shows up as a path-count drop
        let path_count = spec.paths.paths.len();
        assert!(
            path_count >= 30,
            "Expected at least 30 paths, got {path_count}. A module merge may be missing."
        );

        let schema_count = spec.components.as_ref().map_or(0, |c| c.schemas.len());
        assert!(
            schema_count >= 30,
            "Expected at least 30 schemas, got {schema_count}."
        );

        let has_bearer = spec
            .components
            .as_ref()
            .is_some_and(|c| c.security_schemes.contains_key("bearer_auth"));
        assert!(has_bearer, "Bearer auth security scheme is missing.");

        let tags: Vec<&str> = spec
            .tags
            .as_ref()
            .map_or(vec![], |t| t.iter().map(|tag| tag.name.as_str()).collect());
        for expected_tag in [
            "auth", "users", "courses", "articles", "videos", "webhooks", "database", "events",
        ] {
            assert!(
                tags.contains(&expected_tag),
                "Missing expected tag: {expected_tag}"
            );
        }

        let json = serde_json::to_string(&spec).expect("Spec should serialize to JSON");
        assert!(
            json.len() > 20_000,
            "Spec JSON seems too small: {} bytes",
            json.len()
        );
    }

    #[test]
    fn openapi_spec_operation_count() {
        let spec = build_openapi();
        let mut op_count = 0;

        for item in spec.paths.paths.values() {
            if item.get.is_some() {
                op_count += 1;
            }
            if item.put.is_some() {
                op_count += 1;
            }
            if item.post.is_some() {
                op_count += 1;
            }
            if item.delete.is_some() {
                op_count += 1;
            }
            if item.patch.is_some() {
                op_count += 1;
            }
        }

        assert!(
            op_count >= 45,
            "Expected at least 45 operations, got {op_count}. Handler annotations may be missing."
        );
    }

    #[test]
    fn workflow_endpoints_are_documented() {
        let spec = build_openapi();

        for (path, method_is_post) in [
            ("/api/videos/upload-url", true),
            ("/api/videos/{id}/status", false),
            ("/api/videos/{id}/playback", false),
            ("/api/articles/{id}/status", true),
            ("/api/database/migrate", true),
            ("/api/webhooks/mux", true),
            ("/api/webhooks/mediaconvert", true),
        ] {
            let item = spec
                .paths
                .paths
                .get(path)
                .unwrap_or_else(|| panic!("Missing documented path: {path}"));
            if method_is_post {
                assert!(item.post.is_some(), "POST {path} should be documented");
            } else {
                assert!(item.get.is_some(), "GET {path} should be documented");
            }
        }
    }

    /// Verify every path documented in the OpenAPI spec has a corresponding
    /// route registered in the handler routers. This catches the class of bug
    /// where a handler is annotated with `#[utoipa::path(...)]` and listed in
    /// the module's `ApiDoc` struct but never `.route()`-ed in the router.
    #[test]
    fn all_openapi_paths_have_handlers() {
        let spec = build_openapi();

        let mut documented: Vec<(String, String)> = Vec::new();
        for (path, item) in &spec.paths.paths {
            if item.get.is_some() {
                documented.push(("GET".to_string(), path.clone()));
            }
            if item.post.is_some() {
                documented.push(("POST".to_string(), path.clone()));
            }
            if item.put.is_some() {
                documented.push(("PUT".to_string(), path.clone()));
            }
            if item.delete.is_some() {
                documented.push(("DELETE".to_string(), path.clone()));
            }
            if item.patch.is_some() {
                documented.push(("PATCH".to_string(), path.clone()));
            }
        }

        // Map from OpenAPI context_path prefix to the handler source that
        // registers routes under it.
        let handler_sources: Vec<(&str, &str)> = vec![
            ("/api/auth/", include_str!("handlers/auth.rs")),
            ("/api/users/", include_str!("handlers/users.rs")),
            ("/api/courses/", include_str!("handlers/courses.rs")),
            ("/api/articles/", include_str!("handlers/articles.rs")),
            ("/api/videos/", include_str!("handlers/videos.rs")),
            ("/api/webhooks/", include_str!("handlers/webhooks.rs")),
            ("/api/database/", include_str!("handlers/database.rs")),
            ("/api/events/", include_str!("handlers/events.rs")),
        ];

        let mut missing = Vec::new();

        for (method, path) in &documented {
            let source = handler_sources
                .iter()
                .find(|(prefix, _)| path.starts_with(prefix));

            if let Some((prefix, source_file)) = source {
                // Extract the first static route segment after the prefix,
                // e.g. "/api/auth/login" → "login". Parameter segments like
                // {id} cannot be matched textually and are skipped.
                let route_suffix = &path[prefix.len() - 1..];
                let first_segment = route_suffix.split('/').nth(1).unwrap_or("");
                if first_segment.is_empty() || first_segment.starts_with('{') {
                    continue;
                }

                let route_pattern = format!("\"/{first_segment}");
                if !source_file.contains(&route_pattern) {
                    missing.push(format!(
                        "{method} {path}: route segment '/{first_segment}' not found in handler source"
                    ));
                }
            }
        }

        assert!(
            missing.is_empty(),
            "The following OpenAPI-documented endpoints appear to be missing route registrations:\n{}",
            missing.join("\n")
        );
    }

    #[test]
    fn error_envelope_shape() {
        let err = ErrorResponse {
            error: "Resource not found".to_string(),
            details: None,
        };
        let json = serde_json::to_value(&err).unwrap();
        assert!(json.get("error").is_some());
        assert!(json.as_object().unwrap().contains_key("details"));
    }
}
