//! HTTP contract tests for the Lectern backend.
//!
//! These tests require a running backend server and exercise the public
//! API surface end to end. Set TEST_BASE_URL to point at the server:
//!
//! ```sh
//! export TEST_BASE_URL="http://127.0.0.1:8080"
//! export TEST_ADMIN_EMAIL="admin@lectern.local"
//! export TEST_ADMIN_PASSWORD="admin123"
//! cargo test --test api_contract_tests -- --ignored
//! ```
//!
//! The upload-flow tests additionally need the server to run with an
//! S3-compatible storage backend (e.g. MinIO), since the filesystem
//! backend cannot hand out presigned PUT URLs; they skip themselves
//! when the server answers 400 on upload-url.
//!
//! Note: These tests are marked with #[ignore] because they require
//! a running HTTP server. In CI, run them separately with a service
//! container.

#![allow(dead_code)]

mod common;

use std::env;

use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};

use common::test_id;

/// 1x1 white JPEG, used as the client-captured poster frame
const TINY_JPEG_BASE64: &str = "/9j/4AAQSkZJRgABAQEAYABgAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/wAALCAABAAEBAREA/8QAFAABAAAAAAAAAAAAAAAAAAAACf/EABQQAQAAAAAAAAAAAAAAAAAAAAD/2gAIAQEAAD8AVN//2Q==";

/// Test server configuration
struct TestServer {
    base_url: String,
    access_token: String,
    user_id: String,
    client: Client,
}

impl TestServer {
    fn new() -> Self {
        let base_url = env::var("TEST_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".into());
        Self {
            base_url,
            access_token: String::new(),
            user_id: String::new(),
            client: Client::new(),
        }
    }

    async fn login(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let email = env::var("TEST_ADMIN_EMAIL").unwrap_or_else(|_| "admin@lectern.local".into());
        let password = env::var("TEST_ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".into());

        let resp = self
            .client
            .post(format!("{}/api/auth/login", self.base_url))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let body: Value = resp.json().await?;
        self.access_token = body["access_token"]
            .as_str()
            .ok_or("No access token")?
            .to_string();
        self.user_id = body["user"]["id"]
            .as_str()
            .ok_or("No user id")?
            .to_string();
        Ok(())
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    async fn get(&self, path: &str) -> Result<Response, reqwest::Error> {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .header("Authorization", self.auth_header())
            .send()
            .await
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Response, reqwest::Error> {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header("Authorization", self.auth_header())
            .json(body)
            .send()
            .await
    }

    async fn patch_json(&self, path: &str, body: &Value) -> Result<Response, reqwest::Error> {
        self.client
            .patch(format!("{}{}", self.base_url, path))
            .header("Authorization", self.auth_header())
            .json(body)
            .send()
            .await
    }

    async fn delete(&self, path: &str) -> Result<Response, reqwest::Error> {
        self.client
            .delete(format!("{}{}", self.base_url, path))
            .header("Authorization", self.auth_header())
            .send()
            .await
    }

    /// Run the full upload flow: register, PUT the bytes to the presigned
    /// URL, confirm. Returns None when the server's storage backend does
    /// not support presigned uploads (filesystem dev mode).
    async fn upload_video(
        &self,
        title: &str,
        thumbnail_data: Option<&str>,
    ) -> Result<Option<Value>, Box<dyn std::error::Error>> {
        let init = self
            .post_json(
                "/api/videos/upload-url",
                &json!({
                    "title": title,
                    "filename": "lecture.mp4",
                    "content_type": "video/mp4",
                    "size_bytes": 64
                }),
            )
            .await?;

        if init.status() == StatusCode::BAD_REQUEST {
            eprintln!("skipping: storage backend does not support presigned uploads");
            return Ok(None);
        }
        assert_eq!(init.status(), StatusCode::OK, "upload-url should answer 200");

        let init_body: Value = init.json().await?;
        let upload_url = init_body["upload_url"].as_str().ok_or("No upload_url")?;
        let video_id = init_body["video"]["id"].as_str().ok_or("No video id")?;

        let put = self
            .client
            .put(upload_url)
            .header("Content-Type", "video/mp4")
            .body(b"not a real mp4, but the storage layer does not care".to_vec())
            .send()
            .await?;
        assert!(
            put.status().is_success(),
            "presigned PUT failed: {}",
            put.status()
        );

        let confirm = self
            .post_json(
                "/api/videos",
                &json!({
                    "video_id": video_id,
                    "thumbnail_data": thumbnail_data,
                    "ingest_to_mux": false
                }),
            )
            .await?;
        assert_eq!(
            confirm.status(),
            StatusCode::CREATED,
            "confirm should answer 201"
        );

        Ok(Some(confirm.json().await?))
    }
}

/// Helper to get an authenticated test server
async fn get_server() -> TestServer {
    let mut server = TestServer::new();
    server.login().await.expect("Login failed");
    server
}

// ============= Health Check Tests =============

#[tokio::test]
#[ignore = "requires running HTTP server"]
async fn test_health_check() {
    let server = TestServer::new();
    let resp = server
        .client
        .get(format!("{}/health", server.base_url))
        .send()
        .await
        .expect("Health check request failed");

    assert!(resp.status().is_success());
    let body: Value = resp.json().await.expect("Failed to parse health response");
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["database"]["status"], "healthy");
}

#[tokio::test]
#[ignore = "requires running HTTP server"]
async fn test_openapi_document_served() {
    let server = TestServer::new();
    let resp = server
        .client
        .get(format!("{}/api/openapi.json", server.base_url))
        .send()
        .await
        .expect("OpenAPI request failed");

    assert!(resp.status().is_success());
    let body: Value = resp.json().await.expect("Failed to parse OpenAPI document");
    assert!(body["openapi"].as_str().is_some());
    assert!(body["paths"]["/api/videos/upload-url"].is_object());
}

// ============= Authentication Tests =============

#[tokio::test]
#[ignore = "requires running HTTP server"]
async fn test_login() {
    let mut server = TestServer::new();
    let result = server.login().await;
    assert!(result.is_ok(), "Login should succeed");
    assert!(
        !server.access_token.is_empty(),
        "Should receive access token"
    );
}

#[tokio::test]
#[ignore = "requires running HTTP server"]
async fn test_login_invalid_credentials() {
    let server = TestServer::new();
    let resp = server
        .client
        .post(format!("{}/api/auth/login", server.base_url))
        .json(&json!({
            "email": "admin@lectern.local",
            "password": "wrong_password"
        }))
        .send()
        .await
        .expect("Request failed");

    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.expect("Failed to parse error body");
    assert!(body["error"].as_str().is_some(), "Error envelope expected");
}

#[tokio::test]
#[ignore = "requires running HTTP server"]
async fn test_protected_routes_require_auth() {
    let server = TestServer::new();

    for path in ["/api/auth/me", "/api/videos", "/api/articles", "/api/events"] {
        let resp = server
            .client
            .get(format!("{}{}", server.base_url, path))
            .send()
            .await
            .expect("Request failed");
        assert_eq!(resp.status(), 401, "{} should require a token", path);
    }
}

#[tokio::test]
#[ignore = "requires running HTTP server"]
async fn test_metrics_require_admin() {
    let server = TestServer::new();
    let resp = server
        .client
        .get(format!("{}/metrics", server.base_url))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(resp.status(), 401);
}

// ============= Video Upload Pipeline Tests =============

#[tokio::test]
#[ignore = "requires running HTTP server with S3 storage"]
async fn test_upload_confirm_yields_one_ready_video() {
    let server = get_server().await;
    let title = format!("Civil Procedure {}", test_id());

    let Some(video) = server
        .upload_video(&title, Some(TINY_JPEG_BASE64))
        .await
        .expect("Upload flow failed")
    else {
        return;
    };

    // No Mux ingest was requested, so the row settles immediately.
    assert_eq!(video["status"], "ready");
    assert!(video["thumbnail_method"].as_str().is_some());

    // Exactly one catalog row exists for the confirmed upload.
    let resp = server
        .get(&format!("/api/videos?search={}", title.replace(' ', "%20")))
        .await
        .expect("List request failed");
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.expect("Failed to parse list");
    let matches: Vec<&Value> = body["videos"]
        .as_array()
        .expect("videos array")
        .iter()
        .filter(|v| v["title"] == title.as_str())
        .collect();
    assert_eq!(matches.len(), 1, "confirm should yield exactly one row");
    assert_eq!(matches[0]["status"], "ready");
}

#[tokio::test]
#[ignore = "requires running HTTP server with S3 storage"]
async fn test_thumbnail_falls_back_to_client_image() {
    let server = get_server().await;
    let title = format!("Torts {}", test_id());

    let Some(video) = server
        .upload_video(&title, Some(TINY_JPEG_BASE64))
        .await
        .expect("Upload flow failed")
    else {
        return;
    };

    // The uploaded bytes are not decodable video, so server-side frame
    // capture cannot succeed; the chain falls through to the client
    // image (or the placeholder on a server without one configured).
    let method = video["thumbnail_method"].as_str().expect("method set");
    assert!(
        ["transcoder", "ffmpeg", "client", "placeholder"].contains(&method),
        "unexpected thumbnail method {}",
        method
    );
    if method == "client" {
        assert_eq!(video["thumbnail_status"], "ready");
    }
}

#[tokio::test]
#[ignore = "requires running HTTP server with S3 storage"]
async fn test_video_delete_then_fetch_is_404() {
    let server = get_server().await;
    let title = format!("Evidence {}", test_id());

    let Some(video) = server
        .upload_video(&title, None)
        .await
        .expect("Upload flow failed")
    else {
        return;
    };
    let id = video["id"].as_str().expect("video id");

    let del = server
        .delete(&format!("/api/videos/{}", id))
        .await
        .expect("Delete request failed");
    assert_eq!(del.status(), 204);

    let resp = server
        .get(&format!("/api/videos/{}", id))
        .await
        .expect("Get request failed");
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.expect("Failed to parse error body");
    assert!(body["error"].as_str().is_some(), "Error envelope expected");
}

#[tokio::test]
#[ignore = "requires running HTTP server with S3 storage"]
async fn test_video_status_endpoint() {
    let server = get_server().await;
    let title = format!("Con Law {}", test_id());

    let Some(video) = server
        .upload_video(&title, None)
        .await
        .expect("Upload flow failed")
    else {
        return;
    };
    let id = video["id"].as_str().expect("video id");

    let resp = server
        .get(&format!("/api/videos/{}/status", id))
        .await
        .expect("Status request failed");
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.expect("Failed to parse status");
    assert_eq!(body["video_id"], id);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
#[ignore = "requires running HTTP server"]
async fn test_confirm_unknown_video_is_404() {
    let server = get_server().await;
    let resp = server
        .post_json(
            "/api/videos",
            &json!({ "video_id": "00000000-0000-0000-0000-000000000000" }),
        )
        .await
        .expect("Request failed");
    assert_eq!(resp.status(), 404);
}

// ============= Editorial Workflow Tests =============

#[tokio::test]
#[ignore = "requires running HTTP server"]
async fn test_article_editorial_workflow() {
    let server = get_server().await;
    let title = format!("The Erie Doctrine Revisited {}", test_id());

    let resp = server
        .post_json(
            "/api/articles",
            &json!({
                "title": title,
                "abstract_text": "A fresh look at vertical choice of law.",
                "authors": ["P. Author"],
                "body": "I. Introduction\n\nArgument goes here."
            }),
        )
        .await
        .expect("Create request failed");
    assert_eq!(resp.status(), 201);
    let article: Value = resp.json().await.expect("Failed to parse article");
    assert_eq!(article["status"], "draft");
    let id = article["id"].as_str().expect("article id");

    for (next, expect_published_at) in [
        ("in_review", false),
        ("approved", false),
        ("published", true),
    ] {
        let resp = server
            .post_json(
                &format!("/api/articles/{}/status", id),
                &json!({ "status": next }),
            )
            .await
            .expect("Transition request failed");
        assert!(
            resp.status().is_success(),
            "transition to {} should succeed",
            next
        );
        let body: Value = resp.json().await.expect("Failed to parse transition");
        assert_eq!(body["status"], next);
        assert_eq!(body["published_at"].is_string(), expect_published_at);
    }
}

#[tokio::test]
#[ignore = "requires running HTTP server"]
async fn test_article_illegal_transition_is_conflict() {
    let server = get_server().await;

    let resp = server
        .post_json(
            "/api/articles",
            &json!({ "title": format!("Draft {}", test_id()) }),
        )
        .await
        .expect("Create request failed");
    assert_eq!(resp.status(), 201);
    let article: Value = resp.json().await.expect("Failed to parse article");
    let id = article["id"].as_str().expect("article id");

    // A draft cannot jump straight to published.
    let resp = server
        .post_json(
            &format!("/api/articles/{}/status", id),
            &json!({ "status": "published" }),
        )
        .await
        .expect("Transition request failed");
    assert_eq!(resp.status(), 409);
}

#[tokio::test]
#[ignore = "requires running HTTP server"]
async fn test_article_versions() {
    let server = get_server().await;

    let resp = server
        .post_json(
            "/api/articles",
            &json!({
                "title": format!("Versioned {}", test_id()),
                "body": "first draft"
            }),
        )
        .await
        .expect("Create request failed");
    let article: Value = resp.json().await.expect("Failed to parse article");
    let id = article["id"].as_str().expect("article id");

    let resp = server
        .post_json(
            &format!("/api/articles/{}/versions", id),
            &json!({ "body": "second draft", "change_summary": "rewrote part II" }),
        )
        .await
        .expect("Add version request failed");
    assert_eq!(resp.status(), 201);
    let version: Value = resp.json().await.expect("Failed to parse version");
    assert_eq!(version["version_number"], 2);

    let resp = server
        .get(&format!("/api/articles/{}/versions/2", id))
        .await
        .expect("Get version request failed");
    assert!(resp.status().is_success());
    let fetched: Value = resp.json().await.expect("Failed to parse version");
    assert_eq!(fetched["body"], "second draft");
}

#[tokio::test]
#[ignore = "requires running HTTP server"]
async fn test_article_sections_and_comments() {
    let server = get_server().await;

    let resp = server
        .post_json(
            "/api/articles",
            &json!({ "title": format!("Structured {}", test_id()) }),
        )
        .await
        .expect("Create request failed");
    let article: Value = resp.json().await.expect("Failed to parse article");
    let id = article["id"].as_str().expect("article id");

    let resp = server
        .client
        .put(format!("{}/api/articles/{}/sections", server.base_url, id))
        .header("Authorization", server.auth_header())
        .json(&json!({
            "sections": [
                { "heading": "I. Introduction", "body": "..." },
                { "heading": "II. Analysis", "body": "..." }
            ]
        }))
        .send()
        .await
        .expect("Replace sections request failed");
    assert!(resp.status().is_success());

    let resp = server
        .post_json(
            &format!("/api/articles/{}/comments", id),
            &json!({ "body": "Citation needed in part II." }),
        )
        .await
        .expect("Add comment request failed");
    assert_eq!(resp.status(), 201);
    let comment: Value = resp.json().await.expect("Failed to parse comment");
    assert_eq!(comment["resolved"], false);

    let comment_id = comment["id"].as_str().expect("comment id");
    let resp = server
        .post_json(
            &format!("/api/articles/{}/comments/{}/resolve", id, comment_id),
            &json!({}),
        )
        .await
        .expect("Resolve request failed");
    assert!(resp.status().is_success());
    let resolved: Value = resp.json().await.expect("Failed to parse comment");
    assert_eq!(resolved["resolved"], true);
}

// ============= Course Catalog Tests =============

#[tokio::test]
#[ignore = "requires running HTTP server"]
async fn test_course_assignment_lifecycle() {
    let server = get_server().await;
    let code = format!("LAW-{}", test_id());

    let resp = server
        .post_json(
            "/api/courses",
            &json!({
                "code": code,
                "title": "Federal Courts",
                "semester": "Fall 2026"
            }),
        )
        .await
        .expect("Create course request failed");
    assert_eq!(resp.status(), 201);
    let course: Value = resp.json().await.expect("Failed to parse course");
    let course_id = course["id"].as_str().expect("course id");

    let resp = server
        .post_json(
            &format!("/api/courses/{}/assignments", course_id),
            &json!({
                "title": "Reading response 1",
                "points": 100
            }),
        )
        .await
        .expect("Create assignment request failed");
    assert_eq!(resp.status(), 201);
    let assignment: Value = resp.json().await.expect("Failed to parse assignment");
    let assignment_id = assignment["id"].as_str().expect("assignment id");

    // Assignments are addressed at the top level once created.
    let resp = server
        .patch_json(
            &format!("/api/assignments/{}", assignment_id),
            &json!({ "points": 50 }),
        )
        .await
        .expect("Update assignment request failed");
    assert!(resp.status().is_success());
    let updated: Value = resp.json().await.expect("Failed to parse assignment");
    assert_eq!(updated["points"], 50);

    let resp = server
        .delete(&format!("/api/assignments/{}", assignment_id))
        .await
        .expect("Delete assignment request failed");
    assert_eq!(resp.status(), 204);

    let resp = server
        .patch_json(
            &format!("/api/assignments/{}", assignment_id),
            &json!({ "points": 10 }),
        )
        .await
        .expect("Update after delete request failed");
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
#[ignore = "requires running HTTP server"]
async fn test_enrollment_flow() {
    let server = get_server().await;
    let code = format!("SEM-{}", test_id());

    let resp = server
        .post_json(
            "/api/courses",
            &json!({
                "code": code,
                "title": "Evidence Seminar",
                "semester": "Spring 2027"
            }),
        )
        .await
        .expect("Create course request failed");
    let course: Value = resp.json().await.expect("Failed to parse course");
    let course_id = course["id"].as_str().expect("course id");

    let resp = server
        .post_json(
            &format!("/api/courses/{}/enrollments", course_id),
            &json!({ "user_id": server.user_id }),
        )
        .await
        .expect("Enroll request failed");
    assert_eq!(resp.status(), 201);

    let resp = server
        .get(&format!("/api/courses/{}/enrollments", course_id))
        .await
        .expect("List enrollments request failed");
    assert!(resp.status().is_success());

    let resp = server
        .delete(&format!(
            "/api/courses/{}/enrollments/{}",
            course_id, server.user_id
        ))
        .await
        .expect("Unenroll request failed");
    assert_eq!(resp.status(), 204);
}

// ============= Maintenance Migration Tests =============

#[tokio::test]
#[ignore = "requires running HTTP server"]
async fn test_migrate_endpoint_is_idempotent() {
    let server = get_server().await;

    let first = server
        .post_json("/api/database/migrate", &json!({}))
        .await
        .expect("First migrate request failed");
    assert!(first.status().is_success());

    // Whatever the first run applied, a second run applies nothing.
    let second = server
        .post_json("/api/database/migrate", &json!({}))
        .await
        .expect("Second migrate request failed");
    assert!(second.status().is_success());
    let report: Value = second.json().await.expect("Failed to parse report");
    assert_eq!(
        report["applied"].as_array().map(Vec::len),
        Some(0),
        "second run should apply nothing"
    );
    assert!(report["skipped"].as_array().is_some_and(|s| !s.is_empty()));

    let status = server
        .get("/api/database/status")
        .await
        .expect("Status request failed");
    assert!(status.status().is_success());
    let body: Value = status.json().await.expect("Failed to parse status");
    for script in body.as_array().expect("status array") {
        assert_eq!(script["applied"], true);
        assert_eq!(script["drifted"], false);
    }
}

// ============= Webhook Tests =============

#[tokio::test]
#[ignore = "requires running HTTP server"]
async fn test_mux_webhook_unknown_asset_acknowledged() {
    let server = TestServer::new();
    let resp = server
        .client
        .post(format!("{}/api/webhooks/mux", server.base_url))
        .json(&json!({
            "type": "video.asset.ready",
            "data": { "id": format!("asset_{}", test_id()) }
        }))
        .send()
        .await
        .expect("Webhook request failed");

    if resp.status() == 401 {
        eprintln!("skipping: server has a Mux webhook secret configured");
        return;
    }
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.expect("Failed to parse ack");
    assert_eq!(body["received"], true);
    assert_eq!(body["handled"], false, "unknown asset id is ignored");
}

#[tokio::test]
#[ignore = "requires running HTTP server"]
async fn test_mediaconvert_webhook_unknown_job_acknowledged() {
    let server = TestServer::new();
    let resp = server
        .client
        .post(format!("{}/api/webhooks/mediaconvert", server.base_url))
        .json(&json!({
            "detail": {
                "jobId": format!("job_{}", test_id()),
                "status": "COMPLETE"
            }
        }))
        .send()
        .await
        .expect("Webhook request failed");

    if resp.status() == 401 {
        eprintln!("skipping: server has a MediaConvert webhook token configured");
        return;
    }
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.expect("Failed to parse ack");
    assert_eq!(body["received"], true);
    assert_eq!(body["handled"], false, "unknown job id is ignored");
}

// ============= Audit Trail Tests =============

#[tokio::test]
#[ignore = "requires running HTTP server"]
async fn test_mutations_land_in_audit_trail() {
    let server = get_server().await;
    let code = format!("AUD-{}", test_id());

    let resp = server
        .post_json(
            "/api/courses",
            &json!({
                "code": code,
                "title": "Audit Trail Check",
                "semester": "Fall 2026"
            }),
        )
        .await
        .expect("Create course request failed");
    let course: Value = resp.json().await.expect("Failed to parse course");
    let course_id = course["id"].as_str().expect("course id");

    let resp = server
        .get(&format!(
            "/api/events?entity_type=course&entity_id={}",
            course_id
        ))
        .await
        .expect("Events request failed");
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.expect("Failed to parse events");
    let events = body["events"].as_array().expect("events array");
    assert!(
        events
            .iter()
            .any(|e| e["event_type"] == "course.created"),
        "course.created should be recorded"
    );
}
