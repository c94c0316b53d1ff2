//! Prometheus metrics collection and HTTP request instrumentation.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

use axum::{
    body::Body,
    http::{Request, Response},
    middleware::Next,
};

/// Initialize the Prometheus metrics recorder and return the handle for rendering.
pub fn init_metrics() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    builder
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Axum middleware that records HTTP request metrics.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().clone().to_string();
    let path = request.uri().path().to_string();
    // Normalize path to avoid high-cardinality labels (strip UUIDs and IDs)
    let normalized = normalize_path(&path);

    let start = Instant::now();
    counter!("lectern_http_requests_total", "method" => method.clone(), "path" => normalized.clone())
        .increment(1);
    gauge!("lectern_http_requests_in_flight", "method" => method.clone(), "path" => normalized.clone())
        .increment(1.0);

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    histogram!("lectern_http_request_duration_seconds", "method" => method.clone(), "path" => normalized.clone(), "status" => status.clone()).record(duration);
    counter!("lectern_http_responses_total", "method" => method.clone(), "path" => normalized.clone(), "status" => status).increment(1);
    gauge!("lectern_http_requests_in_flight", "method" => method, "path" => normalized).decrement(1.0);

    response
}

/// Normalize URL paths to reduce label cardinality.
/// Replaces UUIDs and numeric IDs with placeholders.
fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    let normalized: Vec<String> = segments
        .iter()
        .map(|seg| {
            if seg.len() == 36 && seg.chars().filter(|c| *c == '-').count() == 4 {
                // UUID pattern
                ":id".to_string()
            } else if seg.parse::<i64>().is_ok() && !seg.is_empty() {
                // Numeric ID
                ":id".to_string()
            } else {
                seg.to_string()
            }
        })
        .collect();
    normalized.join("/")
}

/// Record a confirmed video upload.
pub fn record_video_upload(content_type: &str, size_bytes: u64) {
    counter!("lectern_video_uploads_total", "content_type" => content_type.to_string())
        .increment(1);
    histogram!("lectern_video_upload_size_bytes").record(size_bytes as f64);
}

/// Record a thumbnail generation outcome per strategy.
pub fn record_thumbnail_attempt(method: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("lectern_thumbnail_attempts_total", "method" => method.to_string(), "status" => status.to_string()).increment(1);
}

/// Record an inbound webhook.
pub fn record_webhook_received(source: &str, handled: bool) {
    let outcome = if handled { "handled" } else { "ignored" };
    counter!("lectern_webhooks_received_total", "source" => source.to_string(), "outcome" => outcome.to_string()).increment(1);
}

/// Record an outbound call to an external media service.
pub fn record_upstream_call(service: &str, success: bool, duration_secs: f64) {
    let status = if success { "success" } else { "failure" };
    counter!("lectern_upstream_requests_total", "service" => service.to_string(), "status" => status.to_string()).increment(1);
    histogram!("lectern_upstream_request_duration_seconds", "service" => service.to_string())
        .record(duration_secs);
}

/// Update catalog gauge metrics from database stats.
pub fn set_catalog_gauges(videos: i64, articles: i64, courses: i64, users: i64) {
    gauge!("lectern_videos_total").set(videos as f64);
    gauge!("lectern_articles_total").set(articles as f64);
    gauge!("lectern_courses_total").set(courses as f64);
    gauge!("lectern_users_total").set(users as f64);
}

/// Update database connection pool gauge metrics.
pub fn set_db_pool_gauges(pool: &sqlx::PgPool) {
    let size = pool.size() as f64;
    let idle = pool.num_idle() as f64;
    gauge!("lectern_db_pool_connections_active").set(size - idle);
    gauge!("lectern_db_pool_connections_idle").set(idle);
    gauge!("lectern_db_pool_connections_max").set(pool.options().get_max_connections() as f64);
    gauge!("lectern_db_pool_connections_size").set(size);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/videos/550e8400-e29b-41d4-a716-446655440000/thumbnail";
        let result = normalize_path(path);
        assert_eq!(result, "/api/videos/:id/thumbnail");
    }

    #[test]
    fn test_normalize_path_numeric() {
        let path = "/api/articles/123";
        let result = normalize_path(path);
        assert_eq!(result, "/api/articles/:id");
    }

    #[test]
    fn test_normalize_path_no_change() {
        let path = "/api/videos";
        let result = normalize_path(path);
        assert_eq!(result, "/api/videos");
    }
}
