//! Security headers middleware.
//!
//! Adds standard security headers to all HTTP responses. The CSP allows
//! HLS playback and poster images from Mux alongside same-origin media.

use axum::{extract::Request, middleware::Next, response::Response};

pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("x-frame-options", "DENY".parse().unwrap());
    headers.insert("x-content-type-options", "nosniff".parse().unwrap());
    headers.insert(
        "strict-transport-security",
        "max-age=31536000; includeSubDomains".parse().unwrap(),
    );
    headers.insert(
        "referrer-policy",
        "strict-origin-when-cross-origin".parse().unwrap(),
    );
    headers.insert(
        "content-security-policy",
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; \
         img-src 'self' data: https://image.mux.com; \
         media-src 'self' blob: https://stream.mux.com; \
         connect-src 'self' https://stream.mux.com; \
         frame-ancestors 'none'; base-uri 'self'; form-action 'self'"
            .parse()
            .unwrap(),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::get, Router};
    use tower::ServiceExt;

    async fn build_response() -> axum::response::Response {
        let app = Router::new()
            .route("/test", get(|| async { "OK" }))
            .layer(middleware::from_fn(security_headers_middleware));

        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
        app.oneshot(request).await.unwrap()
    }

    #[tokio::test]
    async fn all_hardening_headers_are_present() {
        let resp = build_response().await;
        let headers = resp.headers();
        for name in [
            "x-frame-options",
            "x-content-type-options",
            "strict-transport-security",
            "referrer-policy",
            "content-security-policy",
        ] {
            assert!(headers.get(name).is_some(), "missing header {name}");
        }
    }

    #[tokio::test]
    async fn csp_allows_mux_playback() {
        let resp = build_response().await;
        let csp = resp
            .headers()
            .get("content-security-policy")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(csp.contains("https://stream.mux.com"));
        assert!(csp.contains("https://image.mux.com"));
        assert!(csp.contains("frame-ancestors 'none'"));
    }
}
